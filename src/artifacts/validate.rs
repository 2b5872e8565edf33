//! Size-threshold validation of a produced artifact pair.

use tracing::{debug, warn};

use super::ArtifactPair;

/// Confirms a capture actually recorded something.
///
/// A unit that navigated but captured nothing (tunnel down, tcpdump never
/// attached, blank page) produces files that are too small; the thresholds
/// reject those so the unit is re-attempted.
#[derive(Debug, Clone, Copy)]
pub struct ValidationGate {
    /// Capture files must be strictly larger than this.
    pub min_capture_bytes: u64,
    /// Evidence files must be strictly larger than this.
    pub min_evidence_bytes: u64,
}

impl ValidationGate {
    pub fn new(min_capture_bytes: u64, min_evidence_bytes: u64) -> Self {
        Self {
            min_capture_bytes,
            min_evidence_bytes,
        }
    }

    /// Both files exist and each strictly exceeds its threshold.
    ///
    /// Fail-closed: a missing file or any metadata error counts as invalid
    /// and is never propagated — the caller's retry path handles it.
    pub fn is_valid(&self, pair: &ArtifactPair) -> bool {
        let capture_size = match std::fs::metadata(&pair.capture) {
            Ok(meta) => meta.len(),
            Err(err) => {
                warn!(path = %pair.capture.display(), %err, "capture size query failed");
                return false;
            }
        };
        let evidence_size = match std::fs::metadata(&pair.evidence) {
            Ok(meta) => meta.len(),
            Err(err) => {
                warn!(path = %pair.evidence.display(), %err, "evidence size query failed");
                return false;
            }
        };

        let valid = capture_size > self.min_capture_bytes
            && evidence_size > self.min_evidence_bytes;
        if valid {
            debug!(capture_size, evidence_size, "artifact pair valid");
        } else {
            warn!(
                capture_size,
                evidence_size,
                min_capture = self.min_capture_bytes,
                min_evidence = self.min_evidence_bytes,
                "artifact pair too small"
            );
        }
        valid
    }
}
