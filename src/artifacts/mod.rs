//! Artifact store and progress scanner.
//!
//! The output directory is the durable job state: for worker `w`, sample `s`,
//! item `i` there are exactly two expected files,
//! `URL_{i}_Sample_{s}_D_{w}.pcap` (capture) and `URL_{i}_Sample_{s}_D_{w}.png`
//! (evidence). No other metadata records progress — resumption is derived
//! entirely from this naming convention plus file presence and size, so a
//! crashed run resumes by rescanning, never by trusting cached state.

pub mod validate;

use std::path::{Path, PathBuf};

use crate::plan::WorkPlan;

/// The two expected output files for one (worker, sample, item).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPair {
    pub capture: PathBuf,
    pub evidence: PathBuf,
}

impl ArtifactPair {
    /// Both files exist. Says nothing about their sizes — see
    /// [`validate::ValidationGate`] for that.
    pub fn is_complete(&self) -> bool {
        self.capture.exists() && self.evidence.exists()
    }
}

/// First not-yet-complete (sample, item) in iteration order, 1-indexed.
///
/// Only meaningful when [`ArtifactStore::is_complete`] is false: a fully
/// complete worker also scans to (1, 1), so callers must check completion
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeCursor {
    pub sample: u32,
    pub item: u32,
}

impl ResumeCursor {
    pub const START: ResumeCursor = ResumeCursor { sample: 1, item: 1 };
}

/// Read-only view of one fleet's output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    samples: u32,
    items: u32,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>, plan: &WorkPlan) -> Self {
        Self {
            output_dir: output_dir.into(),
            samples: plan.samples,
            items: plan.items(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Deterministic artifact paths for one (worker, sample, item).
    pub fn pair_paths(&self, worker: u32, sample: u32, item: u32) -> ArtifactPair {
        let stem = format!("URL_{item}_Sample_{sample}_D_{worker}");
        ArtifactPair {
            capture: self.output_dir.join(format!("{stem}.pcap")),
            evidence: self.output_dir.join(format!("{stem}.png")),
        }
    }

    /// Device-local file name for the in-flight capture of one unit.
    pub fn remote_capture_name(&self, worker: u32, sample: u32, item: u32) -> String {
        format!("URL_{item}_Sample_{sample}_D_{worker}.pcap")
    }

    /// True iff every pair of the whole plan is complete for this worker.
    /// Used as a fast skip-if-done check before any device work.
    pub fn is_complete(&self, worker: u32) -> bool {
        for sample in 1..=self.samples {
            for item in 1..=self.items {
                if !self.pair_paths(worker, sample, item).is_complete() {
                    return false;
                }
            }
        }
        true
    }

    /// Scan samples ascending, then items ascending, and return the first
    /// (sample, item) whose pair is not complete.
    ///
    /// Returns [`ResumeCursor::START`] when nothing incomplete is found;
    /// pair with [`is_complete`](Self::is_complete) to tell "nothing done"
    /// from "everything done". Every pair strictly before the returned cursor
    /// is complete.
    pub fn resume_cursor(&self, worker: u32) -> ResumeCursor {
        for sample in 1..=self.samples {
            for item in 1..=self.items {
                if !self.pair_paths(worker, sample, item).is_complete() {
                    return ResumeCursor { sample, item };
                }
            }
        }
        ResumeCursor::START
    }
}
