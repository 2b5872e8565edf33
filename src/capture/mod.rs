//! One "visit target → capture evidence" unit of work.
//!
//! A [`CaptureSession`] owns a live browser session plus the device channel
//! and performs single units: wipe the cache, attach a remote packet capture,
//! load the page under a hard timeout, screenshot, pull the capture file, and
//! validate the resulting pair. It performs no retries — every outcome and
//! error is decided by the worker loop.

use std::sync::Arc;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::artifacts::validate::ValidationGate;
use crate::artifacts::ArtifactStore;
use crate::browser::NavigationSession;
use crate::config::{CaptureConfig, SettleDelays};
use crate::device::DeviceControl;

/// Result of one capture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Pair produced and passed validation. Advance to the next unit.
    Valid,
    /// Pair produced but failed validation. Restart the tunnel, retry the
    /// same unit.
    InvalidRetry,
    /// Page load exceeded its bound. The session's UI state is unknown —
    /// the whole worker loop restarts.
    Timeout,
}

pub struct CaptureSession {
    device: Arc<dyn DeviceControl>,
    session: Box<dyn NavigationSession>,
    store: ArtifactStore,
    gate: ValidationGate,
    config: CaptureConfig,
    delays: SettleDelays,
    worker: u32,
}

impl CaptureSession {
    pub fn new(
        device: Arc<dyn DeviceControl>,
        session: Box<dyn NavigationSession>,
        store: ArtifactStore,
        config: CaptureConfig,
        delays: SettleDelays,
        worker: u32,
    ) -> Self {
        let gate = ValidationGate::new(config.min_capture_bytes, config.min_evidence_bytes);
        Self {
            device,
            session,
            store,
            gate,
            config,
            delays,
            worker,
        }
    }

    /// Load `url` bounded by the configured page-load timeout.
    ///
    /// `Ok(false)` is a timeout. On success, waits the post-visit settle so
    /// late subresources land before the screenshot.
    async fn visit(&mut self, url: &str) -> Result<bool> {
        let loaded = self
            .session
            .load(url, self.config.visit_timeout())
            .await?;
        if loaded {
            debug!(url, "page loaded");
            sleep(self.delays.post_visit()).await;
        } else {
            warn!(url, timeout_secs = self.config.visit_timeout_secs, "page load timed out");
        }
        Ok(loaded)
    }

    /// Run one full capture unit for (sample, item).
    ///
    /// Overwrites any leftover artifacts from a previous failed attempt —
    /// an invalid or incomplete pair is deleted-by-overwrite on retry.
    pub async fn capture_unit(
        &mut self,
        sample: u32,
        item: u32,
        url: &str,
    ) -> Result<CaptureOutcome> {
        let pair = self.store.pair_paths(self.worker, sample, item);
        let remote_capture = format!(
            "{}/{}",
            self.config.remote_dir,
            self.store.remote_capture_name(self.worker, sample, item)
        );

        // 1. Cold-cache every visit so captures are comparable.
        self.device
            .shell_su(&format!("rm -rf {}/*", self.config.browser_cache))
            .await?;
        sleep(self.delays.cache_clear()).await;

        // 2. Attach the remote packet capture before any traffic flows.
        let mut tcpdump = self
            .device
            .spawn_su(&format!(
                "tcpdump -i any port {} -s {} -w {}",
                self.config.port, self.config.snaplen, remote_capture
            ))
            .await?;
        sleep(self.delays.capture_attach()).await;
        debug!(url, remote = %remote_capture, "packet capture attached");

        // 3. The only time-bounded step.
        if !self.visit(url).await? {
            self.stop_remote_capture(&mut tcpdump).await?;
            return Ok(CaptureOutcome::Timeout);
        }

        // 4. Evidence first, then let late traffic drain into the capture.
        self.session.save_screen(&pair.evidence).await?;
        info!(sample, item, evidence = %pair.evidence.display(), "evidence saved");
        sleep(self.delays.evidence_settle()).await;

        // 5. Detach and transfer the capture.
        self.stop_remote_capture(&mut tcpdump).await?;
        self.device.pull(&remote_capture, &pair.capture).await?;
        self.device
            .shell_su(&format!("rm {remote_capture}"))
            .await?;
        sleep(self.delays.post_transfer()).await;
        info!(sample, item, capture = %pair.capture.display(), "capture transferred");

        // 6. Size validation decides whether the unit counts.
        if self.gate.is_valid(&pair) {
            Ok(CaptureOutcome::Valid)
        } else {
            Ok(CaptureOutcome::InvalidRetry)
        }
    }

    async fn stop_remote_capture(
        &mut self,
        tcpdump: &mut Box<dyn crate::device::RemoteProc>,
    ) -> Result<()> {
        self.device.shell_su("pkill tcpdump").await?;
        tcpdump.kill().await?;
        sleep(self.delays.capture_detach()).await;
        Ok(())
    }

    /// Tear down the browser session. Errors are logged, not propagated —
    /// this runs on recovery paths where the session may already be dead.
    pub async fn close(&mut self) {
        if let Err(err) = self.session.close().await {
            warn!(%err, "browser session close failed (already dead?)");
        }
    }
}
