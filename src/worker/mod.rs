//! Per-device worker loop.
//!
//! State machine: Init → Resuming → Iterating → (Retrying | Recovering) →
//! Completed. Recovery is an explicit outer loop, not recursion: a timed-out
//! or faulted attempt tears the session down, rescans the output directory
//! for the resume cursor, and rebuilds from there. Artifacts on disk are the
//! only progress record, so a restart can never lose or duplicate completed
//! work.
//!
//! No error leaves this module. A worker either reaches completion or keeps
//! retrying; failure is never signalled upward.

use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::artifacts::{ArtifactStore, ResumeCursor};
use crate::browser::NavigationDriver;
use crate::capture::{CaptureOutcome, CaptureSession};
use crate::config::{CaptureConfig, DeviceConfig, SettleDelays, TunnelConfig};
use crate::device::DeviceControl;
use crate::plan::WorkPlan;
use crate::tunnel::{TunnelController, TunnelState};

/// Why an attempt was abandoned and the loop restarted.
#[derive(Debug, Error)]
enum AttemptAbort {
    /// A page load exceeded its bound. The browser's UI state is unknown, so
    /// the whole session is rebuilt rather than resumed in place.
    #[error("page load timed out")]
    NavigationTimeout,
    /// Transport or driver fault mid-unit. Handled exactly like a timeout.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// One device's collection loop.
pub struct WorkerLoop {
    /// 1-based worker index; partitions artifact names between workers.
    worker: u32,
    device_config: DeviceConfig,
    device: Arc<dyn DeviceControl>,
    driver: Arc<dyn NavigationDriver>,
    plan: Arc<WorkPlan>,
    store: ArtifactStore,
    tunnel: TunnelController,
    capture_config: CaptureConfig,
    tunnel_config: TunnelConfig,
    delays: SettleDelays,
    state: TunnelState,
}

impl WorkerLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker: u32,
        device_config: DeviceConfig,
        device: Arc<dyn DeviceControl>,
        driver: Arc<dyn NavigationDriver>,
        plan: Arc<WorkPlan>,
        store: ArtifactStore,
        capture_config: CaptureConfig,
        tunnel_config: TunnelConfig,
        delays: SettleDelays,
    ) -> Self {
        let tunnel = TunnelController::new(
            Arc::clone(&device),
            tunnel_config.clone(),
            delays.clone(),
        );
        Self {
            worker,
            device_config,
            device,
            driver,
            plan,
            store,
            tunnel,
            capture_config,
            tunnel_config,
            delays,
            state: TunnelState::default(),
        }
    }

    /// Drive this worker to completion. Returns only when every pair of the
    /// plan is complete (or was already complete at startup).
    pub async fn run(&mut self) {
        loop {
            // Init: completion is consulted before the cursor — a cursor of
            // (1,1) on its own cannot distinguish "untouched" from "done".
            if self.store.is_complete(self.worker) {
                info!(worker = self.worker, device = %self.device_config.name, "already complete");
                break;
            }

            match self.attempt().await {
                Ok(()) => break,
                Err(abort) => {
                    warn!(
                        worker = self.worker,
                        device = %self.device_config.name,
                        %abort,
                        "attempt aborted; restarting worker loop"
                    );
                    self.state.recovering = true;
                    sleep(self.delays.recovery()).await;
                }
            }
        }
        info!(worker = self.worker, device = %self.device_config.name, "worker completed");
    }

    /// One Resuming → Iterating → Completed pass. Any abort leaves artifacts
    /// on disk for the next pass's rescan.
    async fn attempt(&mut self) -> Result<(), AttemptAbort> {
        // Resuming: recompute the cursor from disk; never trust memory.
        let cursor = self.store.resume_cursor(self.worker);
        info!(
            worker = self.worker,
            device = %self.device_config.name,
            sample = cursor.sample,
            item = cursor.item,
            recovering = self.state.recovering,
            "resuming"
        );

        // The tunnel survives recovery restarts; start it once per lifetime.
        if !self.state.started {
            self.tunnel.start().await?;
            self.state.started = true;
        }

        let session = self.driver.open_session(&self.device_config).await?;
        self.state.recovering = false;
        let mut capture = CaptureSession::new(
            Arc::clone(&self.device),
            session,
            self.store.clone(),
            self.capture_config.clone(),
            self.delays.clone(),
            self.worker,
        );

        match self.iterate(&mut capture, cursor).await {
            Ok(()) => {
                // Completed: disconnect the tunnel, release the browser.
                if let Err(err) = self.tunnel.stop().await {
                    warn!(worker = self.worker, %err, "tunnel stop failed at completion");
                }
                self.state.started = false;
                capture.close().await;
                Ok(())
            }
            Err(abort) => {
                capture.close().await;
                Err(abort)
            }
        }
    }

    /// Iterating: samples ascending, items ascending, starting at the cursor.
    async fn iterate(
        &mut self,
        capture: &mut CaptureSession,
        cursor: ResumeCursor,
    ) -> Result<(), AttemptAbort> {
        let mut since_bounce: u32 = 0;
        for sample in cursor.sample..=self.plan.samples {
            let first_item = if sample == cursor.sample { cursor.item } else { 1 };
            for item in first_item..=self.plan.items() {
                let url = self.plan.target(item).to_string();
                self.capture_until_valid(capture, sample, item, &url).await?;

                since_bounce += 1;
                if since_bounce == self.tunnel_config.bounce_every {
                    info!(worker = self.worker, sample, item, "scheduled tunnel bounce");
                    self.tunnel.restart().await?;
                    sleep(self.delays.post_bounce()).await;
                    since_bounce = 0;
                }
            }
            info!(
                worker = self.worker,
                sample,
                total = self.plan.samples,
                "sample pass finished"
            );
        }
        Ok(())
    }

    /// Retrying: repeat one unit until it validates. Unbounded — a
    /// miscalibrated threshold retries forever, so the attempt count is
    /// logged each time to keep that visible.
    async fn capture_until_valid(
        &mut self,
        capture: &mut CaptureSession,
        sample: u32,
        item: u32,
        url: &str,
    ) -> Result<(), AttemptAbort> {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match capture.capture_unit(sample, item, url).await? {
                CaptureOutcome::Valid => return Ok(()),
                CaptureOutcome::Timeout => return Err(AttemptAbort::NavigationTimeout),
                CaptureOutcome::InvalidRetry => {
                    warn!(
                        worker = self.worker,
                        sample, item, attempts, "capture invalid; restarting tunnel and retrying"
                    );
                    self.tunnel.restart().await?;
                }
            }
        }
    }
}
