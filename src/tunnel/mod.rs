//! Tunnel (VPN app) control.
//!
//! The tunnel app exposes no API — it is driven through its UI: launch the
//! activity, tap the connect toggle, wait out the animation. Each operation
//! is a fixed sequence of [`DeviceControl`] calls with settle delays between
//! steps; the delays exist because the remote UI gives no readiness signal.

use std::sync::Arc;

use anyhow::Result;
use tokio::time::sleep;
use tracing::info;

use crate::config::{SettleDelays, TunnelConfig};
use crate::device::DeviceControl;

/// Per-worker tunnel flags. Owned exclusively by the worker's loop — never
/// shared across workers, so no synchronization is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TunnelState {
    /// The tunnel has been started once for this worker's lifetime.
    /// `start` is skipped on recovery restarts while this is set.
    pub started: bool,
    /// The worker is restarting after a timeout or unexpected failure.
    pub recovering: bool,
}

/// Issues tunnel operations for one device.
pub struct TunnelController {
    device: Arc<dyn DeviceControl>,
    config: TunnelConfig,
    delays: SettleDelays,
}

impl TunnelController {
    pub fn new(device: Arc<dyn DeviceControl>, config: TunnelConfig, delays: SettleDelays) -> Self {
        Self {
            device,
            config,
            delays,
        }
    }

    /// Launch the tunnel app and tap the toggle once to connect.
    pub async fn start(&self) -> Result<()> {
        info!(component = %self.config.component, "starting tunnel");
        self.device.launch_activity(&self.config.component).await?;
        sleep(self.delays.tunnel_launch()).await;
        self.tap_toggle().await?;
        sleep(self.delays.tunnel_tap()).await;
        Ok(())
    }

    /// Tap the toggle once to disconnect. Called at worker completion.
    pub async fn stop(&self) -> Result<()> {
        info!("stopping tunnel");
        sleep(self.delays.tunnel_tap()).await;
        self.tap_toggle().await?;
        sleep(self.delays.tunnel_tap()).await;
        Ok(())
    }

    /// Relaunch the app and tap the toggle twice.
    ///
    /// After a failed capture the toggle state is unknown; two taps land the
    /// tunnel connected whether the first one connected or disconnected it
    /// mid-animation. Used for scheduled rotation and validation recovery.
    pub async fn restart(&self) -> Result<()> {
        info!(component = %self.config.component, "restarting tunnel");
        self.device.launch_activity(&self.config.component).await?;
        sleep(self.delays.tunnel_relaunch()).await;
        self.tap_toggle().await?;
        sleep(self.delays.tunnel_tap()).await;
        self.tap_toggle().await?;
        Ok(())
    }

    async fn tap_toggle(&self) -> Result<()> {
        self.device
            .tap(self.config.toggle_x, self.config.toggle_y)
            .await
    }
}
