//! Device command channel.
//!
//! Everything the collector does to a device outside the browser — cache
//! wipes, UI taps, launching the tunnel app, running and killing the remote
//! packet capture, pulling files — goes through [`DeviceControl`]. The
//! production implementation shells out to `adb` ([`adb::AdbControl`]);
//! tests substitute an in-memory fake.

pub mod adb;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

/// Handle to a long-running remote process started with
/// [`DeviceControl::spawn_su`]. Dropping it without [`kill`](RemoteProc::kill)
/// leaks the local tether process; the remote side must additionally be
/// stopped through the device (e.g. `pkill`).
#[async_trait]
pub trait RemoteProc: Send {
    async fn kill(&mut self) -> Result<()>;
}

/// Command/control channel to one device.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Run a shell command on the device and wait for it to finish.
    async fn shell(&self, cmd: &str) -> Result<()>;

    /// Run a shell command as root (`su -c`) and wait for it to finish.
    async fn shell_su(&self, cmd: &str) -> Result<()>;

    /// Start a long-running root shell command without waiting.
    async fn spawn_su(&self, cmd: &str) -> Result<Box<dyn RemoteProc>>;

    /// Copy a device-local file to the host.
    async fn pull(&self, remote: &str, local: &Path) -> Result<()>;

    /// Inject a tap at screen coordinates.
    async fn tap(&self, x: u32, y: u32) -> Result<()>;

    /// Launch an activity by component name (`package/activity`).
    async fn launch_activity(&self, component: &str) -> Result<()>;
}
