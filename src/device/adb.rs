//! `adb`-backed [`DeviceControl`] implementation.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context as _, Result};
use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::debug;

use super::{DeviceControl, RemoteProc};

/// Drives one device through the `adb` CLI, always scoped with `-s <serial>`.
#[derive(Debug, Clone)]
pub struct AdbControl {
    serial: String,
    adb_path: String,
}

impl AdbControl {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            adb_path: "adb".to_string(),
        }
    }

    /// Override the adb binary path (e.g. a platform-tools checkout).
    pub fn with_adb_path(mut self, path: impl Into<String>) -> Self {
        self.adb_path = path.into();
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        cmd.arg("-s").arg(&self.serial).args(args);
        cmd.stdin(Stdio::null());
        cmd
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        debug!(serial = %self.serial, ?args, "adb");
        let output = self
            .command(args)
            .output()
            .await
            .with_context(|| format!("failed to spawn `{}` — is it on PATH?", self.adb_path))?;
        if !output.status.success() {
            bail!(
                "adb {:?} on {} exited with {}: {}",
                args,
                self.serial,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceControl for AdbControl {
    async fn shell(&self, cmd: &str) -> Result<()> {
        self.run(&["shell", cmd]).await
    }

    async fn shell_su(&self, cmd: &str) -> Result<()> {
        self.run(&["shell", "su", "-c", cmd]).await
    }

    async fn spawn_su(&self, cmd: &str) -> Result<Box<dyn RemoteProc>> {
        debug!(serial = %self.serial, cmd, "adb spawn (su)");
        let child = self
            .command(&["shell", "su", "-c", cmd])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn `{}` — is it on PATH?", self.adb_path))?;
        Ok(Box::new(AdbProc { child }))
    }

    async fn pull(&self, remote: &str, local: &Path) -> Result<()> {
        let local = local
            .to_str()
            .context("local pull path is not valid UTF-8")?;
        self.run(&["pull", remote, local]).await
    }

    async fn tap(&self, x: u32, y: u32) -> Result<()> {
        let x = x.to_string();
        let y = y.to_string();
        self.run(&["shell", "input", "tap", &x, &y]).await
    }

    async fn launch_activity(&self, component: &str) -> Result<()> {
        self.run(&["shell", "am", "start", "-n", component]).await
    }
}

/// Local tether for a backgrounded remote command. Killing it severs the adb
/// connection; the remote process itself is stopped device-side by the caller.
struct AdbProc {
    child: Child,
}

#[async_trait]
impl RemoteProc for AdbProc {
    async fn kill(&mut self) -> Result<()> {
        // Already-exited children are fine; kill() is then a no-op.
        self.child.kill().await.context("failed to kill adb tether")?;
        let _ = self.child.wait().await;
        Ok(())
    }
}
