//! Browser automation seam.
//!
//! The worker loop only needs three things from a browser: load a URL under a
//! hard timeout, screenshot the result, and tear down. [`NavigationDriver`]
//! opens sessions; [`NavigationSession`] is one live browser on one device.
//! Production talks to an Appium server over the W3C WebDriver protocol
//! ([`webdriver::WebDriverClient`]); tests substitute scripted fakes.

pub mod webdriver;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::DeviceConfig;

/// A live browser session on one device.
#[async_trait]
pub trait NavigationSession: Send {
    /// Navigate to `url`, bounded by `timeout`.
    ///
    /// Returns `Ok(false)` when the page load exceeds the bound — a timeout
    /// is an expected outcome, not an error. `Err` means the driver itself
    /// failed and the session can no longer be trusted.
    async fn load(&mut self, url: &str, timeout: Duration) -> Result<bool>;

    /// Write a screenshot of the current screen to `path`.
    async fn save_screen(&mut self, path: &Path) -> Result<()>;

    /// End the session. Safe to call on a session in any state.
    async fn close(&mut self) -> Result<()>;
}

/// Opens [`NavigationSession`]s against a device's automation endpoint.
#[async_trait]
pub trait NavigationDriver: Send + Sync {
    async fn open_session(&self, device: &DeviceConfig) -> Result<Box<dyn NavigationSession>>;
}
