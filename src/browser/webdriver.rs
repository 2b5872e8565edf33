//! Minimal W3C WebDriver client for an Appium endpoint.
//!
//! Only the four calls the collector needs: create session, set page-load
//! timeout + navigate, screenshot, delete session. Capabilities request the
//! UiAutomator2 driver with Chrome, matching what the Appium server expects
//! for Android browser automation.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{NavigationDriver, NavigationSession};
use crate::config::DeviceConfig;

/// Shared HTTP client; one instance serves every device in the fleet since
/// each session carries its own endpoint-scoped URL.
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: reqwest::Client,
}

impl WebDriverClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http })
    }
}

/// W3C `alwaysMatch` capabilities for one device.
fn capabilities(device: &DeviceConfig) -> Value {
    let mut always_match = json!({
        "platformName": "Android",
        "browserName": "Chrome",
        "appium:automationName": "UiAutomator2",
        "appium:deviceName": device.name,
        "appium:udid": device.serial,
        "appium:noReset": false,
    });
    if let Some(ref chromedriver) = device.chromedriver {
        always_match["appium:chromedriverExecutable"] =
            json!(chromedriver.display().to_string());
    }
    json!({ "capabilities": { "alwaysMatch": always_match } })
}

/// Pull `value.sessionId` out of a new-session response.
fn session_id(body: &Value) -> Result<String> {
    body.pointer("/value/sessionId")
        .and_then(Value::as_str)
        .map(String::from)
        .context("new-session response carried no sessionId")
}

/// WebDriver reports a page-load timeout as an error body with
/// `value.error == "timeout"`.
fn is_timeout_error(body: &Value) -> bool {
    body.pointer("/value/error").and_then(Value::as_str) == Some("timeout")
}

#[async_trait]
impl NavigationDriver for WebDriverClient {
    async fn open_session(&self, device: &DeviceConfig) -> Result<Box<dyn NavigationSession>> {
        let url = format!("{}/session", device.endpoint.trim_end_matches('/'));
        info!(device = %device.name, endpoint = %device.endpoint, "opening browser session");
        let response = self
            .http
            .post(&url)
            .json(&capabilities(device))
            .send()
            .await
            .with_context(|| format!("failed to reach automation endpoint {}", device.endpoint))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .context("new-session response was not JSON")?;
        if !status.is_success() {
            bail!("new-session rejected ({status}): {body}");
        }
        let id = session_id(&body)?;
        debug!(session = %id, "browser session open");
        Ok(Box::new(WebDriverSession {
            http: self.http.clone(),
            base: format!("{}/session/{}", device.endpoint.trim_end_matches('/'), id),
        }))
    }
}

struct WebDriverSession {
    http: reqwest::Client,
    base: String,
}

impl WebDriverSession {
    async fn post(&self, path: &str, payload: Value) -> Result<(reqwest::StatusCode, Value)> {
        let response = self
            .http
            .post(format!("{}{path}", self.base))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("webdriver POST {path} failed"))?;
        let status = response.status();
        let body = response
            .json()
            .await
            .with_context(|| format!("webdriver POST {path} returned non-JSON"))?;
        Ok((status, body))
    }
}

#[async_trait]
impl NavigationSession for WebDriverSession {
    async fn load(&mut self, url: &str, timeout: Duration) -> Result<bool> {
        let (status, body) = self
            .post("/timeouts", json!({ "pageLoad": timeout.as_millis() as u64 }))
            .await?;
        if !status.is_success() {
            bail!("setting page-load timeout failed ({status}): {body}");
        }

        let (status, body) = self.post("/url", json!({ "url": url })).await?;
        if status.is_success() {
            return Ok(true);
        }
        if is_timeout_error(&body) {
            return Ok(false);
        }
        bail!("navigation to {url} failed ({status}): {body}");
    }

    async fn save_screen(&mut self, path: &Path) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/screenshot", self.base))
            .send()
            .await
            .context("webdriver GET /screenshot failed")?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .context("screenshot response was not JSON")?;
        if !status.is_success() {
            bail!("screenshot failed ({status}): {body}");
        }
        let encoded = body
            .pointer("/value")
            .and_then(Value::as_str)
            .context("screenshot response carried no image data")?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .context("screenshot payload was not valid base64")?;
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("failed to write screenshot {}", path.display()))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let response = self
            .http
            .delete(self.base.as_str())
            .send()
            .await
            .context("webdriver DELETE session failed")?;
        if !response.status().is_success() {
            bail!("session delete rejected ({})", response.status());
        }
        Ok(())
    }
}
