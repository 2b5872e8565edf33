use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SAMPLES: u32 = 20;
const DEFAULT_VISIT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_TUNNEL_PORT: u16 = 51820;
const DEFAULT_SNAPLEN: u32 = 64;
const DEFAULT_MIN_CAPTURE_BYTES: u64 = 10 * 1024;
const DEFAULT_MIN_EVIDENCE_BYTES: u64 = 110 * 1024;
const DEFAULT_BOUNCE_EVERY: u32 = 10;

// ─── DeviceConfig ─────────────────────────────────────────────────────────────

/// One device entry (`[[devices]]` in fleet.toml). Immutable after startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Human-readable name, used only in logs (e.g. "Pixel 8 - Device 1").
    pub name: String,
    /// Device serial as reported by `adb devices`.
    pub serial: String,
    /// WebDriver (Appium) endpoint driving this device's browser.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Path to the chromedriver binary matching the device's Chrome version.
    /// None lets the automation server pick its own.
    #[serde(default)]
    pub chromedriver: Option<PathBuf>,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:4723".to_string()
}

// ─── CaptureConfig ────────────────────────────────────────────────────────────

/// Packet-capture and validation settings (`[capture]` in fleet.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Port the remote tcpdump filters on (the tunnel's data port).
    pub port: u16,
    /// tcpdump snapshot length in bytes. Headers only — payloads are not kept.
    pub snaplen: u32,
    /// Hard bound on a single page load, in seconds.
    pub visit_timeout_secs: u64,
    /// A capture file at or below this many bytes fails validation.
    pub min_capture_bytes: u64,
    /// An evidence (screenshot) file at or below this many bytes fails validation.
    pub min_evidence_bytes: u64,
    /// Device-local directory where tcpdump writes before the pull.
    pub remote_dir: String,
    /// Device-local browser cache directory, wiped before every unit.
    pub browser_cache: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_TUNNEL_PORT,
            snaplen: DEFAULT_SNAPLEN,
            visit_timeout_secs: DEFAULT_VISIT_TIMEOUT_SECS,
            min_capture_bytes: DEFAULT_MIN_CAPTURE_BYTES,
            min_evidence_bytes: DEFAULT_MIN_EVIDENCE_BYTES,
            remote_dir: "/sdcard".to_string(),
            browser_cache: "/data/data/com.android.chrome/cache".to_string(),
        }
    }
}

impl CaptureConfig {
    pub fn visit_timeout(&self) -> Duration {
        Duration::from_secs(self.visit_timeout_secs)
    }
}

// ─── TunnelConfig ─────────────────────────────────────────────────────────────

/// Tunnel app automation settings (`[tunnel]` in fleet.toml).
///
/// The toggle coordinates and component name are inputs, not code: they depend
/// on the installed VPN app and the device's screen geometry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Activity component launched to bring up the tunnel UI.
    pub component: String,
    /// Screen coordinates of the connect/disconnect toggle.
    pub toggle_x: u32,
    pub toggle_y: u32,
    /// Recycle the tunnel after this many consecutive valid captures.
    pub bounce_every: u32,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            component: "net.mullvad.mullvadvpn/.ui.MainActivity".to_string(),
            toggle_x: 540,
            toggle_y: 2100,
            bounce_every: DEFAULT_BOUNCE_EVERY,
        }
    }
}

// ─── SettleDelays ─────────────────────────────────────────────────────────────

/// Fixed waits inserted after external actions (`[delays]` in fleet.toml).
///
/// The remote UI and processes give no readiness signal, so each step is
/// followed by a settle period. Defaults are the minimum-latency contract for
/// real devices; tests shrink them to zero.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SettleDelays {
    /// After launching the tunnel activity.
    pub tunnel_launch_secs: u64,
    /// After relaunching the tunnel activity during a restart (the UI animates
    /// longer when the app is already resident).
    pub tunnel_relaunch_secs: u64,
    /// After each toggle tap.
    pub tunnel_tap_secs: u64,
    /// After wiping the browser cache.
    pub cache_clear_secs: u64,
    /// After starting the remote capture process, so it attaches before traffic.
    pub capture_attach_secs: u64,
    /// After a successful page load, before the screenshot.
    pub post_visit_secs: u64,
    /// After the screenshot, letting late traffic drain into the capture.
    pub evidence_settle_secs: u64,
    /// After stopping the remote capture process.
    pub capture_detach_secs: u64,
    /// After pulling and deleting the remote capture file.
    pub post_transfer_secs: u64,
    /// After a scheduled tunnel bounce, before the next unit.
    pub post_bounce_secs: u64,
    /// Before rebuilding a session after a recovery restart.
    pub recovery_secs: u64,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            tunnel_launch_secs: 5,
            tunnel_relaunch_secs: 7,
            tunnel_tap_secs: 5,
            cache_clear_secs: 5,
            capture_attach_secs: 5,
            post_visit_secs: 2,
            evidence_settle_secs: 20,
            capture_detach_secs: 5,
            post_transfer_secs: 5,
            post_bounce_secs: 2,
            recovery_secs: 5,
        }
    }
}

impl SettleDelays {
    /// All-zero delays for unit tests (no real waiting).
    pub fn none() -> Self {
        Self {
            tunnel_launch_secs: 0,
            tunnel_relaunch_secs: 0,
            tunnel_tap_secs: 0,
            cache_clear_secs: 0,
            capture_attach_secs: 0,
            post_visit_secs: 0,
            evidence_settle_secs: 0,
            capture_detach_secs: 0,
            post_transfer_secs: 0,
            post_bounce_secs: 0,
            recovery_secs: 0,
        }
    }

    pub fn tunnel_launch(&self) -> Duration {
        Duration::from_secs(self.tunnel_launch_secs)
    }
    pub fn tunnel_relaunch(&self) -> Duration {
        Duration::from_secs(self.tunnel_relaunch_secs)
    }
    pub fn tunnel_tap(&self) -> Duration {
        Duration::from_secs(self.tunnel_tap_secs)
    }
    pub fn cache_clear(&self) -> Duration {
        Duration::from_secs(self.cache_clear_secs)
    }
    pub fn capture_attach(&self) -> Duration {
        Duration::from_secs(self.capture_attach_secs)
    }
    pub fn post_visit(&self) -> Duration {
        Duration::from_secs(self.post_visit_secs)
    }
    pub fn evidence_settle(&self) -> Duration {
        Duration::from_secs(self.evidence_settle_secs)
    }
    pub fn capture_detach(&self) -> Duration {
        Duration::from_secs(self.capture_detach_secs)
    }
    pub fn post_transfer(&self) -> Duration {
        Duration::from_secs(self.post_transfer_secs)
    }
    pub fn post_bounce(&self) -> Duration {
        Duration::from_secs(self.post_bounce_secs)
    }
    pub fn recovery(&self) -> Duration {
        Duration::from_secs(self.recovery_secs)
    }
}

// ─── FleetConfig ──────────────────────────────────────────────────────────────

/// Top-level fleet configuration, loaded from a TOML file at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FleetConfig {
    /// Devices to drive, one worker per entry. Worker index = position + 1.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    /// Flat directory receiving every worker's artifact pairs.
    pub output_dir: PathBuf,
    /// Ordered target list, one URL per line. Blank lines are skipped.
    pub targets_file: PathBuf,
    /// Repetition passes over the target list.
    #[serde(default = "default_samples")]
    pub samples: u32,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub tunnel: TunnelConfig,
    #[serde(default)]
    pub delays: SettleDelays,
}

fn default_samples() -> u32 {
    DEFAULT_SAMPLES
}

impl FleetConfig {
    /// Load and parse the TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: FleetConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }
}
