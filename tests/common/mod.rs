//! Shared test doubles: a scripted browser driver and an in-memory device
//! channel that materialize artifact files instead of talking to hardware.
#![allow(dead_code)] // each test binary uses a different subset

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use capfleet::browser::{NavigationDriver, NavigationSession};
use capfleet::config::DeviceConfig;
use capfleet::device::{DeviceControl, RemoteProc};

/// What one scripted capture unit does.
#[derive(Debug, Clone, Copy)]
pub enum UnitScript {
    /// Page loads; produce a capture of `capture_bytes` and evidence of
    /// `evidence_bytes`.
    Produce {
        capture_bytes: usize,
        evidence_bytes: usize,
    },
    /// Page load times out.
    Timeout,
    /// The driver faults mid-load (unexpected error).
    Fault,
}

impl UnitScript {
    /// Sizes comfortably above the default thresholds.
    pub fn valid() -> Self {
        UnitScript::Produce {
            capture_bytes: 20 * 1024,
            evidence_bytes: 200 * 1024,
        }
    }

    /// Sizes below the default capture threshold.
    pub fn undersized() -> Self {
        UnitScript::Produce {
            capture_bytes: 1024,
            evidence_bytes: 200 * 1024,
        }
    }
}

/// Script shared between the driver and the device: units are consumed in
/// order, one per page load.
#[derive(Default)]
pub struct ScriptState {
    queue: Mutex<VecDeque<UnitScript>>,
    current: Mutex<Option<UnitScript>>,
}

impl ScriptState {
    pub fn new(units: Vec<UnitScript>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(units.into()),
            current: Mutex::new(None),
        })
    }

    fn begin_unit(&self) -> UnitScript {
        let unit = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .expect("script exhausted — test drove more units than scripted");
        *self.current.lock().unwrap() = Some(unit);
        unit
    }

    fn current(&self) -> UnitScript {
        self.current
            .lock()
            .unwrap()
            .expect("no unit in flight — load was never called")
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

// ─── Device double ────────────────────────────────────────────────────────────

/// Records every call and writes capture files on `pull`.
pub struct MockDevice {
    pub script: Arc<ScriptState>,
    ops: Mutex<Vec<String>>,
}

impl MockDevice {
    pub fn new(script: Arc<ScriptState>) -> Arc<Self> {
        Arc::new(Self {
            script,
            ops: Mutex::new(Vec::new()),
        })
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    /// Number of tunnel app launches: one for `start`, one per `restart`.
    pub fn launches(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| op.starts_with("launch"))
            .count()
    }

    pub fn taps(&self) -> usize {
        self.ops().iter().filter(|op| op.starts_with("tap")).count()
    }

    pub fn pulls(&self) -> usize {
        self.ops().iter().filter(|op| op.starts_with("pull")).count()
    }

    /// Remote capture processes started (one per attempted unit).
    pub fn spawns(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| op.starts_with("spawn"))
            .count()
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl DeviceControl for MockDevice {
    async fn shell(&self, cmd: &str) -> Result<()> {
        self.record(format!("shell {cmd}"));
        Ok(())
    }

    async fn shell_su(&self, cmd: &str) -> Result<()> {
        self.record(format!("su {cmd}"));
        Ok(())
    }

    async fn spawn_su(&self, cmd: &str) -> Result<Box<dyn RemoteProc>> {
        self.record(format!("spawn {cmd}"));
        Ok(Box::new(NoopProc))
    }

    async fn pull(&self, remote: &str, local: &Path) -> Result<()> {
        self.record(format!("pull {remote}"));
        let bytes = match self.script.current() {
            UnitScript::Produce { capture_bytes, .. } => vec![0u8; capture_bytes],
            other => panic!("pull during a non-producing unit: {other:?}"),
        };
        std::fs::write(local, bytes)?;
        Ok(())
    }

    async fn tap(&self, x: u32, y: u32) -> Result<()> {
        self.record(format!("tap {x},{y}"));
        Ok(())
    }

    async fn launch_activity(&self, component: &str) -> Result<()> {
        self.record(format!("launch {component}"));
        Ok(())
    }
}

struct NoopProc;

#[async_trait]
impl RemoteProc for NoopProc {
    async fn kill(&mut self) -> Result<()> {
        Ok(())
    }
}

// ─── Browser double ───────────────────────────────────────────────────────────

/// Opens scripted sessions; counts how many were opened.
pub struct ScriptedDriver {
    script: Arc<ScriptState>,
    sessions_opened: AtomicU32,
}

impl ScriptedDriver {
    pub fn new(script: Arc<ScriptState>) -> Arc<Self> {
        Arc::new(Self {
            script,
            sessions_opened: AtomicU32::new(0),
        })
    }

    pub fn sessions_opened(&self) -> u32 {
        self.sessions_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NavigationDriver for ScriptedDriver {
    async fn open_session(&self, _device: &DeviceConfig) -> Result<Box<dyn NavigationSession>> {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
        }))
    }
}

/// Fleet-level driver: routes each device (by serial) to its own script, so
/// concurrent workers never consume each other's units.
#[derive(Default)]
pub struct MultiDriver {
    scripts: Mutex<std::collections::HashMap<String, Arc<ScriptState>>>,
    sessions_opened: AtomicU32,
}

impl MultiDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, serial: &str, script: Arc<ScriptState>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(serial.to_string(), script);
    }

    pub fn sessions_opened(&self) -> u32 {
        self.sessions_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NavigationDriver for MultiDriver {
    async fn open_session(&self, device: &DeviceConfig) -> Result<Box<dyn NavigationSession>> {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&device.serial)
            .cloned()
            .unwrap_or_else(|| panic!("no script registered for serial {}", device.serial));
        Ok(Box::new(ScriptedSession { script }))
    }
}

struct ScriptedSession {
    script: Arc<ScriptState>,
}

#[async_trait]
impl NavigationSession for ScriptedSession {
    async fn load(&mut self, _url: &str, _timeout: Duration) -> Result<bool> {
        match self.script.begin_unit() {
            UnitScript::Produce { .. } => Ok(true),
            UnitScript::Timeout => Ok(false),
            UnitScript::Fault => bail!("driver connection lost"),
        }
    }

    async fn save_screen(&mut self, path: &Path) -> Result<()> {
        let bytes = match self.script.current() {
            UnitScript::Produce { evidence_bytes, .. } => vec![0u8; evidence_bytes],
            other => panic!("save_screen during a non-producing unit: {other:?}"),
        };
        std::fs::write(path, bytes)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

// ─── Fixture helpers ──────────────────────────────────────────────────────────

pub fn device_config() -> DeviceConfig {
    DeviceConfig {
        name: "Pixel 8 - Device 1".to_string(),
        serial: "TESTSERIAL01".to_string(),
        endpoint: "http://127.0.0.1:4723".to_string(),
        chromedriver: None,
    }
}

pub fn targets(n: u32) -> Vec<String> {
    (1..=n).map(|i| format!("https://site{i}.example")).collect()
}

pub fn write_pair(dir: &Path, worker: u32, sample: u32, item: u32) {
    let stem = format!("URL_{item}_Sample_{sample}_D_{worker}");
    std::fs::write(dir.join(format!("{stem}.pcap")), vec![0u8; 20 * 1024]).unwrap();
    std::fs::write(dir.join(format!("{stem}.png")), vec![0u8; 200 * 1024]).unwrap();
}

/// Path pair existence check without going through the store.
pub fn pair_exists(dir: &Path, worker: u32, sample: u32, item: u32) -> bool {
    let stem = format!("URL_{item}_Sample_{sample}_D_{worker}");
    dir.join(format!("{stem}.pcap")).exists() && dir.join(format!("{stem}.png")).exists()
}
