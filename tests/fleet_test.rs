//! Fleet supervisor: concurrent workers with independent failure domains.

mod common;

use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use capfleet::artifacts::ArtifactStore;
use capfleet::config::{CaptureConfig, DeviceConfig, FleetConfig, SettleDelays, TunnelConfig};
use capfleet::fleet::FleetSupervisor;
use capfleet::plan::WorkPlan;

use common::{targets, MockDevice, MultiDriver, ScriptState, UnitScript};

fn fleet_config(dir: &TempDir, devices: Vec<DeviceConfig>, samples: u32, items: u32) -> FleetConfig {
    let targets_file = dir.path().join("targets.txt");
    std::fs::write(&targets_file, targets(items).join("\n")).unwrap();
    FleetConfig {
        devices,
        output_dir: dir.path().join("out"),
        targets_file,
        samples,
        capture: CaptureConfig::default(),
        tunnel: TunnelConfig::default(),
        delays: SettleDelays::none(),
    }
}

fn device(n: u32) -> DeviceConfig {
    DeviceConfig {
        name: format!("Pixel 8 - Device {n}"),
        serial: format!("SERIAL{n:02}"),
        endpoint: "http://127.0.0.1:4723".to_string(),
        chromedriver: None,
    }
}

#[tokio::test]
async fn two_workers_complete_independently() {
    let dir = TempDir::new().unwrap();
    let config = fleet_config(&dir, vec![device(1), device(2)], 1, 3);

    let driver = MultiDriver::new();
    // Worker 1 runs clean; worker 2 hits a timeout mid-plan and recovers.
    let script1 = ScriptState::new(vec![UnitScript::valid(); 3]);
    let script2 = ScriptState::new(vec![
        UnitScript::valid(),
        UnitScript::Timeout,
        UnitScript::valid(),
        UnitScript::valid(),
    ]);
    driver.insert("SERIAL01", Arc::clone(&script1));
    driver.insert("SERIAL02", Arc::clone(&script2));

    let mocks: Arc<Mutex<Vec<Arc<MockDevice>>>> = Arc::new(Mutex::new(Vec::new()));
    let scripts = vec![Arc::clone(&script1), Arc::clone(&script2)];
    let mocks_for_factory = Arc::clone(&mocks);
    let supervisor = FleetSupervisor::new(config.clone(), driver.clone())
        .with_device_factory(Box::new(move |device_config| {
            let index: usize = device_config.serial["SERIAL".len()..]
                .parse::<usize>()
                .unwrap()
                - 1;
            let mock = MockDevice::new(Arc::clone(&scripts[index]));
            mocks_for_factory.lock().unwrap().push(Arc::clone(&mock));
            mock
        }));

    supervisor.run_all().await.unwrap();

    let plan = WorkPlan::load(config.samples, &config.targets_file).unwrap();
    let store = ArtifactStore::new(config.output_dir.clone(), &plan);
    assert!(store.is_complete(1));
    assert!(store.is_complete(2));
    assert_eq!(script1.remaining(), 0);
    assert_eq!(script2.remaining(), 0);
    // Worker 1: one session. Worker 2: two (timeout recovery reopened it).
    assert_eq!(driver.sessions_opened(), 3);

    // Both tunnels started exactly once; recovery restarts the browser
    // session, not the tunnel. The recovered worker attempted one extra unit.
    let mocks = mocks.lock().unwrap();
    assert!(mocks.iter().all(|m| m.launches() == 1));
    let mut spawns: Vec<usize> = mocks.iter().map(|m| m.spawns()).collect();
    spawns.sort_unstable();
    assert_eq!(spawns, vec![3, 4]);
}

#[tokio::test]
async fn supervisor_creates_output_directory() {
    let dir = TempDir::new().unwrap();
    let config = fleet_config(&dir, vec![], 1, 1);
    assert!(!config.output_dir.exists());

    let driver = MultiDriver::new();
    let supervisor = FleetSupervisor::new(config.clone(), driver);
    supervisor.run_all().await.unwrap();

    assert!(config.output_dir.exists());
}
