//! Fleet supervisor — one worker task per configured device.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use futures_util::future::join_all;
use tracing::{error, info};

use crate::artifacts::ArtifactStore;
use crate::browser::NavigationDriver;
use crate::config::{DeviceConfig, FleetConfig};
use crate::device::adb::AdbControl;
use crate::device::DeviceControl;
use crate::plan::WorkPlan;
use crate::worker::WorkerLoop;

/// Builds the command channel for one device. The default shells out to
/// `adb`; tests substitute in-memory devices.
pub type DeviceFactory = Box<dyn Fn(&DeviceConfig) -> Arc<dyn DeviceControl> + Send + Sync>;

/// Spawn one [`WorkerLoop`] per device and wait for all of them.
///
/// Workers are fully independent: artifact names are partitioned by worker
/// index and each loop owns its device channel and tunnel state, so nothing
/// is shared between tasks. A panicked worker is logged and does not affect
/// the rest of the fleet.
pub struct FleetSupervisor {
    config: FleetConfig,
    driver: Arc<dyn NavigationDriver>,
    device_factory: DeviceFactory,
}

impl FleetSupervisor {
    pub fn new(config: FleetConfig, driver: Arc<dyn NavigationDriver>) -> Self {
        Self {
            config,
            driver,
            device_factory: Box::new(|device| Arc::new(AdbControl::new(device.serial.clone()))),
        }
    }

    /// Replace the device channel constructor (used by tests).
    pub fn with_device_factory(mut self, factory: DeviceFactory) -> Self {
        self.device_factory = factory;
        self
    }

    /// Run every device's collection loop to completion.
    pub async fn run_all(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                self.config.output_dir.display()
            )
        })?;
        let plan = Arc::new(WorkPlan::load(
            self.config.samples,
            &self.config.targets_file,
        )?);
        info!(
            devices = self.config.devices.len(),
            samples = plan.samples,
            items = plan.items(),
            "starting fleet"
        );

        let mut handles = Vec::with_capacity(self.config.devices.len());
        for (index, device_config) in self.config.devices.iter().enumerate() {
            let worker = (index + 1) as u32;
            let device = (self.device_factory)(device_config);
            let store = ArtifactStore::new(self.config.output_dir.clone(), &plan);
            let mut worker_loop = WorkerLoop::new(
                worker,
                device_config.clone(),
                device,
                Arc::clone(&self.driver),
                Arc::clone(&plan),
                store,
                self.config.capture.clone(),
                self.config.tunnel.clone(),
                self.config.delays.clone(),
            );
            handles.push(tokio::spawn(async move {
                worker_loop.run().await;
            }));
        }

        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            if let Err(err) = joined {
                error!(worker = index + 1, %err, "worker task panicked");
            }
        }
        info!("all workers completed");
        Ok(())
    }
}
