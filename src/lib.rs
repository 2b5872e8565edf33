pub mod artifacts;
pub mod browser;
pub mod capture;
pub mod config;
pub mod device;
pub mod fleet;
pub mod plan;
pub mod tunnel;
pub mod worker;
