//! Cadence runtime: runs a [cadence_kernel::Scheduler] at a fixed period.
//!
//! Load a [RuntimeConfig] from TOML, install tracing with [init_tracing], and
//! hand the scheduler to a [PeriodicDriver].

pub mod config;
pub mod driver;
pub mod logging;

pub use config::{
    config_schema, load_config, ConfigError, DriverConfig, LoggingConfig, RuntimeConfig,
};
pub use driver::{DriverStats, PeriodicDriver};
pub use logging::init_tracing;
