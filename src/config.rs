//! # Session-wide configuration.
//!
//! [`Config`] carries the defaults applied to every node that did not set
//! its own value, plus the runtime knobs of the fleet orchestrator: stat
//! interval, respawn delay, and channel capacities.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use procvisor::{Config, RespawnOverride};
//!
//! let mut cfg = Config::default();
//! cfg.stop_timeout = Duration::from_secs(10);
//! cfg.respawn = RespawnOverride::ForceTrue;
//! cfg.cpu_limit = Some(2.0);
//!
//! assert_eq!(cfg.cpu_limit, Some(2.0));
//! ```

use std::time::Duration;

use crate::policies::RespawnOverride;

/// Session defaults and fleet runtime knobs.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default per-node graceful-stop window: how long after the interrupt
    /// signal a node may keep running before it is force-killed.
    pub stop_timeout: Duration,
    /// Default CPU limit in cores (user + system combined); `None` disables
    /// the advisory warning.
    pub cpu_limit: Option<f64>,
    /// Default resident-memory limit in bytes; `None` disables the advisory
    /// warning.
    pub memory_limit: Option<u64>,
    /// Session-wide respawn override applied to every node's declaration.
    pub respawn: RespawnOverride,
    /// Delay before a crashed node (with respawn enabled) is restarted.
    pub respawn_delay: Duration,
    /// Period of the resource-accounting cycle (process-table scan).
    pub stat_interval: Duration,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
    /// Capacity of the pipe-output channel drained by the orchestrator.
    pub mux_capacity: usize,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `stop_timeout = 5s`
    /// - `cpu_limit = None`, `memory_limit = None` (warnings disabled)
    /// - `respawn = ObeyDefaultFalse`, `respawn_delay = 1s`
    /// - `stat_interval = 1s`
    /// - `bus_capacity = 1024`, `mux_capacity = 256`
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(5),
            cpu_limit: None,
            memory_limit: None,
            respawn: RespawnOverride::default(),
            respawn_delay: Duration::from_secs(1),
            stat_interval: Duration::from_secs(1),
            bus_capacity: 1024,
            mux_capacity: 256,
        }
    }
}
