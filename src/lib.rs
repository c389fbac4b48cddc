//! # procvisor
//!
//! **Procvisor** is a process-supervision core for Rust: it spawns a fleet
//! of child processes ("nodes"), captures and re-colors their output,
//! attributes CPU/memory usage to them by process group, and restarts or
//! escalates-and-kills them according to per-node policy.
//!
//! The crate is the runtime underneath a launch tool: the launch-description
//! loader, terminal UI, and remote-control layer live elsewhere and talk to
//! this crate through [`NodeSpec`], the query surface on [`NodeSupervisor`],
//! and the event [`Bus`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   NodeSpec   │   │   NodeSpec   │   │   NodeSpec   │
//!     │ (launch #1)  │   │ (launch #2)  │   │ (launch #3)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Supervisor (fleet orchestrator, single driving loop)         │
//! │  - OutputMux (all child pipes ─► one bounded channel)         │
//! │  - /proc scan + pid-keyed sample table (resource accounting)  │
//! │  - stop deadlines, respawn timers, required-node policy       │
//! │  - Bus (broadcast events)                                     │
//! └──────┬──────────────────┬──────────────────┬──────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │NodeSupervisor│   │NodeSupervisor│   │NodeSupervisor│
//!  │ state machine│   │ state machine│   │ state machine│
//!  └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!   │ child process    │ child process    │ child process
//!   │ (own pgid)       │ (own pgid)       │ (own pgid)
//!   │                  │                  │
//!   │ Publishes:       │ Publishes:       │ Publishes:
//!   │ - NodeStarted    │ - NodeOutput     │ - LimitExceeded
//!   │ - NodeExited     │ - CoreDumped     │ - RespawnScheduled
//!   ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │                    Bus (broadcast channel)                    │
//! └───────────────────────────────┬───────────────────────────────┘
//!                                 ▼
//!                     SubscriberSet (per-sub queues)
//!                     LogWriter / dashboards / custom
//! ```
//!
//! ### Node lifecycle
//! ```text
//! start() ─► Running
//!   │  output: pipe chunks ─► SGR interpreter + line split ─► NodeOutput
//!   │
//!   ├─ unrequested exit (any status, even 0):
//!   │    ├─ respawn enabled ─► WaitingForRestart ─(delay)─► start()
//!   │    └─ otherwise       ─► Crashed
//!   │
//!   └─ shutdown(): SIGINT to process group ─► Stopping
//!        ├─ exits within stop_timeout ─► Stopped
//!        └─ deadline passes ─► SIGKILL ─► Stopped (once reaped)
//! ```
//!
//! ## Features
//! | Area            | Description                                                   | Key types                          |
//! |-----------------|---------------------------------------------------------------|------------------------------------|
//! | **Supervision** | Spawn, stop, force-kill, and respawn a fleet of processes.    | [`Supervisor`], [`NodeSupervisor`] |
//! | **Policies**    | Respawn declarations and the session-wide override.           | [`RespawnPolicy`], [`RespawnOverride`] |
//! | **Accounting**  | Per-node CPU/memory via `/proc` and process-group attribution.| [`ProcessStat`]                    |
//! | **Events**      | Broadcast lifecycle/output/health events.                     | [`Event`], [`Bus`], [`Subscribe`]  |
//! | **Terminal**    | Incremental ANSI SGR interpretation of node output.           | [`SgrParser`], [`Style`]           |
//! | **Errors**      | Typed errors for the runtime and node control.                | [`RuntimeError`], [`NodeError`]    |
//!
//! ## Optional features
//! - `logging`: exports the built-in file-backed [`LogWriter`] subscriber.
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use procvisor::{Config, NodeSpec, RespawnPolicy, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.stop_timeout = Duration::from_secs(10);
//!
//!     let mut fleet = Supervisor::new(cfg);
//!     fleet.add_node(
//!         NodeSpec::new("camera_driver", "/opt/ros/bin/camera_node")
//!             .with_namespace("/sensors")
//!             .with_respawn(RespawnPolicy::Always),
//!     );
//!     fleet.add_node(
//!         NodeSpec::new("recorder", "/usr/bin/recorder").with_required(true),
//!     );
//!
//!     // Runs until an OS signal arrives or a required node exits.
//!     fleet.run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod nodes;
mod policies;
mod subscribers;
mod term;

pub use config::Config;
pub use core::{
    read_process_stat, scan_process_table, ticks_per_second, wait_for_shutdown_signal, MuxHandle,
    NodeSupervisor, OutputMux, PipeEvent, PipePayload, ProcessSample, ProcessStat, StreamKind,
    Supervisor,
};
pub use error::{NodeError, RuntimeError};
pub use events::{Bus, Event, EventKind, Severity};
pub use nodes::{NodeSpec, NodeState};
pub use policies::{RespawnOverride, RespawnPolicy};
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
pub use subscribers::{Subscribe, SubscriberSet};
pub use term::{SgrParser, SimpleColor, Style};
