//! # Core runtime: fleet orchestration, node supervision, output plumbing.
//!
//! ## Contents
//! - [`Supervisor`] — the fleet orchestrator and its single driving loop
//! - [`NodeSupervisor`] — one child process's lifecycle state machine
//! - [`OutputMux`] — many child pipes funneled into one bounded channel
//! - `stats` — `/proc` process-table sampling for resource accounting
//! - [`wait_for_shutdown_signal`] — the supervisor's own termination signal

mod mux;
mod node;
mod shutdown;
mod stats;
mod supervisor;

pub use mux::{MuxHandle, OutputMux, PipeEvent, PipePayload, StreamKind};
pub use node::NodeSupervisor;
pub use shutdown::wait_for_shutdown_signal;
pub use stats::{read_process_stat, scan_process_table, ticks_per_second, ProcessSample, ProcessStat};
pub use supervisor::Supervisor;
