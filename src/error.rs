//! Error types used by the procvisor runtime and node supervisors.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — errors raised by the fleet orchestration itself.
//! - [`NodeError`] — errors raised while controlling a single node process.
//!
//! Both types provide `as_label()` for logging/metrics. Nothing here is ever
//! fatal to the supervising process: failures degrade to a published event
//! and a local state change.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the fleet runtime.
///
/// These represent failures in the orchestration layer itself, such as a
/// shutdown sequence exceeding the fleet's graceful-stop window.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Graceful shutdown window elapsed; the listed nodes had to be SIGKILLed.
    #[error("shutdown timeout {grace:?} exceeded; still running: {stuck:?}; forcing exit")]
    GraceExceeded {
        /// The fleet-wide graceful-stop window that was exceeded.
        grace: Duration,
        /// Names of the nodes that did not stop in time.
        stuck: Vec<String>,
    },

    /// Registering OS signal listeners failed.
    #[error("could not install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal(_) => "runtime_signal_setup",
        }
    }
}

/// # Errors produced while controlling one node.
///
/// Spawn failures are reported to the caller *and* surfaced as a synthetic
/// exit event, so required-node policy applies identically to an exec
/// failure and to a runtime crash.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum NodeError {
    /// `start()` was called while a child is still associated with the node.
    #[error("node '{name}' is already running")]
    AlreadyRunning {
        /// Node name.
        name: String,
    },

    /// The configured command could not be forked/execed.
    #[error("could not launch '{command}': {source}")]
    Spawn {
        /// The executable that failed to launch.
        command: String,
        /// Underlying OS error.
        source: std::io::Error,
    },
}

impl NodeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            NodeError::AlreadyRunning { .. } => "node_already_running",
            NodeError::Spawn { .. } => "node_spawn_failed",
        }
    }
}
