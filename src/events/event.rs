//! # Runtime events emitted by the fleet and its node supervisors.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Node lifecycle**: started, exited, respawn scheduled
//! - **Health**: resource-limit breaches, core-dump hints, raw node output
//! - **Fleet policy**: required-node exit, shutdown request/progress
//!
//! The [`Event`] struct carries metadata such as the source node, a message
//! text, the child pid, and a [`Severity`] usable by log sinks.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore exact order when events are delivered
//! out of order.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind, Severity};
//!
//! let ev = Event::new(EventKind::NodeExited)
//!     .with_node("camera_driver")
//!     .with_message("exited with status 1")
//!     .with_severity(Severity::Error);
//!
//! assert_eq!(ev.kind, EventKind::NodeExited);
//! assert_eq!(ev.node.as_deref(), Some("camera_driver"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Node lifecycle ===
    /// A node's child process was spawned.
    ///
    /// Sets: `node`, `pid`, `at`, `seq`.
    NodeStarted,

    /// A node's child process exited (or failed to spawn — a synthetic exit).
    ///
    /// Severity is `Info` for a requested stop, `Error` for a crash.
    ///
    /// Sets: `node`, `message` (exit description), `at`, `seq`.
    NodeExited,

    /// A crashed node will be restarted after the respawn delay.
    ///
    /// Sets: `node`, `message` (delay), `at`, `seq`.
    RespawnScheduled,

    // === Health ===
    /// One line of raw output captured from a node's stdout/stderr.
    ///
    /// The message keeps any ANSI escape sequences the node emitted;
    /// severity is always `Raw`.
    ///
    /// Sets: `node`, `message`, `at`, `seq`.
    NodeOutput,

    /// A node's interval CPU or memory usage exceeded its configured limit.
    ///
    /// Advisory only — the node keeps running.
    ///
    /// Sets: `node`, `message` (which limit, observed value), `at`, `seq`.
    LimitExceeded,

    /// A crashed node left a retrievable core dump.
    ///
    /// Sets: `node`, `message` (debugger invocation), `at`, `seq`.
    CoreDumped,

    // === Fleet policy ===
    /// A required node exited; the session is no longer healthy.
    ///
    /// Sets: `node`, `at`, `seq`.
    RequiredNodeExited,

    /// Fleet shutdown requested (OS signal observed or `ok()` turned false).
    ///
    /// Sets: `at`, `seq`.
    ShutdownRequested,

    /// All nodes stopped within the fleet's graceful-stop window.
    ///
    /// Sets: `at`, `seq`.
    AllStoppedWithin,

    /// Graceful-stop window elapsed; the named nodes were force-killed.
    ///
    /// Sets: `message` (node list), `at`, `seq`.
    GraceExceeded,
}

impl EventKind {
    /// Severity a freshly built event of this kind starts with.
    ///
    /// `NodeExited` defaults to `Info` and is upgraded to `Error` by the
    /// publisher when the exit was not requested.
    fn default_severity(self) -> Severity {
        match self {
            EventKind::NodeOutput => Severity::Raw,
            EventKind::LimitExceeded | EventKind::GraceExceeded => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

/// Severity attached to an event, for log sinks.
///
/// `Raw` marks pass-through output from monitored nodes, which is self-coded
/// using ANSI escape sequences; the remaining levels are supervisor-generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Raw output from a monitored node (may contain ANSI escapes).
    Raw,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Fixed-width label used by log sinks.
    pub fn as_label(self) -> &'static str {
        match self {
            Severity::Raw => "  RAW",
            Severity::Info => " INFO",
            Severity::Warning => " WARN",
            Severity::Error => "ERROR",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Severity for log sinks (defaults per kind).
    pub severity: Severity,
    /// Name of the source node, if applicable.
    pub node: Option<Arc<str>>,
    /// Human-readable message (output line, exit description, ...).
    pub message: Option<Arc<str>>,
    /// Child process id, if applicable.
    pub pid: Option<i32>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            severity: kind.default_severity(),
            node: None,
            message: None,
            pid: None,
        }
    }

    /// Attaches the source node name.
    #[inline]
    pub fn with_node(mut self, node: impl Into<Arc<str>>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Attaches a human-readable message.
    #[inline]
    pub fn with_message(mut self, message: impl Into<Arc<str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches the child pid.
    #[inline]
    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Overrides the default severity for this kind.
    #[inline]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}
