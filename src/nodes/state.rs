//! # Node lifecycle states.
//!
//! [`NodeState`] is the per-node state machine driven by
//! [`NodeSupervisor`](crate::NodeSupervisor):
//!
//! ```text
//!                    start()                exit (requested)
//!   Idle ─────────────────────► Running ──► Stopping ──► Stopped
//!    ▲                            │  ▲         │
//!    │ spawn failed               │  │         └─ force_exit() keeps state;
//!    └────────────────────────────┤  │            Stopped only on reap
//!            exit (unrequested)   │  │ start()
//!                                 ▼  │
//!              Crashed ◄── no ── respawn? ── yes ──► WaitingForRestart
//! ```
//!
//! Invariant: a pid is associated with the node **iff** the state is
//! `Running` or `Stopping`.

/// Lifecycle state of one supervised node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeState {
    /// Never started (or spawn failed); no child was ever associated.
    #[default]
    Idle,
    /// Child process is alive and unsupervised exit has not been observed.
    Running,
    /// Child exited without a shutdown request; respawn is disabled.
    Crashed,
    /// Child exited without a shutdown request; a restart is pending.
    WaitingForRestart,
    /// Shutdown was requested; waiting for the child to exit.
    Stopping,
    /// Child exited after an explicit shutdown request.
    Stopped,
}

impl NodeState {
    /// True while a child process is (still) associated with the node.
    pub fn is_running(self) -> bool {
        matches!(self, NodeState::Running | NodeState::Stopping)
    }

    /// True if `start()` is permitted from this state.
    pub fn can_start(self) -> bool {
        matches!(
            self,
            NodeState::Idle
                | NodeState::Crashed
                | NodeState::Stopped
                | NodeState::WaitingForRestart
        )
    }
}
