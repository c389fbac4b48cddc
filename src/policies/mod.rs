//! Respawn policies.
//!
//! This module groups the knobs that control **if** a node is restarted
//! after its child process exits.
//!
//! ## Contents
//! - [`RespawnPolicy`] — what a node declares for itself (never / always /
//!   defer to the session default)
//! - [`RespawnOverride`] — the session-wide override applied on top of the
//!   declaration (force on/off, or obey with a chosen default)
//!
//! ## Quick wiring
//! ```text
//! NodeSpec { respawn: RespawnPolicy, .. }
//!      └─► Supervisor resolves Config::respawn.resolve(spec.respawn)
//!           once per node at session start; the resolved bool drives the
//!           Crashed vs WaitingForRestart transition on unrequested exits.
//! ```

mod respawn;

pub use respawn::{RespawnOverride, RespawnPolicy};
