//! # Respawn policy resolution.
//!
//! A node *declares* whether it wants to be restarted after an unrequested
//! exit ([`RespawnPolicy`]); the session carries an *override*
//! ([`RespawnOverride`]) that can force the decision fleet-wide or fill in
//! the default for nodes that did not declare anything.
//!
//! Only unrequested exits consult the resolved policy — a node stopped via
//! an explicit shutdown request is never respawned.

/// Per-node respawn declaration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RespawnPolicy {
    /// The node is never restarted automatically.
    Never,
    /// The node is restarted after every unrequested exit.
    Always,
    /// The node did not declare a preference; the session default applies.
    #[default]
    Default,
}

/// Session-wide respawn override.
///
/// `Force*` variants ignore per-node declarations entirely; `Obey*` variants
/// honor them and only decide the [`RespawnPolicy::Default`] case.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RespawnOverride {
    /// Restart every node, regardless of its declaration.
    ForceTrue,
    /// Restart no node, regardless of its declaration.
    ForceFalse,
    /// Honor declarations; undeclared nodes respawn.
    ObeyDefaultTrue,
    /// Honor declarations; undeclared nodes do not respawn.
    #[default]
    ObeyDefaultFalse,
}

impl RespawnOverride {
    /// Resolves a node's declared policy against this override.
    ///
    /// Returns whether the node should be restarted after an unrequested
    /// exit.
    pub fn resolve(self, declared: RespawnPolicy) -> bool {
        match self {
            RespawnOverride::ForceTrue => true,
            RespawnOverride::ForceFalse => false,
            RespawnOverride::ObeyDefaultTrue => !matches!(declared, RespawnPolicy::Never),
            RespawnOverride::ObeyDefaultFalse => matches!(declared, RespawnPolicy::Always),
        }
    }
}
