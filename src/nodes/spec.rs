//! # Node specification.
//!
//! [`NodeSpec`] is the externally supplied, immutable description of one
//! supervised process: what to run, where, with which environment, and the
//! per-node policy knobs (required flag, respawn declaration, stop timeout,
//! resource limits).
//!
//! Specs come from a launch-description loader outside this crate; here
//! they are plain data. Per-node values left unset (`None`) inherit the
//! session defaults from [`Config`](crate::Config) when the supervisor is
//! built.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{NodeSpec, RespawnPolicy};
//!
//! let spec = NodeSpec::new("camera_driver", "/opt/ros/bin/camera_node")
//!     .with_namespace("/sensors")
//!     .with_args(["--fps", "30"])
//!     .with_required(true)
//!     .with_respawn(RespawnPolicy::Always)
//!     .with_stop_timeout(Duration::from_secs(10));
//!
//! assert_eq!(spec.full_name(), "/sensors/camera_driver");
//! assert!(spec.required());
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::policies::RespawnPolicy;

/// Immutable description of one supervised node.
///
/// Shared by reference ([`Arc`]) between the caller and the node's
/// supervisor; nothing mutates a spec after session start.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    name: Arc<str>,
    namespace: String,
    command: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    cwd: Option<PathBuf>,
    required: bool,
    respawn: RespawnPolicy,
    stop_timeout: Option<Duration>,
    cpu_limit: Option<f64>,
    memory_limit: Option<u64>,
    clear_params: bool,
}

impl NodeSpec {
    /// Creates a spec for `command`, with everything else at its default:
    /// empty namespace/args/env, no working directory, not required,
    /// undeclared respawn, session-default stop timeout and limits.
    pub fn new(name: impl Into<Arc<str>>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: String::new(),
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            required: false,
            respawn: RespawnPolicy::default(),
            stop_timeout: None,
            cpu_limit: None,
            memory_limit: None,
            clear_params: false,
        }
    }

    /// Sets the namespace the node lives in (e.g. `/sensors`).
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Replaces the argument vector.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Adds one environment variable to the overlay applied at spawn.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the working directory the child is spawned in.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Marks the node as required: its exit ends the whole session.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Declares the node's respawn preference.
    pub fn with_respawn(mut self, respawn: RespawnPolicy) -> Self {
        self.respawn = respawn;
        self
    }

    /// Sets the per-node graceful-stop window (overrides the session default).
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }

    /// Sets the per-node CPU limit in cores (overrides the session default).
    pub fn with_cpu_limit(mut self, cores: f64) -> Self {
        self.cpu_limit = Some(cores);
        self
    }

    /// Sets the per-node memory limit in bytes (overrides the session default).
    pub fn with_memory_limit(mut self, bytes: u64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Asks the external parameter layer to clear the node's parameter
    /// namespace before start. Carried as data; this crate does not act
    /// on it.
    pub fn with_clear_params(mut self, clear: bool) -> Self {
        self.clear_params = clear;
        self
    }

    /// The node's short name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the node name.
    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Namespace-qualified name (`namespace/name`).
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.to_string()
        } else {
            format!("{}/{}", self.namespace.trim_end_matches('/'), self.name)
        }
    }

    /// The executable to launch.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Argument vector passed to the executable.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Environment overlay applied on top of the inherited environment.
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Working directory, if one was configured.
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Whether this node's exit ends the session.
    pub fn required(&self) -> bool {
        self.required
    }

    /// The node's declared respawn preference.
    pub fn respawn(&self) -> RespawnPolicy {
        self.respawn
    }

    /// Per-node stop timeout, if declared.
    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout
    }

    /// Per-node CPU limit in cores, if declared.
    pub fn cpu_limit(&self) -> Option<f64> {
        self.cpu_limit
    }

    /// Per-node memory limit in bytes, if declared.
    pub fn memory_limit(&self) -> Option<u64> {
        self.memory_limit
    }

    /// Whether the external parameter layer should clear this node's
    /// parameter namespace before start.
    pub fn clear_params(&self) -> bool {
        self.clear_params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_joins_namespace() {
        let spec = NodeSpec::new("imu", "/bin/true").with_namespace("/sensors/");
        assert_eq!(spec.full_name(), "/sensors/imu");

        let bare = NodeSpec::new("imu", "/bin/true");
        assert_eq!(bare.full_name(), "imu");
    }

    #[test]
    fn unset_fields_stay_none() {
        let spec = NodeSpec::new("imu", "/bin/true");
        assert!(spec.stop_timeout().is_none());
        assert!(spec.cpu_limit().is_none());
        assert!(spec.memory_limit().is_none());
        assert!(!spec.required());
    }
}
