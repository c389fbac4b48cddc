//! # NodeSupervisor: single-node lifecycle supervisor.
//!
//! Owns one child process end to end: spawn in its own process group,
//! output capture and recoloring, crash detection, escalating stop, and
//! the respawn decision.
//!
//! ## Lifecycle
//! ```text
//! start() ─► spawn (own pgid, piped stdout/stderr registered with the mux)
//!          ─► Running
//!
//! output path:  Data chunk ─► SGR interpreter + line splitter ─► NodeOutput
//! exit path:    EOF on BOTH pipes ─► reap (wait)
//!                 ├─ stop was requested ─► Stopped
//!                 └─ unrequested exit (any status — a clean zero exit
//!                    counts as a crash for monitoring purposes)
//!                      ├─ respawn enabled ─► WaitingForRestart (delayed)
//!                      └─ otherwise       ─► Crashed
//!
//! shutdown():   SIGINT to the process group ─► Stopping + deadline
//! force_exit(): SIGKILL to the process group; state only advances when
//!               the exit is actually observed
//! ```
//!
//! ## Rules
//! - `pid` is set **iff** the state is Running or Stopping (checked by the
//!   fleet's tests after every transition).
//! - A new start is refused until the previous child has been reaped.
//! - Resource-limit breaches are advisory: a Warning event, never a kill.

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};

use crate::config::Config;
use crate::core::mux::{MuxHandle, StreamKind};
use crate::error::NodeError;
use crate::events::{Bus, Event, EventKind, Severity};
use crate::nodes::{NodeSpec, NodeState};
use crate::term::{SgrParser, Style};

/// A partial output line is flushed once it grows past this bound.
const LINE_BUFFER_MAX: usize = 4096;

/// Interval accumulators for the resource-accounting cycle.
#[derive(Debug, Default)]
struct Accounting {
    /// User-mode CPU ticks attributed this interval.
    user_ticks: u64,
    /// Kernel-mode CPU ticks attributed this interval.
    system_ticks: u64,
    /// Resident memory summed over the node's process group this interval.
    memory: u64,
    /// Highest memory observed over the node's lifetime.
    peak_memory: u64,
    /// CPU fraction computed by the last `end_stat_update`.
    cpu_load: f64,
}

/// Supervises one child process and its lifecycle state machine.
pub struct NodeSupervisor {
    spec: Arc<NodeSpec>,
    bus: Bus,
    mux: MuxHandle,

    state: NodeState,
    child: Option<Child>,
    pid: Option<i32>,

    // Resolved against the session defaults at construction.
    respawn_enabled: bool,
    respawn_delay: Duration,
    stop_timeout: Duration,
    cpu_limit: Option<f64>,
    memory_limit: Option<u64>,

    eof_stdout: bool,
    eof_stderr: bool,
    stdout_line: Vec<u8>,
    stderr_line: Vec<u8>,
    sgr: SgrParser,

    acct: Accounting,
    stop_deadline: Option<Instant>,
    restart_at: Option<Instant>,
    force_issued: bool,
    coredump: Option<String>,
}

impl NodeSupervisor {
    /// Builds a supervisor for `spec`, resolving unset per-node values
    /// against the session [`Config`].
    pub(crate) fn new(spec: Arc<NodeSpec>, cfg: &Config, bus: Bus, mux: MuxHandle) -> Self {
        Self {
            respawn_enabled: cfg.respawn.resolve(spec.respawn()),
            respawn_delay: cfg.respawn_delay,
            stop_timeout: spec.stop_timeout().unwrap_or(cfg.stop_timeout),
            cpu_limit: spec.cpu_limit().or(cfg.cpu_limit),
            memory_limit: spec.memory_limit().or(cfg.memory_limit),
            spec,
            bus,
            mux,
            state: NodeState::Idle,
            child: None,
            pid: None,
            eof_stdout: false,
            eof_stderr: false,
            stdout_line: Vec::new(),
            stderr_line: Vec::new(),
            sgr: SgrParser::new(),
            acct: Accounting::default(),
            stop_deadline: None,
            restart_at: None,
            force_issued: false,
            coredump: None,
        }
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Spawns the node's child process.
    ///
    /// Refused with [`NodeError::AlreadyRunning`] while a child is still
    /// associated. The child is made leader of its own process group so
    /// that descendants it forks stay attributable and signalable.
    ///
    /// A spawn failure leaves the node Idle and fires one synthetic
    /// [`EventKind::NodeExited`] so required-node policy applies the same
    /// way it does to a runtime crash.
    pub fn start(&mut self) -> Result<(), NodeError> {
        if !self.state.can_start() || self.child.is_some() {
            return Err(NodeError::AlreadyRunning {
                name: self.spec.name().to_string(),
            });
        }

        let mut cmd = Command::new(self.spec.command());
        cmd.args(self.spec.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(false);
        for (key, value) in self.spec.env() {
            cmd.env(key, value);
        }
        if let Some(cwd) = self.spec.cwd() {
            cmd.current_dir(cwd);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.state = NodeState::Idle;
                self.bus.publish(
                    Event::new(EventKind::NodeExited)
                        .with_node(self.spec.name_arc())
                        .with_message(format!(
                            "could not launch '{}': {source}",
                            self.spec.command()
                        ))
                        .with_severity(Severity::Error),
                );
                return Err(NodeError::Spawn {
                    command: self.spec.command().to_string(),
                    source,
                });
            }
        };

        // id() is Some until the child has been polled to completion, so
        // right after spawn it must hold a pid. A child without one cannot
        // be signalled or attributed; report it like a failed spawn rather
        // than supervising under an invented pid.
        let pid = match child.id() {
            Some(pid) => pid as i32,
            None => {
                self.state = NodeState::Idle;
                self.bus.publish(
                    Event::new(EventKind::NodeExited)
                        .with_node(self.spec.name_arc())
                        .with_message(format!(
                            "'{}' exited before supervision could begin",
                            self.spec.command()
                        ))
                        .with_severity(Severity::Error),
                );
                return Err(NodeError::Spawn {
                    command: self.spec.command().to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "child exited before its pid could be observed",
                    ),
                });
            }
        };
        if let Some(stdout) = child.stdout.take() {
            self.mux
                .watch(self.spec.name_arc(), StreamKind::Stdout, stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            self.mux
                .watch(self.spec.name_arc(), StreamKind::Stderr, stderr);
        }

        self.child = Some(child);
        self.pid = Some(pid);
        self.state = NodeState::Running;
        self.eof_stdout = false;
        self.eof_stderr = false;
        self.stdout_line.clear();
        self.stderr_line.clear();
        self.force_issued = false;
        self.stop_deadline = None;
        self.restart_at = None;
        self.coredump = None;
        self.acct = Accounting::default();

        self.bus.publish(
            Event::new(EventKind::NodeStarted)
                .with_node(self.spec.name_arc())
                .with_pid(pid),
        );
        Ok(())
    }

    /// Requests a graceful stop: SIGINT to the process group, transition to
    /// Stopping, and a deadline after which the fleet force-kills.
    ///
    /// No-op unless the node is Running.
    pub fn shutdown(&mut self) {
        if self.state != NodeState::Running {
            return;
        }
        if let Some(pgid) = self.pid {
            // ESRCH just means the group died under us; the pipe EOFs are
            // already on their way.
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGINT);
        }
        self.state = NodeState::Stopping;
        self.stop_deadline = Some(Instant::now() + self.stop_timeout);
    }

    /// Unconditional SIGKILL to the process group, whatever the state, as
    /// long as a pid is present. The logical state only reaches Stopped once
    /// the exit is actually observed.
    pub fn force_exit(&mut self) {
        if let Some(pgid) = self.pid {
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
            self.force_issued = true;
        }
    }

    /// True while a child process is associated (Running or Stopping).
    pub fn running(&self) -> bool {
        self.state.is_running()
    }

    // ---------------------------
    // Output & exit path (driven by the fleet's mux loop)
    // ---------------------------

    /// Consumes one output chunk: feeds the SGR interpreter and publishes
    /// complete lines as Raw [`EventKind::NodeOutput`] events.
    pub(crate) fn handle_output(&mut self, stream: StreamKind, bytes: &[u8]) {
        self.sgr.feed_bytes(bytes);

        let buf = match stream {
            StreamKind::Stdout => &mut self.stdout_line,
            StreamKind::Stderr => &mut self.stderr_line,
        };
        buf.extend_from_slice(bytes);

        let mut lines: Vec<String> = Vec::new();
        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        if buf.len() > LINE_BUFFER_MAX {
            lines.push(String::from_utf8_lossy(buf).into_owned());
            buf.clear();
        }

        for line in lines {
            self.publish_output(line);
        }
    }

    /// Notes EOF on one pipe; once both pipes have closed, reaps the child
    /// and runs the exit state machine. Returns true if the node exited.
    pub(crate) async fn handle_eof(&mut self, stream: StreamKind) -> bool {
        let remainder = match stream {
            StreamKind::Stdout => {
                self.eof_stdout = true;
                std::mem::take(&mut self.stdout_line)
            }
            StreamKind::Stderr => {
                self.eof_stderr = true;
                std::mem::take(&mut self.stderr_line)
            }
        };
        if !remainder.is_empty() {
            self.publish_output(String::from_utf8_lossy(&remainder).into_owned());
        }

        if self.eof_stdout && self.eof_stderr && self.child.is_some() {
            self.reap().await;
            true
        } else {
            false
        }
    }

    /// True when both pipes have closed but the exit has not been observed
    /// yet; a previous [`Self::reap`] was cancelled mid-wait.
    pub(crate) fn reap_pending(&self) -> bool {
        self.eof_stdout && self.eof_stderr && self.child.is_some()
    }

    /// Reaps the exited child and applies the exit state machine.
    ///
    /// Cancellation-safe: the child stays attached until its status is in
    /// hand, so a caller that drops this future mid-wait (a losing
    /// `select!` branch) leaves the node recoverable: [`Self::reap_pending`]
    /// stays true and the next call picks the wait back up.
    pub(crate) async fn reap(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        // Both pipes are closed, so the process has normally exited already.
        // A process that closed its pipes but lives on gets the same
        // escalation as an unresponsive stop: its graceful window, then
        // SIGKILL.
        let status = match tokio::time::timeout(self.stop_timeout, child.wait()).await {
            Ok(res) => res.ok(),
            Err(_) => {
                if let Some(pgid) = self.pid {
                    let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
                    self.force_issued = true;
                }
                child.wait().await.ok()
            }
        };
        self.child = None;
        if status.map(|s| s.signal().is_some()).unwrap_or(false) {
            self.probe_coredump();
        }
        self.pid = None;
        self.stop_deadline = None;

        let requested = self.state == NodeState::Stopping;
        let description = describe_exit(status);

        if requested {
            self.state = NodeState::Stopped;
            self.bus.publish(
                Event::new(EventKind::NodeExited)
                    .with_node(self.spec.name_arc())
                    .with_message(description),
            );
        } else {
            // Unrequested exit: a crash for monitoring purposes, even with
            // a zero status.
            self.bus.publish(
                Event::new(EventKind::NodeExited)
                    .with_node(self.spec.name_arc())
                    .with_message(description)
                    .with_severity(Severity::Error),
            );
            if self.respawn_enabled {
                self.state = NodeState::WaitingForRestart;
                self.restart_at = Some(Instant::now() + self.respawn_delay);
                self.bus.publish(
                    Event::new(EventKind::RespawnScheduled)
                        .with_node(self.spec.name_arc())
                        .with_message(format!("restarting in {:?}", self.respawn_delay)),
                );
            } else {
                self.state = NodeState::Crashed;
            }
        }

        if let Some(command) = &self.coredump {
            self.bus.publish(
                Event::new(EventKind::CoreDumped)
                    .with_node(self.spec.name_arc())
                    .with_message(command.clone()),
            );
        }
    }

    /// Looks for a core file next to the node's working directory and, if
    /// one is there, prepares the debugger invocation.
    fn probe_coredump(&mut self) {
        let dir = self
            .spec
            .cwd()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| std::path::PathBuf::from("."));

        let candidates = ["core".to_string(), format!("core.{}", self.pid.unwrap_or(0))];
        for name in candidates {
            let path = dir.join(&name);
            if path.is_file() {
                self.coredump = Some(format!(
                    "gdb {} {}",
                    self.spec.command(),
                    path.display()
                ));
                return;
            }
        }
    }

    fn publish_output(&self, line: String) {
        self.bus.publish(
            Event::new(EventKind::NodeOutput)
                .with_node(self.spec.name_arc())
                .with_message(line),
        );
    }

    // ---------------------------
    // Timers (checked by the fleet each tick)
    // ---------------------------

    /// True if the node is Stopping, its deadline passed, and no SIGKILL
    /// was issued yet.
    pub(crate) fn stop_deadline_passed(&self, now: Instant) -> bool {
        self.state == NodeState::Stopping
            && !self.force_issued
            && self.stop_deadline.map(|d| d <= now).unwrap_or(false)
    }

    /// True if a scheduled respawn is due.
    pub(crate) fn restart_due(&self, now: Instant) -> bool {
        self.state == NodeState::WaitingForRestart
            && self.restart_at.map(|t| t <= now).unwrap_or(false)
    }

    // ---------------------------
    // Resource accounting (driven once per interval by the fleet)
    // ---------------------------

    /// Opens a new accounting interval.
    pub(crate) fn begin_stat_update(&mut self) {
        self.acct.user_ticks = 0;
        self.acct.system_ticks = 0;
        self.acct.memory = 0;
    }

    /// Attributes one process's CPU-tick delta to this node.
    pub(crate) fn add_cpu_time(&mut self, user: u64, system: u64) {
        self.acct.user_ticks += user;
        self.acct.system_ticks += system;
    }

    /// Attributes one process's resident memory to this node.
    pub(crate) fn add_memory(&mut self, rss_bytes: u64) {
        self.acct.memory += rss_bytes;
    }

    /// Closes the interval: computes the CPU fraction against the elapsed
    /// wall time (in ticks) and raises advisory warnings on limit breaches.
    pub(crate) fn end_stat_update(&mut self, elapsed_ticks: f64) {
        self.acct.cpu_load = if elapsed_ticks > 0.0 {
            (self.acct.user_ticks + self.acct.system_ticks) as f64 / elapsed_ticks
        } else {
            0.0
        };
        self.acct.peak_memory = self.acct.peak_memory.max(self.acct.memory);

        if let Some(limit) = self.cpu_limit {
            if self.acct.cpu_load > limit {
                self.bus.publish(
                    Event::new(EventKind::LimitExceeded)
                        .with_node(self.spec.name_arc())
                        .with_message(format!(
                            "CPU usage {:.1}% exceeds limit of {:.1}%",
                            self.acct.cpu_load * 100.0,
                            limit * 100.0
                        )),
                );
            }
        }
        if let Some(limit) = self.memory_limit {
            if self.acct.memory > limit {
                self.bus.publish(
                    Event::new(EventKind::LimitExceeded)
                        .with_node(self.spec.name_arc())
                        .with_message(format!(
                            "memory usage {} B exceeds limit of {} B",
                            self.acct.memory, limit
                        )),
                );
            }
        }
    }

    // ---------------------------
    // Query surface (dashboard / remote-control layer)
    // ---------------------------

    /// The node's short name.
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// Namespace-qualified name.
    pub fn full_name(&self) -> String {
        self.spec.full_name()
    }

    /// The spec this supervisor was built from.
    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Pid of the running child, if one is associated.
    pub fn pid(&self) -> Option<i32> {
        self.pid
    }

    /// The node's resolved graceful-stop window.
    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    /// CPU fraction (1.0 = one core) over the last accounting interval.
    pub fn cpu_load(&self) -> f64 {
        self.acct.cpu_load
    }

    /// Resident memory summed over the process group, last interval.
    pub fn memory(&self) -> u64 {
        self.acct.memory
    }

    /// Peak resident memory observed over the node's lifetime.
    pub fn peak_memory(&self) -> u64 {
        self.acct.peak_memory
    }

    /// Whether the last exit left a retrievable core dump.
    pub fn coredump_available(&self) -> bool {
        self.coredump.is_some()
    }

    /// Ready-to-paste debugger invocation for the last core dump.
    pub fn debugger_command(&self) -> Option<&str> {
        self.coredump.as_deref()
    }

    /// Current color/attribute snapshot of the node's output stream.
    pub fn output_style(&self) -> Style {
        self.sgr.style()
    }

    /// Test hook: pretend a child with `pid` is running, without spawning.
    #[cfg(test)]
    pub(crate) fn force_running_for_tests(&mut self, pid: i32) {
        self.state = NodeState::Running;
        self.pid = Some(pid);
    }

    /// Test hook: pretend the associated child is gone.
    #[cfg(test)]
    pub(crate) fn force_stopped_for_tests(&mut self) {
        self.state = NodeState::Stopped;
        self.pid = None;
        self.child = None;
    }
}

/// Human-readable exit description.
fn describe_exit(status: Option<ExitStatus>) -> String {
    match status {
        Some(st) => match (st.code(), st.signal()) {
            (Some(code), _) => format!("exited with status {code}"),
            (None, Some(sig)) => format!("killed by signal {sig}"),
            (None, None) => "exited".to_string(),
        },
        None => "exit status could not be read".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mux::OutputMux;

    fn harness(spec: NodeSpec) -> (NodeSupervisor, OutputMux, Bus) {
        let cfg = Config::default();
        let bus = Bus::new(64);
        let mux = OutputMux::new(64);
        let node = NodeSupervisor::new(Arc::new(spec), &cfg, bus.clone(), mux.handle());
        (node, mux, bus)
    }

    fn pid_invariant_holds(node: &NodeSupervisor) -> bool {
        node.pid().is_some() == node.state().is_running()
    }

    #[tokio::test]
    async fn spawn_failure_leaves_idle_and_publishes_exit() {
        let (mut node, _mux, bus) = harness(NodeSpec::new("ghost", "/nonexistent/binary"));
        let mut rx = bus.subscribe();

        let err = node.start().expect_err("spawn must fail");
        assert_eq!(err.as_label(), "node_spawn_failed");
        assert_eq!(node.state(), NodeState::Idle);
        assert!(pid_invariant_holds(&node));

        let ev = rx.recv().await.expect("synthetic exit event");
        assert_eq!(ev.kind, EventKind::NodeExited);
        assert_eq!(ev.severity, Severity::Error);
    }

    #[tokio::test]
    async fn start_shutdown_reap_cycle() {
        let (mut node, mut mux, _bus) =
            harness(NodeSpec::new("sleeper", "/bin/sleep").with_args(["30"]));

        node.start().expect("start");
        assert_eq!(node.state(), NodeState::Running);
        assert!(pid_invariant_holds(&node));

        node.shutdown();
        assert_eq!(node.state(), NodeState::Stopping);
        assert!(pid_invariant_holds(&node));

        // SIGINT terminates sleep; both pipes report EOF, then we reap.
        let mut exited = false;
        while !exited {
            let ev = mux.recv().await.expect("pipe event");
            match ev.payload {
                crate::core::mux::PipePayload::Data(bytes) => {
                    node.handle_output(ev.stream, &bytes)
                }
                crate::core::mux::PipePayload::Eof => {
                    exited = node.handle_eof(ev.stream).await;
                }
            }
        }
        assert_eq!(node.state(), NodeState::Stopped);
        assert!(pid_invariant_holds(&node));
    }

    #[tokio::test]
    async fn unrequested_exit_without_respawn_is_a_crash() {
        let (mut node, mut mux, _bus) =
            harness(NodeSpec::new("oneshot", "/bin/true"));

        node.start().expect("start");
        let mut exited = false;
        while !exited {
            let ev = mux.recv().await.expect("pipe event");
            if let crate::core::mux::PipePayload::Eof = ev.payload {
                exited = node.handle_eof(ev.stream).await;
            }
        }
        // Clean zero exit, but it was not requested: crashed.
        assert_eq!(node.state(), NodeState::Crashed);
        assert!(pid_invariant_holds(&node));
        assert!(!node.restart_due(Instant::now() + Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn unrequested_exit_with_respawn_waits_for_restart() {
        let mut cfg = Config::default();
        cfg.respawn_delay = Duration::from_millis(10);
        let bus = Bus::new(64);
        let mux = OutputMux::new(64);
        let spec = NodeSpec::new("flappy", "/bin/true")
            .with_respawn(crate::policies::RespawnPolicy::Always);
        let mut node = NodeSupervisor::new(Arc::new(spec), &cfg, bus.clone(), mux.handle());
        let mut mux = mux;

        node.start().expect("start");
        let mut exited = false;
        while !exited {
            let ev = mux.recv().await.expect("pipe event");
            if let crate::core::mux::PipePayload::Eof = ev.payload {
                exited = node.handle_eof(ev.stream).await;
            }
        }
        assert_eq!(node.state(), NodeState::WaitingForRestart);
        assert!(pid_invariant_holds(&node));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(node.restart_due(Instant::now()));
        node.start().expect("restart");
        assert_eq!(node.state(), NodeState::Running);
    }

    #[tokio::test]
    async fn start_twice_is_refused() {
        let (mut node, _mux, _bus) =
            harness(NodeSpec::new("sleeper", "/bin/sleep").with_args(["30"]));
        node.start().expect("start");
        let err = node.start().expect_err("second start must fail");
        assert_eq!(err.as_label(), "node_already_running");
        node.force_exit();
    }

    #[test]
    fn force_exit_on_stopped_node_is_a_noop() {
        let (mut node, _mux, _bus) = harness(NodeSpec::new("done", "/bin/true"));
        node.force_stopped_for_tests();
        node.force_exit();
        assert_eq!(node.state(), NodeState::Stopped);
        assert!(node.pid().is_none());
    }

    #[test]
    fn shutdown_is_noop_unless_running() {
        let (mut node, _mux, _bus) = harness(NodeSpec::new("idle", "/bin/true"));
        node.shutdown();
        assert_eq!(node.state(), NodeState::Idle);
    }

    #[tokio::test]
    async fn output_lines_are_published_and_styled() {
        let (mut node, _mux, bus) = harness(NodeSpec::new("talker", "/bin/true"));
        let mut rx = bus.subscribe();

        node.handle_output(StreamKind::Stdout, b"\x1b[31mred line\n\x1b[0mpartial");
        let ev = rx.recv().await.expect("line event");
        assert_eq!(ev.kind, EventKind::NodeOutput);
        assert_eq!(ev.severity, Severity::Raw);
        assert_eq!(ev.message.as_deref(), Some("\u{1b}[31mred line"));

        // The interpreter already saw the trailing reset.
        assert_eq!(node.output_style(), Style::default());

        // The partial line is flushed on EOF; the splitter keeps escape
        // bytes in the line, so the reset travels with the remainder.
        node.handle_eof(StreamKind::Stdout).await;
        let ev = rx.recv().await.expect("flushed partial");
        assert_eq!(ev.message.as_deref(), Some("\u{1b}[0mpartial"));
    }

    #[tokio::test]
    async fn interrupted_reap_is_resumed_not_stranded() {
        let mut cfg = Config::default();
        cfg.stop_timeout = Duration::from_millis(100);
        let bus = Bus::new(64);
        let mut mux = OutputMux::new(64);
        // Closes both pipes immediately but keeps running, so the reap has
        // to sit in wait() while the EOFs are already delivered.
        let spec = NodeSpec::new("pipe_dropper", "/bin/sh")
            .with_args(["-c", "exec 1>&- 2>&-; sleep 30"]);
        let mut node = NodeSupervisor::new(Arc::new(spec), &cfg, bus.clone(), mux.handle());

        node.start().expect("start");
        let mut eofs = Vec::new();
        while eofs.len() < 2 {
            let ev = mux.recv().await.expect("pipe event");
            if let crate::core::mux::PipePayload::Eof = ev.payload {
                eofs.push(ev.stream);
            }
        }
        assert!(!node.handle_eof(eofs[0]).await);

        // Poll the second EOF exactly once, then drop it, the way a losing
        // select! branch is dropped mid-wait.
        {
            let fut = node.handle_eof(eofs[1]);
            tokio::pin!(fut);
            assert!(futures::poll!(fut.as_mut()).is_pending());
        }

        // The child must still be attached so the exit can be observed.
        assert_eq!(node.state(), NodeState::Running);
        assert!(node.pid().is_some());
        assert!(node.reap_pending());

        // The retried reap runs the full escalation: graceful window,
        // SIGKILL, unrequested exit.
        node.reap().await;
        assert_eq!(node.state(), NodeState::Crashed);
        assert!(pid_invariant_holds(&node));
        assert!(!node.reap_pending());
    }

    #[test]
    fn accounting_interval_math() {
        let (mut node, _mux, _bus) = harness(NodeSpec::new("worker", "/bin/true"));
        node.begin_stat_update();
        node.add_cpu_time(30, 10);
        node.add_memory(64 << 20);
        node.end_stat_update(100.0);
        assert!((node.cpu_load() - 0.40).abs() < f64::EPSILON);
        assert_eq!(node.memory(), 64 << 20);
        assert_eq!(node.peak_memory(), 64 << 20);

        node.begin_stat_update();
        node.end_stat_update(100.0);
        assert_eq!(node.cpu_load(), 0.0);
        assert_eq!(node.memory(), 0);
        assert_eq!(node.peak_memory(), 64 << 20);
    }

    #[tokio::test]
    async fn limit_breach_publishes_warning() {
        let mut cfg = Config::default();
        cfg.cpu_limit = Some(0.5);
        let bus = Bus::new(64);
        let mux = OutputMux::new(4);
        let mut node = NodeSupervisor::new(
            Arc::new(NodeSpec::new("hog", "/bin/true")),
            &cfg,
            bus.clone(),
            mux.handle(),
        );
        let mut rx = bus.subscribe();

        node.begin_stat_update();
        node.add_cpu_time(80, 0);
        node.end_stat_update(100.0);

        let ev = rx.recv().await.expect("limit event");
        assert_eq!(ev.kind, EventKind::LimitExceeded);
        assert_eq!(ev.severity, Severity::Warning);
    }
}
