//! # Supervisor: fleet orchestration over many node supervisors.
//!
//! One `Supervisor` owns the whole session: the node supervisors, the
//! output multiplexer they register their pipes with, the event bus, and
//! the single driving task that serializes every state change.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!                 │                 Supervisor                   │
//!  OS signal ────►│  run():                                      │
//!                 │    loop {                                    │
//!   OutputMux ───►│      poll(): drain pipe events ─► dispatch   │
//!                 │              tick():  stop deadlines         │
//!                 │                       respawn timers         │
//!                 │                       resource accounting    │
//!                 │    }                                         │
//!                 └───────┬──────────────────────────┬───────────┘
//!                         │ NodeSupervisor[..]       │ Bus.publish
//!                         ▼                          ▼
//!                    child processes           subscribers/UIs
//! ```
//!
//! ## Rules
//! - All node-map and sample-table mutation happens on the caller of
//!   [`Supervisor::poll`]; there is exactly one such caller, so no locks.
//! - Resource usage is attributed by **process group**: each node's child
//!   leads its own group, so every descendant carries the child's pid as
//!   its pgrp. Processes whose pgrp matches no node are ignored.
//! - CPU accounting is delta-based over a pid-keyed sample table; pids that
//!   vanish from a scan are pruned, pids that reappear start a fresh
//!   baseline.
//! - A required node's exit makes [`Supervisor::ok`] false and starts a
//!   fleet-wide shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::core::mux::{OutputMux, PipeEvent, PipePayload};
use crate::core::node::NodeSupervisor;
use crate::core::shutdown::wait_for_shutdown_signal;
use crate::core::stats::{scan_process_table, ticks_per_second, ProcessSample, ProcessStat};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::nodes::NodeSpec;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Upper bound on how long one `poll` iteration may sleep; keeps stop
/// deadlines and respawn timers responsive even with a long stat interval.
const POLL_GRANULARITY: Duration = Duration::from_millis(100);

/// Pipe events drained per iteration after the first, without waiting.
const DRAIN_BURST: usize = 64;

/// Extra time granted after the graceful window before SIGKILL, and again
/// after SIGKILL before giving up entirely.
const KILL_SLACK: Duration = Duration::from_secs(1);

/// Fleet orchestrator: owns the node supervisors and drives their shared
/// event loop.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    mux: OutputMux,
    nodes: Vec<NodeSupervisor>,
    index: HashMap<Arc<str>, usize>,
    /// Pid-keyed sample table for delta-based CPU accounting.
    samples: HashMap<i32, ProcessSample>,
    last_stat_at: Instant,
    ok: bool,
    shutdown_requested: bool,
}

impl Supervisor {
    /// Creates an empty fleet with the given session configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            bus: Bus::new(cfg.bus_capacity),
            mux: OutputMux::new(cfg.mux_capacity),
            nodes: Vec::new(),
            index: HashMap::new(),
            samples: HashMap::new(),
            last_stat_at: Instant::now(),
            ok: true,
            shutdown_requested: false,
            cfg,
        }
    }

    /// Adds one node to the fleet, resolving its unset per-node values
    /// against the session defaults.
    ///
    /// Node names are expected to be unique; the launch-description loader
    /// enforces this. A duplicate shadows the earlier entry for output
    /// attribution.
    pub fn add_node(&mut self, spec: NodeSpec) {
        let spec = Arc::new(spec);
        let node =
            NodeSupervisor::new(Arc::clone(&spec), &self.cfg, self.bus.clone(), self.mux.handle());
        self.index.insert(spec.name_arc(), self.nodes.len());
        self.nodes.push(node);
    }

    /// Attaches a set of event subscribers: spawns a listener that fans
    /// every bus event out to them (see [`SubscriberSet`]).
    pub fn attach_subscribers(&self, subs: Vec<Arc<dyn Subscribe>>) {
        let set = SubscriberSet::new(subs);
        let mut rx = self.bus.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            set.shutdown().await;
        });
    }

    /// Starts every node. Spawn failures are published as synthetic exits;
    /// a required node failing to spawn immediately makes the session
    /// unhealthy.
    pub fn start_all(&mut self) {
        for slot in 0..self.nodes.len() {
            self.start_slot(slot);
        }
    }

    /// Requests a fleet-wide graceful stop: SIGINT to every running node's
    /// process group. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shutdown_requested {
            return;
        }
        self.shutdown_requested = true;
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        for node in &mut self.nodes {
            node.shutdown();
        }
    }

    /// SIGKILL to every node that still has a process group.
    pub fn force_exit_all(&mut self) {
        for node in &mut self.nodes {
            node.force_exit();
        }
    }

    /// True while the session is healthy: no required node has exited and
    /// no shutdown has been requested.
    pub fn ok(&self) -> bool {
        self.ok && !self.shutdown_requested
    }

    /// True while at least one node still has a child process.
    pub fn any_running(&self) -> bool {
        self.nodes.iter().any(|n| n.running())
    }

    /// The fleet's event bus; subscribe for lifecycle/output/health events.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The session configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// All node supervisors, in registration order.
    pub fn nodes(&self) -> &[NodeSupervisor] {
        &self.nodes
    }

    /// Looks up one node supervisor by name.
    pub fn node(&self, name: &str) -> Option<&NodeSupervisor> {
        self.index.get(name).map(|&slot| &self.nodes[slot])
    }

    /// Runs one iteration of the event loop: waits (bounded) for a pipe
    /// event, drains a burst of whatever else is ready, then fires timers
    /// and the accounting cycle.
    pub async fn poll(&mut self) {
        let now = Instant::now();
        let next_stat = self.last_stat_at + self.cfg.stat_interval;
        let wait = next_stat.saturating_duration_since(now).min(POLL_GRANULARITY);

        // A previous iteration may have been cancelled mid-reap (this
        // future is a select! branch in run()); the EOFs are consumed by
        // then, so the exit has to be picked up here.
        for slot in 0..self.nodes.len() {
            if self.nodes[slot].reap_pending() {
                self.nodes[slot].reap().await;
                self.on_node_exited(slot);
            }
        }

        if let Some(ev) = self.mux.recv_timeout(wait).await {
            self.dispatch(ev).await;
            for _ in 0..DRAIN_BURST {
                match self.mux.recv_timeout(Duration::ZERO).await {
                    Some(ev) => self.dispatch(ev).await,
                    None => break,
                }
            }
        }

        self.tick(Instant::now());
    }

    /// Drives the whole session: starts every node, then loops on
    /// [`Supervisor::poll`] until the fleet winds down.
    ///
    /// Shutdown is entered on an OS termination signal or on a required
    /// node's exit. Nodes get their graceful window, then the fleet-wide
    /// grace elapses, the stragglers are SIGKILLed and reported via
    /// [`EventKind::GraceExceeded`]. A process that survives even SIGKILL
    /// ends the loop with [`RuntimeError::GraceExceeded`].
    pub async fn run(&mut self) -> Result<(), RuntimeError> {
        self.start_all();

        let shutdown_signal = wait_for_shutdown_signal();
        tokio::pin!(shutdown_signal);
        let mut grace_deadline: Option<Instant> = None;
        let mut kill_deadline: Option<Instant> = None;

        loop {
            let armed = !self.shutdown_requested;
            tokio::select! {
                res = &mut shutdown_signal, if armed => {
                    res?;
                    self.shutdown();
                }
                _ = self.poll() => {}
            }

            if !self.shutdown_requested {
                continue;
            }
            if !self.any_running() {
                if kill_deadline.is_none() {
                    self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                }
                return Ok(());
            }

            let deadline = *grace_deadline.get_or_insert_with(|| Instant::now() + self.grace());
            if Instant::now() < deadline {
                continue;
            }
            match kill_deadline {
                None => {
                    let stuck = self.running_names();
                    self.bus.publish(
                        Event::new(EventKind::GraceExceeded).with_message(stuck.join(", ")),
                    );
                    self.force_exit_all();
                    kill_deadline = Some(Instant::now() + KILL_SLACK);
                }
                Some(kd) if Instant::now() >= kd => {
                    return Err(RuntimeError::GraceExceeded {
                        grace: self.grace(),
                        stuck: self.running_names(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    /// Longest graceful-stop window across the fleet: a full shutdown waits
    /// at most this long (plus kill slack) before giving up on a node.
    pub fn shutdown_timeout(&self) -> Duration {
        self.nodes
            .iter()
            .map(|n| n.stop_timeout())
            .max()
            .unwrap_or(self.cfg.stop_timeout)
    }

    /// Fleet-wide graceful window plus slack for the node supervisors' own
    /// SIGKILL escalation to land.
    fn grace(&self) -> Duration {
        self.shutdown_timeout() + KILL_SLACK
    }

    fn running_names(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.running())
            .map(|n| n.full_name())
            .collect()
    }

    fn start_slot(&mut self, slot: usize) {
        if self.nodes[slot].start().is_err() {
            let node = &self.nodes[slot];
            if node.spec().required() {
                self.bus.publish(
                    Event::new(EventKind::RequiredNodeExited).with_node(node.name().to_string()),
                );
                self.ok = false;
            }
        }
    }

    /// Routes one pipe event to its node; a completed exit feeds the
    /// required-node policy.
    async fn dispatch(&mut self, ev: PipeEvent) {
        let Some(&slot) = self.index.get(ev.node.as_ref()) else {
            return;
        };
        match ev.payload {
            PipePayload::Data(bytes) => self.nodes[slot].handle_output(ev.stream, &bytes),
            PipePayload::Eof => {
                if self.nodes[slot].handle_eof(ev.stream).await {
                    self.on_node_exited(slot);
                }
            }
        }
    }

    fn on_node_exited(&mut self, slot: usize) {
        let node = &self.nodes[slot];
        if node.spec().required() && !self.shutdown_requested {
            self.bus.publish(
                Event::new(EventKind::RequiredNodeExited).with_node(node.name().to_string()),
            );
            self.ok = false;
        }
    }

    /// Fires due timers and, when the interval has elapsed, the resource
    /// accounting cycle.
    fn tick(&mut self, now: Instant) {
        if !self.ok && !self.shutdown_requested {
            self.shutdown();
        }

        for node in &mut self.nodes {
            if node.stop_deadline_passed(now) {
                node.force_exit();
            }
        }

        if !self.shutdown_requested {
            for slot in 0..self.nodes.len() {
                if self.nodes[slot].restart_due(now) {
                    self.start_slot(slot);
                }
            }
        }

        if now >= self.last_stat_at + self.cfg.stat_interval {
            let elapsed_ticks =
                (now - self.last_stat_at).as_secs_f64() * ticks_per_second();
            self.last_stat_at = now;
            let scan = scan_process_table();
            self.apply_samples(&scan, elapsed_ticks);
        }
    }

    /// Applies one process-table scan to the fleet's accounting state.
    ///
    /// Attribution: each record whose pgrp matches a node's child pid is
    /// credited to that node — CPU as the tick delta against the pid's
    /// previous sample, memory as-is. A pid seen for the first time only
    /// establishes its baseline; two samples are needed to form a delta.
    /// Stale samples (pid absent from the scan) are pruned afterwards.
    fn apply_samples(&mut self, scan: &[ProcessStat], elapsed_ticks: f64) {
        let mut leaders: HashMap<i32, usize> = HashMap::new();
        for (slot, node) in self.nodes.iter().enumerate() {
            if let Some(pid) = node.pid() {
                leaders.insert(pid, slot);
            }
        }

        for node in &mut self.nodes {
            node.begin_stat_update();
        }
        for sample in self.samples.values_mut() {
            sample.active = false;
        }

        for stat in scan {
            let Some(&slot) = leaders.get(&stat.pgrp) else {
                continue;
            };
            match self.samples.get_mut(&stat.pid) {
                Some(prev) => {
                    let du = stat.utime.saturating_sub(prev.stat.utime);
                    let ds = stat.stime.saturating_sub(prev.stat.stime);
                    prev.stat = *stat;
                    prev.active = true;
                    self.nodes[slot].add_cpu_time(du, ds);
                    self.nodes[slot].add_memory(stat.rss_bytes);
                }
                None => {
                    self.samples.insert(
                        stat.pid,
                        ProcessSample {
                            stat: *stat,
                            active: true,
                        },
                    );
                }
            }
        }

        self.samples.retain(|_, sample| sample.active);

        for node in &mut self.nodes {
            node.end_stat_update(elapsed_ticks);
        }
    }

    #[cfg(test)]
    fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeState;
    use crate::policies::RespawnPolicy;

    fn st(pid: i32, pgrp: i32, utime: u64, stime: u64, rss_bytes: u64) -> ProcessStat {
        ProcessStat {
            pid,
            pgrp,
            utime,
            stime,
            rss_bytes,
        }
    }

    #[test]
    fn attribution_by_process_group() {
        let mut sup = Supervisor::new(Config::default());
        sup.add_node(NodeSpec::new("a", "/bin/true"));
        sup.add_node(NodeSpec::new("b", "/bin/true"));
        sup.nodes[0].force_running_for_tests(100);
        sup.nodes[1].force_running_for_tests(200);

        // First scan only establishes baselines: two samples are needed to
        // form a delta. Pid 999 belongs to nobody and is never tracked.
        let scan1 = [
            st(100, 100, 100, 0, 10_000),
            st(101, 100, 20, 0, 5_000),
            st(200, 200, 50, 10, 1_000),
            st(999, 999, 7, 7, 777),
        ];
        sup.apply_samples(&scan1, 100.0);
        assert_eq!(sup.nodes[0].cpu_load(), 0.0);
        assert_eq!(sup.nodes[0].memory(), 0);
        assert_eq!(sup.sample_count(), 3);

        // Second scan: node a's leader went 100 → 140 and its child
        // 20 → 30 over 100 elapsed ticks; node b was idle.
        let scan2 = [
            st(100, 100, 140, 0, 10_000),
            st(101, 100, 30, 0, 5_000),
            st(200, 200, 50, 10, 1_000),
        ];
        sup.apply_samples(&scan2, 100.0);
        assert!((sup.nodes[0].cpu_load() - 0.50).abs() < 1e-9);
        assert_eq!(sup.nodes[0].memory(), 15_000);
        assert!(sup.nodes[1].cpu_load().abs() < 1e-9);
        assert_eq!(sup.nodes[1].memory(), 1_000);
    }

    #[test]
    fn single_process_delta_matches_interval() {
        let mut sup = Supervisor::new(Config::default());
        sup.add_node(NodeSpec::new("a", "/bin/true"));
        sup.nodes[0].force_running_for_tests(100);

        sup.apply_samples(&[st(100, 100, 100, 0, 0)], 100.0);
        sup.apply_samples(&[st(100, 100, 140, 0, 0)], 100.0);
        assert!((sup.nodes[0].cpu_load() - 0.40).abs() < 1e-9);
    }

    #[test]
    fn vanished_pids_are_pruned_and_restart_fresh() {
        let mut sup = Supervisor::new(Config::default());
        sup.add_node(NodeSpec::new("a", "/bin/true"));
        sup.nodes[0].force_running_for_tests(100);

        sup.apply_samples(&[st(100, 100, 10, 0, 0), st(101, 100, 500, 0, 0)], 100.0);
        assert_eq!(sup.sample_count(), 2);

        // The child vanished; its entry must not linger.
        sup.apply_samples(&[st(100, 100, 10, 0, 0)], 100.0);
        assert_eq!(sup.sample_count(), 1);

        // A recycled pid is a fresh first observation, not a delta against
        // the dead process's counters.
        sup.apply_samples(&[st(100, 100, 10, 0, 0), st(101, 100, 3, 0, 0)], 100.0);
        assert_eq!(sup.nodes[0].cpu_load(), 0.0);
    }

    #[test]
    fn stopped_nodes_report_zero_usage() {
        let mut sup = Supervisor::new(Config::default());
        sup.add_node(NodeSpec::new("a", "/bin/true"));
        sup.nodes[0].force_running_for_tests(100);
        sup.apply_samples(&[st(100, 100, 40, 0, 2_048)], 100.0);
        sup.apply_samples(&[st(100, 100, 80, 0, 2_048)], 100.0);
        assert!(sup.nodes[0].cpu_load() > 0.0);
        assert_eq!(sup.nodes[0].memory(), 2_048);

        sup.nodes[0].force_stopped_for_tests();
        sup.apply_samples(&[st(100, 100, 120, 0, 2_048)], 100.0);
        assert_eq!(sup.nodes[0].cpu_load(), 0.0);
        assert_eq!(sup.nodes[0].memory(), 0);
    }

    #[test]
    fn fleet_shutdown_timeout_is_the_per_node_maximum() {
        let mut sup = Supervisor::new(Config::default());
        sup.add_node(NodeSpec::new("a", "/bin/true").with_stop_timeout(Duration::from_secs(5)));
        sup.add_node(NodeSpec::new("b", "/bin/true").with_stop_timeout(Duration::from_secs(10)));
        sup.add_node(NodeSpec::new("c", "/bin/true").with_stop_timeout(Duration::from_secs(3)));
        assert_eq!(sup.shutdown_timeout(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn required_node_exit_makes_session_unhealthy() {
        let mut sup = Supervisor::new(Config::default());
        sup.add_node(NodeSpec::new("critical", "/bin/true").with_required(true));
        sup.start_all();

        tokio::time::timeout(Duration::from_secs(10), async {
            while sup.ok() {
                sup.poll().await;
            }
        })
        .await
        .expect("required exit must be noticed");

        assert!(!sup.ok());
        // The exit also kicked off a fleet shutdown.
        tokio::time::timeout(Duration::from_secs(10), async {
            while sup.any_running() {
                sup.poll().await;
            }
        })
        .await
        .expect("fleet must wind down");
    }

    #[tokio::test]
    async fn graceful_shutdown_stops_all_nodes() {
        let mut sup = Supervisor::new(Config::default());
        sup.add_node(NodeSpec::new("s1", "/bin/sleep").with_args(["30"]));
        sup.add_node(NodeSpec::new("s2", "/bin/sleep").with_args(["30"]));
        sup.start_all();
        assert!(sup.any_running());

        sup.shutdown();
        tokio::time::timeout(Duration::from_secs(10), async {
            while sup.any_running() {
                sup.poll().await;
            }
        })
        .await
        .expect("nodes must stop within the window");

        assert!(sup
            .nodes()
            .iter()
            .all(|n| n.state() == NodeState::Stopped));
    }

    #[tokio::test]
    async fn crashed_node_respawns_with_new_pid() {
        let mut cfg = Config::default();
        cfg.respawn_delay = Duration::from_millis(50);
        let mut sup = Supervisor::new(cfg);
        sup.add_node(
            NodeSpec::new("flappy", "/bin/sleep")
                .with_args(["30"])
                .with_respawn(RespawnPolicy::Always),
        );
        sup.start_all();
        let first_pid = sup.node("flappy").and_then(|n| n.pid()).expect("pid");

        // Simulate a crash: unrequested kill from outside.
        sup.nodes[0].force_exit();

        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                sup.poll().await;
                let node = sup.node("flappy").expect("node");
                if node.state() == NodeState::Running && node.pid() != Some(first_pid) {
                    break;
                }
            }
        })
        .await
        .expect("respawn must happen");

        sup.shutdown();
        tokio::time::timeout(Duration::from_secs(10), async {
            while sup.any_running() {
                sup.poll().await;
            }
        })
        .await
        .expect("cleanup");
    }

    #[tokio::test]
    async fn interrupted_poll_does_not_strand_an_exiting_node() {
        let mut cfg = Config::default();
        cfg.stop_timeout = Duration::from_secs(1);
        let mut sup = Supervisor::new(cfg);
        // Closes both pipes but keeps running, so the reap parks in wait().
        sup.add_node(
            NodeSpec::new("pipe_dropper", "/bin/sh")
                .with_args(["-c", "exec 1>&- 2>&-; sleep 30"]),
        );
        sup.start_all();

        // Cut poll() short the way run()'s signal arm winning the select!
        // does, until an iteration is dropped mid-reap.
        tokio::time::timeout(Duration::from_secs(10), async {
            while !sup.nodes[0].reap_pending() {
                let fut = sup.poll();
                tokio::pin!(fut);
                let _ = tokio::time::timeout(Duration::from_millis(300), fut.as_mut()).await;
            }
        })
        .await
        .expect("an iteration must be cut mid-reap");
        assert_eq!(sup.nodes[0].state(), NodeState::Running);
        assert!(sup.nodes[0].pid().is_some());

        // Subsequent iterations must still observe the exit.
        tokio::time::timeout(Duration::from_secs(10), async {
            while sup.any_running() {
                sup.poll().await;
            }
        })
        .await
        .expect("the exit must still be observed");
        assert_eq!(sup.nodes[0].state(), NodeState::Crashed);
        assert!(sup.nodes[0].pid().is_none());
        assert!(!sup.nodes[0].reap_pending());
    }

    #[tokio::test]
    async fn stop_deadline_escalates_to_sigkill() {
        let mut cfg = Config::default();
        cfg.stop_timeout = Duration::from_millis(200);
        let mut sup = Supervisor::new(cfg);
        sup.add_node(
            NodeSpec::new("stubborn", "/bin/sh")
                .with_args(["-c", "trap '' INT TERM; while true; do sleep 1; done"]),
        );
        sup.start_all();
        // Let the shell install its trap before we signal it.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let before = Instant::now();
        sup.shutdown();
        tokio::time::timeout(Duration::from_secs(10), async {
            while sup.any_running() {
                sup.poll().await;
            }
        })
        .await
        .expect("SIGKILL must end it");

        assert!(before.elapsed() >= Duration::from_millis(200));
        assert_eq!(
            sup.node("stubborn").map(|n| n.state()),
            Some(NodeState::Stopped)
        );
    }
}
