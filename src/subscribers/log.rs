//! # File-backed log sink.
//!
//! [`LogWriter`] appends every runtime event to a plain-text log file, one
//! line per event, flushed immediately so the tail survives a crash of the
//! supervising process itself.
//!
//! ## Output format
//! ```text
//! 1724407200.103 [ INFO]        camera_driver: started (pid 4711)
//! 1724407201.245 [  RAW]        camera_driver: frame 1 captured
//! 1724407202.001 [ERROR]        camera_driver: killed by signal 11
//! 1724407202.002 [ INFO]        camera_driver: gdb /opt/bin/camera core
//! 1724407202.500 [ INFO]            procvisor: shutdown requested
//! ```
//!
//! Enabled via the `logging` feature.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Appends runtime events to a log file.
pub struct LogWriter {
    out: Mutex<BufWriter<File>>,
}

impl LogWriter {
    /// Opens (or creates) `path` for appending.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
        })
    }

    fn render_line(event: &Event) -> String {
        let (secs, millis) = match event.at.duration_since(UNIX_EPOCH) {
            Ok(d) => (d.as_secs(), d.subsec_millis()),
            Err(_) => (0, 0),
        };
        let source = event.node.as_deref().unwrap_or("procvisor");
        format!(
            "{secs}.{millis:03} [{}] {source:>20}: {}",
            event.severity.as_label(),
            describe(event),
        )
    }
}

/// Message text for the log line; kinds without an explicit message get a
/// fixed description.
fn describe(event: &Event) -> String {
    if let Some(message) = event.message.as_deref() {
        return message.to_string();
    }
    match event.kind {
        EventKind::NodeStarted => match event.pid {
            Some(pid) => format!("started (pid {pid})"),
            None => "started".to_string(),
        },
        EventKind::RequiredNodeExited => "required node exited".to_string(),
        EventKind::ShutdownRequested => "shutdown requested".to_string(),
        EventKind::AllStoppedWithin => "all nodes stopped".to_string(),
        _ => String::new(),
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, event: &Event) {
        // A failing log sink must never take the session down with it.
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{}", LogWriter::render_line(event));
            let _ = out.flush();
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Severity;

    fn temp_log_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("procvisor-log-{tag}-{}", std::process::id()))
    }

    #[tokio::test]
    async fn writes_one_line_per_event() {
        let path = temp_log_path("basic");
        let writer = LogWriter::create(&path).expect("open log");

        writer
            .on_event(&Event::new(EventKind::NodeStarted).with_node("lidar").with_pid(42))
            .await;
        writer
            .on_event(
                &Event::new(EventKind::NodeExited)
                    .with_node("lidar")
                    .with_message("exited with status 1")
                    .with_severity(Severity::Error),
            )
            .await;

        let contents = std::fs::read_to_string(&path).expect("read log");
        let _ = std::fs::remove_file(&path);

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("lidar: started (pid 42)"));
        assert!(lines[0].contains("[ INFO]"));
        assert!(lines[1].contains("lidar: exited with status 1"));
        assert!(lines[1].contains("[ERROR]"));
    }

    #[test]
    fn fleet_events_are_attributed_to_the_supervisor() {
        let line = LogWriter::render_line(&Event::new(EventKind::ShutdownRequested));
        assert!(line.contains("procvisor: shutdown requested"));
    }
}
