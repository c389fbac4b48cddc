//! # Process-table sampling.
//!
//! Reads the per-process `stat` pseudo-file for every live pid and extracts
//! the handful of fields the accounting cycle needs: pid, process-group id,
//! cumulative user/system CPU ticks, and resident memory.
//!
//! The process-group id is what links an observed process back to a node:
//! every node's child is spawned as its own group leader, so any descendant
//! it forks (shells, loaders, the real workload) carries the node's pid as
//! its `pgrp`.
//!
//! Reading `/proc` races with process exit by design; any entry that
//! disappears or fails to parse mid-scan is silently skipped.

use std::fs;

/// One process's stat record, in OS-native units (ticks, bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessStat {
    /// Process id.
    pub pid: i32,
    /// Process-group id (pid of the group leader).
    pub pgrp: i32,
    /// Cumulative user-mode CPU ticks.
    pub utime: u64,
    /// Cumulative kernel-mode CPU ticks.
    pub stime: u64,
    /// Resident set size in bytes.
    pub rss_bytes: u64,
}

/// Stored sample plus the liveness flag reset on every scan.
#[derive(Clone, Copy, Debug)]
pub struct ProcessSample {
    /// The most recent stat record for this pid.
    pub stat: ProcessStat,
    /// Re-confirmed by the current scan; stale entries are pruned.
    pub active: bool,
}

/// CPU ticks per second, as reported by the OS.
pub fn ticks_per_second() -> f64 {
    // SAFETY: sysconf is async-signal-safe and has no preconditions.
    let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if hz > 0 {
        hz as f64
    } else {
        100.0
    }
}

/// Page size in bytes, for converting the rss field.
fn page_size() -> u64 {
    // SAFETY: see ticks_per_second.
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz > 0 {
        sz as u64
    } else {
        4096
    }
}

/// Parses the body of a `stat` pseudo-file.
///
/// The second field (`comm`) may contain spaces and parentheses, so the
/// record is split at the *last* closing parenthesis before tokenizing.
/// Field numbers after `comm`: state(0) ppid(1) pgrp(2) ... utime(11)
/// stime(12) ... rss(21, in pages).
pub(crate) fn parse_stat_line(contents: &str) -> Option<ProcessStat> {
    let (pid_part, rest) = contents.split_once('(')?;
    let pid: i32 = pid_part.trim().parse().ok()?;
    let after_comm = rest.rsplit_once(')')?.1;

    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    let pgrp: i32 = fields.get(2)?.parse().ok()?;
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    let rss_pages: u64 = fields.get(21)?.parse().ok()?;

    Some(ProcessStat {
        pid,
        pgrp,
        utime,
        stime,
        rss_bytes: rss_pages.saturating_mul(page_size()),
    })
}

/// Reads one process's stat record; `None` if it vanished or is unreadable.
pub fn read_process_stat(pid: i32) -> Option<ProcessStat> {
    let contents = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    parse_stat_line(&contents)
}

/// Enumerates the live process table.
///
/// Entries that disappear between the directory listing and the stat read
/// are an expected race and skipped without logging.
pub fn scan_process_table() -> Vec<ProcessStat> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir("/proc") else {
        return out;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(|s| s.parse::<i32>().ok()) else {
            continue;
        };
        if let Some(stat) = read_process_stat(pid) {
            out.push(stat);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_stat_line() {
        let line = "1234 (mynode) S 1 1234 1000 0 -1 4194304 100 0 0 0 \
                    500 250 0 0 20 0 1 0 12345 1000000 256 18446744073709551615";
        let stat = parse_stat_line(line).expect("parse");
        assert_eq!(stat.pid, 1234);
        assert_eq!(stat.pgrp, 1234);
        assert_eq!(stat.utime, 500);
        assert_eq!(stat.stime, 250);
        assert_eq!(stat.rss_bytes, 256 * page_size());
    }

    #[test]
    fn comm_with_spaces_and_parens() {
        let line = "42 (tmux: server (1)) R 1 40 40 0 -1 0 0 0 0 0 \
                    7 3 0 0 20 0 1 0 99 1000 64 0";
        let stat = parse_stat_line(line).expect("parse");
        assert_eq!(stat.pid, 42);
        assert_eq!(stat.pgrp, 40);
        assert_eq!(stat.utime, 7);
        assert_eq!(stat.stime, 3);
    }

    #[test]
    fn truncated_line_is_rejected() {
        assert!(parse_stat_line("99 (short) S 1 99").is_none());
        assert!(parse_stat_line("garbage").is_none());
    }

    #[test]
    fn reads_own_stat_record() {
        let pid = std::process::id() as i32;
        let stat = read_process_stat(pid).expect("own stat");
        assert_eq!(stat.pid, pid);
        assert!(stat.pgrp > 0);
    }

    #[test]
    fn scan_includes_self() {
        let pid = std::process::id() as i32;
        let table = scan_process_table();
        assert!(table.iter().any(|s| s.pid == pid));
    }

    #[test]
    fn tick_rate_is_sane() {
        let hz = ticks_per_second();
        assert!(hz >= 1.0);
    }
}
