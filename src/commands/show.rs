//! Show command implementation.
//!
//! Prints everything the handle knows about one process.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use herakles_procstat::{
    CpuTimes, CtxSwitches, Host, IoCounters, MemoryInfo, Process, ProcessError, ProcessState,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::debug;

use crate::cli::OutputFormat;
use crate::commands::{host_for, render};
use crate::config::Config;

#[derive(Debug, Serialize)]
pub struct ShowReport {
    pub pid: u32,
    pub name: String,
    /// None when the link is unreadable or the process is a kernel thread.
    pub exe: Option<String>,
    pub state: ProcessState,
    pub ppid: u32,
    pub nice: i64,
    pub num_threads: i64,
    pub terminal: Option<String>,
    pub create_time: DateTime<Utc>,
    pub uptime_secs: u64,
    pub cpu_percent: f64,
    pub times: CpuTimes,
    pub memory: MemoryInfo,
    /// None when the io record is hidden (another user's process) or absent.
    pub io: Option<IoCounters>,
    pub ctx_switches: Option<CtxSwitches>,
}

/// Degrades an unreadable optional record to `None`; a vanished process still fails.
fn optional<T>(pid: u32, what: &str, result: herakles_procstat::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e @ ProcessError::PermissionDenied { .. }) | Err(e @ ProcessError::Io { .. }) => {
            debug!("{} of {} unavailable: {}", what, pid, e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Reads one process through a fresh handle. `interval` of zero skips CPU sampling.
pub fn collect_show(host: &Host, pid: u32, interval: Duration) -> Result<ShowReport> {
    let mut p = Process::new(pid, host.clone()).with_context(|| format!("process {pid}"))?;

    let exe = optional(pid, "exe", p.exe())?.map(|path| path.display().to_string());
    let io = optional(pid, "io", p.io_counters())?;
    let ctx_switches = optional(pid, "status", p.num_ctx_switches())?;

    let cpu_percent = p.cpu_percent(interval)?;
    let snapshot = p.snapshot()?.clone();

    Ok(ShowReport {
        pid,
        name: snapshot.name.clone(),
        exe,
        state: snapshot.state,
        ppid: snapshot.ppid,
        nice: snapshot.nice,
        num_threads: snapshot.num_threads,
        terminal: snapshot.terminal().and_then(|t| t.name()),
        create_time: p.create_time()?,
        uptime_secs: p.uptime()?.as_secs(),
        cpu_percent,
        times: p.times()?,
        memory: p.memory_info()?,
        io,
        ctx_switches,
    })
}

fn render_text(r: &ShowReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "pid:          {}", r.pid);
    let _ = writeln!(out, "name:         {}", r.name);
    let _ = writeln!(out, "exe:          {}", r.exe.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "state:        {} ({})", r.state.label(), r.state);
    let _ = writeln!(out, "ppid:         {}", r.ppid);
    let _ = writeln!(out, "nice:         {}", r.nice);
    let _ = writeln!(out, "threads:      {}", r.num_threads);
    let _ = writeln!(out, "terminal:     {}", r.terminal.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "started:      {}", r.create_time.to_rfc3339());
    let _ = writeln!(out, "uptime:       {}s", r.uptime_secs);
    let _ = writeln!(out, "cpu:          {:.1}%", r.cpu_percent);
    let _ = writeln!(
        out,
        "cpu times:    user {:.2}s, system {:.2}s, children {:.2}s/{:.2}s, iowait {:.2}s",
        r.times.user,
        r.times.system,
        r.times.children_user,
        r.times.children_system,
        r.times.iowait
    );
    let _ = writeln!(
        out,
        "memory:       rss {} KB, vms {} KB",
        r.memory.rss / 1024,
        r.memory.vms / 1024
    );
    match &r.io {
        Some(io) => {
            let _ = writeln!(
                out,
                "io:           read {} B in {} calls, write {} B in {} calls",
                io.read_bytes, io.read_count, io.write_bytes, io.write_count
            );
        }
        None => {
            let _ = writeln!(out, "io:           -");
        }
    }
    if let Some(ctx) = &r.ctx_switches {
        let _ = writeln!(
            out,
            "ctx switches: {} voluntary, {} involuntary",
            ctx.voluntary, ctx.involuntary
        );
    }
    out
}

/// Prints one process.
pub fn command_show(pid: u32, interval_ms: Option<u64>, config: &Config) -> Result<()> {
    let host = host_for(config)?;
    let interval =
        Duration::from_millis(interval_ms.unwrap_or_else(|| config.sample_interval_ms()));
    let report = collect_show(&host, pid, interval)?;
    print!("{}", render(&report, config.output_format(), render_text)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const STAT: &str = "300 (worker one) S 1 300 300 34817 300 4194304 0 0 0 0 250 50 0 0 20 5 3 0 1000 20480000 512 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0\n";

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().expect("Failed to create temp dir");
        fs::write(dir.path().join("stat"), "btime 1700000000\n").unwrap();
        fs::create_dir(dir.path().join("300")).unwrap();
        fs::write(dir.path().join("300/stat"), STAT).unwrap();
        dir
    }

    // -------------------------------------------------------------------------
    // Tests for collect_show
    // -------------------------------------------------------------------------

    #[test]
    fn test_collect_show_fixture() {
        let dir = fixture();
        let host = Host::with_proc_root(dir.path());
        let report = collect_show(&host, 300, Duration::ZERO).unwrap();

        assert_eq!(report.name, "worker one");
        assert_eq!(report.exe, None);
        assert_eq!(report.state, ProcessState::Sleeping);
        assert_eq!(report.nice, 5);
        assert_eq!(report.num_threads, 3);
        assert_eq!(report.terminal.as_deref(), Some("pts/1"));
        assert_eq!(report.cpu_percent, 0.0);
        assert_eq!(report.memory.vms, 20480000);
        assert!(report.times.total() > 0.0);
        assert_eq!(report.io, None);
        assert_eq!(report.ctx_switches, None);
    }

    #[test]
    fn test_collect_show_counters() {
        let dir = fixture();
        fs::write(
            dir.path().join("300/io"),
            "rchar: 1\nwchar: 2\nsyscr: 3\nsyscw: 4\nread_bytes: 512\nwrite_bytes: 1024\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("300/status"),
            "Name:\tworker one\nvoluntary_ctxt_switches:\t9\nnonvoluntary_ctxt_switches:\t1\n",
        )
        .unwrap();
        let host = Host::with_proc_root(dir.path());
        let report = collect_show(&host, 300, Duration::ZERO).unwrap();

        assert_eq!(report.io.map(|io| io.write_bytes), Some(1024));
        assert_eq!(report.ctx_switches.map(|c| c.voluntary), Some(9));

        let text = render_text(&report);
        assert!(text.contains("read 512 B in 3 calls"), "{text}");
        assert!(text.contains("ctx switches: 9 voluntary, 1 involuntary"), "{text}");
        let toml = render(&report, OutputFormat::Toml, render_text).unwrap();
        assert!(toml.contains("[io]"), "{toml}");
    }

    #[test]
    fn test_collect_show_missing_pid() {
        let dir = fixture();
        let host = Host::with_proc_root(dir.path());
        let err = collect_show(&host, 301, Duration::ZERO).unwrap_err();
        let inner = err.downcast_ref::<ProcessError>().unwrap();
        assert!(inner.is_process_gone());
    }

    #[test]
    fn test_render_show_formats() {
        let dir = fixture();
        let host = Host::with_proc_root(dir.path());
        let report = collect_show(&host, 300, Duration::ZERO).unwrap();

        let text = render(&report, OutputFormat::Text, render_text).unwrap();
        assert!(text.contains("worker one"));
        assert!(text.contains("state:        sleeping (S)"));

        for format in [OutputFormat::Json, OutputFormat::Yaml, OutputFormat::Toml] {
            let out = render(&report, format, render_text).unwrap();
            assert!(out.contains("num_threads"), "{format:?}: {out}");
        }
    }
}
