//! Top command implementation.
//!
//! Samples every matching process twice and lists the busiest.

use anyhow::Result;
use herakles_procstat::{Host, Process, ProcessState, ProcessTable};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt::Write as _;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::commands::{host_for, render};
use crate::config::{Config, NameFilter};

#[derive(Debug, Clone, Serialize)]
pub struct TopEntry {
    pub pid: u32,
    pub name: String,
    pub state: ProcessState,
    pub cpu_percent: f64,
    pub rss_bytes: u64,
    pub num_threads: i64,
}

#[derive(Debug, Serialize)]
pub struct TopReport {
    pub interval_ms: u64,
    /// Processes that were still alive at the second sample.
    pub sampled: usize,
    pub processes: Vec<TopEntry>,
}

/// Samples all processes passing `filter` over `interval` and keeps the `n` busiest.
pub fn collect_top(
    host: &Host,
    filter: &NameFilter,
    interval: Duration,
    n: usize,
) -> Result<TopReport> {
    let start = Instant::now();
    let table = ProcessTable::scan(host)?;
    let mut handles: Vec<Process> = table
        .into_snapshots()
        .into_iter()
        .filter(|s| filter.matches(&s.name))
        .map(|s| Process::from_snapshot(s, host.clone()))
        .collect();

    // First pass only sets each handle's baseline.
    handles.par_iter_mut().for_each(|p| {
        if let Err(e) = p.cpu_percent(Duration::ZERO) {
            debug!("Baseline for pid {} failed: {}", p.pid(), e);
        }
    });

    thread::sleep(interval);

    let page_size = host.clock().page_size();
    let mut entries: Vec<TopEntry> = handles
        .par_iter_mut()
        .filter_map(|p| {
            let cpu_percent = match p.cpu_percent(Duration::ZERO) {
                Ok(v) => v,
                Err(e) => {
                    debug!("Dropping pid {} from top: {}", p.pid(), e);
                    return None;
                }
            };
            let s = p.cached()?;
            Some(TopEntry {
                pid: s.pid,
                name: s.name.clone(),
                state: s.state,
                cpu_percent,
                rss_bytes: (s.rss.max(0) as u64).saturating_mul(page_size),
                num_threads: s.num_threads,
            })
        })
        .collect();

    let sampled = entries.len();
    entries.sort_by(|a, b| {
        b.cpu_percent
            .total_cmp(&a.cpu_percent)
            .then_with(|| b.rss_bytes.cmp(&a.rss_bytes))
            .then_with(|| a.pid.cmp(&b.pid))
    });
    entries.truncate(n);

    info!(
        "Sampled {} processes in {:.2}s",
        sampled,
        start.elapsed().as_secs_f64()
    );

    Ok(TopReport {
        interval_ms: interval.as_millis() as u64,
        sampled,
        processes: entries,
    })
}

fn render_text(r: &TopReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>8} {:>7} {:>10} {:>4} {:>5}  NAME",
        "PID", "CPU%", "RSS(KB)", "S", "THR"
    );
    for e in &r.processes {
        let _ = writeln!(
            out,
            "{:>8} {:>7.1} {:>10} {:>4} {:>5}  {}",
            e.pid,
            e.cpu_percent,
            e.rss_bytes / 1024,
            e.state.as_char(),
            e.num_threads,
            e.name
        );
    }
    let _ = writeln!(
        out,
        "\n{} of {} processes over {} ms",
        r.processes.len(),
        r.sampled,
        r.interval_ms
    );
    out
}

/// Prints the busiest processes.
pub fn command_top(interval_ms: Option<u64>, n: Option<usize>, config: &Config) -> Result<()> {
    let host = host_for(config)?;
    let filter = config.name_filter()?;
    let interval =
        Duration::from_millis(interval_ms.unwrap_or_else(|| config.sample_interval_ms()));
    let n = n.unwrap_or_else(|| config.top_n());
    let report = collect_top(&host, &filter, interval, n)?;
    print!("{}", render(&report, config.output_format(), render_text)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_proc(root: &std::path::Path, pid: u32, name: &str, rss: u64) {
        let dir = root.join(pid.to_string());
        fs::create_dir(&dir).unwrap();
        fs::write(
            dir.join("stat"),
            format!(
                "{pid} ({name}) R 1 {pid} {pid} 0 -1 0 0 0 0 0 10 10 0 0 20 0 2 0 100 4096000 {rss} 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n"
            ),
        )
        .unwrap();
    }

    // -------------------------------------------------------------------------
    // Tests for collect_top
    // -------------------------------------------------------------------------

    #[test]
    fn test_collect_top_filters_and_orders() {
        let dir = tempdir().expect("Failed to create temp dir");
        write_proc(dir.path(), 10, "nginx", 100);
        write_proc(dir.path(), 11, "nginx", 300);
        write_proc(dir.path(), 12, "kworker/0:1", 900);
        write_proc(dir.path(), 13, "bash", 50);

        let host = Host::with_proc_root(dir.path());
        let filter = Config {
            exclude_names: Some(vec!["kworker".into()]),
            ..Config::default()
        }
        .name_filter()
        .unwrap();

        let report = collect_top(&host, &filter, Duration::from_millis(1), 2).unwrap();
        assert_eq!(report.sampled, 3);
        // Static fixture: no CPU progress, so order falls back to RSS.
        let pids: Vec<u32> = report.processes.iter().map(|e| e.pid).collect();
        assert_eq!(pids, vec![11, 10]);
        assert!(report.processes.iter().all(|e| e.cpu_percent == 0.0));
        assert_eq!(report.processes[0].num_threads, 2);
    }

    #[test]
    fn test_render_top_text() {
        let report = TopReport {
            interval_ms: 500,
            sampled: 1,
            processes: vec![TopEntry {
                pid: 42,
                name: "busy".into(),
                state: ProcessState::Running,
                cpu_percent: 99.5,
                rss_bytes: 2048,
                num_threads: 1,
            }],
        };
        let text = render_text(&report);
        assert!(text.contains("99.5"));
        assert!(text.contains("busy"));
        assert!(text.contains("1 of 1 processes over 500 ms"));
    }
}
