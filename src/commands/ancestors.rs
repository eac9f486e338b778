//! Ancestors command implementation.

use anyhow::{Context, Result};
use herakles_procstat::{Host, Process};
use serde::Serialize;
use std::fmt::Write as _;

use crate::commands::{host_for, render};
use crate::config::Config;

#[derive(Debug, Serialize)]
pub struct AncestorEntry {
    pub pid: u32,
    /// Empty when the ancestor exited after the walk.
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AncestorsReport {
    pub pid: u32,
    pub name: String,
    /// Nearest first.
    pub ancestors: Vec<AncestorEntry>,
}

pub fn collect_ancestors(host: &Host, pid: u32) -> Result<AncestorsReport> {
    let mut p = Process::new(pid, host.clone()).with_context(|| format!("process {pid}"))?;
    let name = p.name()?;
    let ancestors = p
        .ancestors()?
        .into_iter()
        .map(|a| AncestorEntry {
            pid: a,
            name: host.read_snapshot(a).map(|s| s.name).unwrap_or_default(),
        })
        .collect();
    Ok(AncestorsReport {
        pid,
        name,
        ancestors,
    })
}

fn render_text(r: &AncestorsReport) -> String {
    let mut out = format!("{} {}\n", r.pid, r.name);
    for (depth, a) in r.ancestors.iter().enumerate() {
        let _ = writeln!(out, "{}└─ {} {}", "  ".repeat(depth), a.pid, a.name);
    }
    out
}

/// Prints the ancestor chain of `pid`, nearest first.
pub fn command_ancestors(pid: u32, config: &Config) -> Result<()> {
    let host = host_for(config)?;
    let report = collect_ancestors(&host, pid)?;
    print!("{}", render(&report, config.output_format(), render_text)?);
    Ok(())
}
