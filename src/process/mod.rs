//! Process introspection: record parsing, handles, CPU usage and relationships.
//!
//! This module provides:
//! - `stat`: Parser for the per-process `stat` record
//! - `source`: Host collaborators (record source, enumeration, clock)
//! - `handle`: The [`Process`] handle
//! - `cpu`: CPU time conversion and usage calculation
//! - `counters`: I/O accounting and context switches
//! - `tree`: Parent/child resolution over a process scan
//! - `scanner`: Process discovery on a procfs root

pub mod counters;
pub mod cpu;
pub mod handle;
pub mod scanner;
pub mod source;
pub mod stat;
pub mod tree;

// Re-export commonly used types
pub use counters::{parse_ctx_switches, parse_io, CtxSwitches, IoCounters};
pub use cpu::{percent_between, CpuSample, CpuTimes, CLK_TCK, PAGE_SIZE};
pub use handle::{Identity, MemoryInfo, Process};
pub use scanner::collect_pids;
pub use source::{EnumerationService, Host, HostClock, ProcFs, RecordSource, SystemClock};
pub use stat::{parse_stat, ProcessState, ResourceLimit, StatSnapshot, TtyDevice, ROOT_PPID};
pub use tree::{walk_ancestors, ProcessTable};

use crate::error::Result;

/// Pids of every live process, in enumeration order.
pub fn pids(host: &Host) -> Result<Vec<u32>> {
    host.enumeration().list_pids()
}

pub fn pid_exists(host: &Host, pid: u32) -> Result<bool> {
    host.enumeration().pid_exists(pid)
}
