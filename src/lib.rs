//! Herakles Process Stat Library
//!
//! Per-process introspection for Linux built on the `stat` record that the
//! kernel publishes for every process. It parses the record into a typed
//! snapshot, wraps a pid in a handle that stays bound to one process
//! instance, derives CPU usage from successive samples and resolves
//! parent/child relationships across the live process set.
//!
//! # Usage
//!
//! ```rust,no_run
//! use herakles_procstat::{Host, Process};
//! use std::time::Duration;
//!
//! let host = Host::detect()?;
//! let mut me = Process::new(std::process::id(), host)?;
//!
//! println!("{} is {}", me.name()?, me.status()?);
//!
//! // First instantaneous call only establishes a baseline.
//! me.cpu_percent(Duration::ZERO)?;
//! let busy = me.cpu_percent(Duration::from_millis(200))?;
//! println!("cpu: {busy:.1}%");
//!
//! for child in me.children()? {
//!     println!("child {}", child.pid());
//! }
//! # Ok::<(), herakles_procstat::ProcessError>(())
//! ```
//!
//! # Host collaborators
//!
//! Reads go through the [`RecordSource`], [`EnumerationService`] and
//! [`HostClock`] traits bundled in a [`Host`]. [`Host::detect`] wires them to
//! `/proc`; [`Host::with_proc_root`] points them at another procfs mount or a
//! fixture tree, and [`Host::new`] accepts any implementation.

pub mod error;
pub mod process;

// Re-export main types for convenience
pub use error::{ProcessError, Result};
pub use process::{
    parse_stat, pid_exists, pids, CpuTimes, CtxSwitches, EnumerationService, Host, HostClock,
    Identity, IoCounters, MemoryInfo, Process, ProcessState, ProcessTable, RecordSource,
    ResourceLimit, StatSnapshot, TtyDevice, ROOT_PPID,
};
