//! Process handle: a pid pinned to one process instance.
//!
//! A handle remembers the start time it saw when it was created. If the pid
//! is later reused by another process the start time changes and every read
//! fails with [`ProcessError::RecordUnavailable`], so a stale handle never
//! reports data for a stranger.
//!
//! Handles are not internally synchronized. The CPU baseline is updated
//! through `&mut self`; share a handle across threads behind a lock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::error::{ProcessError, Result};
use crate::process::counters::{parse_ctx_switches, parse_io, CtxSwitches, IoCounters};
use crate::process::cpu::{percent_between, start_time_millis, CpuSample, CpuTimes};
use crate::process::source::Host;
use crate::process::stat::{ProcessState, StatSnapshot, TtyDevice, ROOT_PPID};
use crate::process::tree::{walk_ancestors, ProcessTable};

/// pid, short name and executable path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub pid: u32,
    pub name: String,
    pub exe: PathBuf,
}

/// Memory usage in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryInfo {
    pub rss: u64,
    pub vms: u64,
}

pub struct Process {
    pid: u32,
    host: Host,
    start_ticks: u64,
    cached: Option<StatSnapshot>,
    last_sample: Option<CpuSample>,
}

impl Process {
    /// Opens a handle, failing with `RecordUnavailable` if `pid` is not live.
    pub fn new(pid: u32, host: Host) -> Result<Self> {
        let snapshot = host.read_snapshot(pid)?;
        Ok(Self::from_snapshot(snapshot, host))
    }

    /// Opens a handle on an already-read snapshot without touching the host.
    pub fn from_snapshot(snapshot: StatSnapshot, host: Host) -> Self {
        Self {
            pid: snapshot.pid,
            host,
            start_ticks: snapshot.starttime,
            cached: Some(snapshot),
            last_sample: None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Last snapshot read through this handle. No I/O.
    pub fn cached(&self) -> Option<&StatSnapshot> {
        self.cached.as_ref()
    }

    /// Fresh read, checked against the pinned start time.
    fn read(&self) -> Result<StatSnapshot> {
        let snapshot = self.host.read_snapshot(self.pid)?;
        if snapshot.starttime != self.start_ticks {
            debug!(
                "pid {} was reused (start {} -> {}), handle is stale",
                self.pid, self.start_ticks, snapshot.starttime
            );
            return Err(ProcessError::RecordUnavailable { pid: self.pid });
        }
        Ok(snapshot)
    }

    /// Reads the current record and caches it on the handle.
    pub fn snapshot(&mut self) -> Result<&StatSnapshot> {
        let snapshot = self.read()?;
        Ok(self.cached.insert(snapshot))
    }

    pub fn name(&mut self) -> Result<String> {
        Ok(self.snapshot()?.name.clone())
    }

    /// Executable path; `PermissionDenied` when the link is not readable.
    pub fn exe(&self) -> Result<PathBuf> {
        self.read()?;
        self.host.source().read_exe(self.pid)
    }

    /// I/O accounting; reading another user's counters is usually
    /// `PermissionDenied`.
    pub fn io_counters(&self) -> Result<IoCounters> {
        self.read()?;
        parse_io(&self.host.source().read_io(self.pid)?)
    }

    pub fn num_ctx_switches(&self) -> Result<CtxSwitches> {
        self.read()?;
        parse_ctx_switches(&self.host.source().read_status(self.pid)?)
    }

    pub fn identity(&mut self) -> Result<Identity> {
        let name = self.name()?;
        let exe = self.exe()?;
        Ok(Identity {
            pid: self.pid,
            name,
            exe,
        })
    }

    /// Current scheduler state; always a fresh read.
    pub fn status(&mut self) -> Result<ProcessState> {
        Ok(self.snapshot()?.state)
    }

    pub fn ppid(&mut self) -> Result<u32> {
        Ok(self.snapshot()?.ppid)
    }

    pub fn nice(&mut self) -> Result<i64> {
        Ok(self.snapshot()?.nice)
    }

    pub fn num_threads(&mut self) -> Result<i64> {
        Ok(self.snapshot()?.num_threads)
    }

    pub fn terminal(&mut self) -> Result<Option<TtyDevice>> {
        Ok(self.snapshot()?.terminal())
    }

    pub fn memory_info(&mut self) -> Result<MemoryInfo> {
        let page_size = self.host.clock().page_size();
        let snapshot = self.snapshot()?;
        Ok(MemoryInfo {
            rss: (snapshot.rss.max(0) as u64).saturating_mul(page_size),
            vms: snapshot.vsize,
        })
    }

    /// Cumulative CPU times since the process started.
    pub fn times(&mut self) -> Result<CpuTimes> {
        let tck = self.host.clock().ticks_per_second();
        Ok(CpuTimes::from_snapshot(self.snapshot()?, tck))
    }

    /// When the process started. Stable for the lifetime of the handle.
    pub fn create_time(&mut self) -> Result<DateTime<Utc>> {
        self.snapshot()?;
        let clock = self.host.clock();
        let millis = start_time_millis(
            clock.boot_time_secs()?,
            self.start_ticks,
            clock.ticks_per_second(),
        );
        DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
            ProcessError::HostUnavailable(format!("create time {millis}ms out of range"))
        })
    }

    /// Wall-clock time since the process started.
    pub fn uptime(&mut self) -> Result<Duration> {
        let created = self.create_time()?.timestamp_millis() as f64 / 1000.0;
        let elapsed = (self.host.clock().now_secs() - created).max(0.0);
        Ok(Duration::from_secs_f64(elapsed))
    }

    fn sample(&self) -> Result<(StatSnapshot, CpuSample)> {
        let clock = self.host.clock();
        let snapshot = self.read()?;
        let sample =
            CpuSample::from_snapshot(&snapshot, clock.ticks_per_second(), clock.now_secs());
        Ok((snapshot, sample))
    }

    /// CPU usage as a percentage of one core.
    ///
    /// With a zero `interval` the result is measured against the previous
    /// zero-interval call on this handle (0 on the first call) and never
    /// blocks. A non-zero `interval` blocks the calling thread for that long
    /// and leaves the stored baseline alone.
    pub fn cpu_percent(&mut self, interval: Duration) -> Result<f64> {
        if !interval.is_zero() {
            return self.cpu_percent_over(interval);
        }

        let (snapshot, now) = self.sample()?;
        let percent = match &self.last_sample {
            Some(prev) => percent_between(prev, &now),
            None => 0.0,
        };
        self.last_sample = Some(now);
        self.cached = Some(snapshot);
        Ok(percent)
    }

    /// Blocking measurement over `interval`; does not read or write the baseline.
    pub fn cpu_percent_over(&self, interval: Duration) -> Result<f64> {
        let (_, first) = self.sample()?;
        thread::sleep(interval);
        let (_, second) = self.sample()?;
        Ok(percent_between(&first, &second))
    }

    /// The stored instantaneous-mode baseline, if any.
    pub fn cpu_baseline(&self) -> Option<CpuSample> {
        self.last_sample
    }

    /// False once the process has exited or its pid was reused.
    pub fn is_running(&self) -> Result<bool> {
        if !self.host.enumeration().pid_exists(self.pid)? {
            return Ok(false);
        }
        match self.read() {
            Ok(_) => Ok(true),
            Err(e) if e.is_process_gone() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Handle on the parent process.
    ///
    /// `NoSuchProcess` when the parent is the root sentinel, has exited, or
    /// its pid now belongs to a process younger than this one.
    pub fn parent(&mut self) -> Result<Process> {
        let ppid = self.ppid()?;
        if ppid == ROOT_PPID {
            return Err(ProcessError::NoSuchProcess { pid: ppid });
        }
        let parent = Process::new(ppid, self.host.clone()).map_err(|e| match e {
            ProcessError::RecordUnavailable { .. } => ProcessError::NoSuchProcess { pid: ppid },
            other => other,
        })?;
        if parent.start_ticks > self.start_ticks {
            return Err(ProcessError::NoSuchProcess { pid: ppid });
        }
        Ok(parent)
    }

    /// Handles on the live direct children, in enumeration order.
    pub fn children(&mut self) -> Result<Vec<Process>> {
        self.snapshot()?;
        let table = ProcessTable::scan(&self.host)?;
        Ok(table
            .children(self.pid)
            .iter()
            .filter_map(|&pid| table.get(pid))
            .map(|s| Process::from_snapshot(s.clone(), self.host.clone()))
            .collect())
    }

    /// Ancestor pids, nearest first, ending before the root sentinel.
    ///
    /// Like [`Process::parent`], an ancestor that started after its child
    /// holds a reused pid; the chain ends before it.
    pub fn ancestors(&mut self) -> Result<Vec<u32>> {
        let own_ppid = self.ppid()?;
        let pid = self.pid;
        let host = self.host.clone();
        let mut child_start = self.start_ticks;
        walk_ancestors(pid, |p| {
            if p == pid {
                return Ok(own_ppid);
            }
            let s = host.read_snapshot(p)?;
            if s.starttime > child_start {
                return Err(ProcessError::NoSuchProcess { pid: p });
            }
            child_start = s.starttime;
            Ok(s.ppid)
        })
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("start_ticks", &self.start_ticks)
            .field("name", &self.cached.as_ref().map(|s| s.name.as_str()))
            .finish()
    }
}
