//! CPU time conversion and usage calculation.
//!
//! Everything here is a pure function over one or two [`StatSnapshot`]s. The
//! stateful part (which sample is the baseline) lives on the process handle.

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::process::stat::StatSnapshot;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as f64;
            }
        }
    }
    // Fallback to common default for error cases or non-Unix platforms
    100.0
}

fn get_page_size() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no preconditions for _SC_PAGESIZE
        unsafe {
            let size = libc::sysconf(libc::_SC_PAGESIZE);
            if size > 0 {
                return size as u64;
            }
        }
    }
    4096
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Memory page size in bytes (for RSS conversion).
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

pub fn ticks_to_seconds(ticks: u64, ticks_per_second: f64) -> f64 {
    if ticks_per_second <= 0.0 {
        return 0.0;
    }
    ticks as f64 / ticks_per_second
}

/// Children's times are signed in the record; negative values clamp to zero.
fn signed_ticks_to_seconds(ticks: i64, ticks_per_second: f64) -> f64 {
    ticks_to_seconds(ticks.max(0) as u64, ticks_per_second)
}

/// Cumulative CPU time breakdown since process start, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CpuTimes {
    pub user: f64,
    pub system: f64,
    pub children_user: f64,
    pub children_system: f64,
    /// Time blocked on block I/O (delay accounting); 0 when not reported.
    pub iowait: f64,
}

impl CpuTimes {
    pub fn from_snapshot(snapshot: &StatSnapshot, ticks_per_second: f64) -> Self {
        Self {
            user: ticks_to_seconds(snapshot.utime, ticks_per_second),
            system: ticks_to_seconds(snapshot.stime, ticks_per_second),
            children_user: signed_ticks_to_seconds(snapshot.cutime, ticks_per_second),
            children_system: signed_ticks_to_seconds(snapshot.cstime, ticks_per_second),
            iowait: ticks_to_seconds(
                snapshot.delayacct_blkio_ticks.unwrap_or(0),
                ticks_per_second,
            ),
        }
    }

    /// user + system.
    pub fn total(&self) -> f64 {
        self.user + self.system
    }
}

/// One point on a process's cumulative CPU-time curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuSample {
    /// Cumulative user + system CPU seconds.
    pub cpu_seconds: f64,
    /// Wall-clock seconds since the epoch when the sample was taken.
    pub taken_at: f64,
}

impl CpuSample {
    pub fn from_snapshot(snapshot: &StatSnapshot, ticks_per_second: f64, taken_at: f64) -> Self {
        Self {
            cpu_seconds: ticks_to_seconds(snapshot.total_cpu_ticks(), ticks_per_second),
            taken_at,
        }
    }
}

/// CPU usage between two samples, as a percentage of one core.
///
/// Multi-threaded processes can exceed 100. Returns 0 when no wall-clock time
/// elapsed or the clock went backwards.
pub fn percent_between(prev: &CpuSample, cur: &CpuSample) -> f64 {
    let dt = (cur.taken_at - prev.taken_at).max(0.0);
    if dt <= 0.0 {
        return 0.0;
    }
    let delta_cpu = (cur.cpu_seconds - prev.cpu_seconds).max(0.0);
    let percent = (delta_cpu / dt) * 100.0;
    if percent.is_finite() {
        percent
    } else {
        0.0
    }
}

/// Process start as milliseconds since the epoch.
pub fn start_time_millis(boot_time_secs: u64, starttime_ticks: u64, ticks_per_second: f64) -> i64 {
    let since_boot_ms = ticks_to_seconds(starttime_ticks, ticks_per_second) * 1000.0;
    (boot_time_secs as i64).saturating_mul(1000) + since_boot_ms.round() as i64
}
