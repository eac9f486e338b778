//! Host collaborators: where records, pid lists and clock constants come from.
//!
//! Everything above this module is written against the three traits here.
//! [`Host::detect`] picks the implementation for the running platform once;
//! tests build a [`Host`] from their own fakes with [`Host::new`].

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use once_cell::sync::OnceCell;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::error::{ProcessError, Result};
use crate::process::cpu::{CLK_TCK, PAGE_SIZE};
use crate::process::scanner::collect_pids;
use crate::process::stat::{parse_stat, StatSnapshot};

/// Supplies the raw per-process records.
pub trait RecordSource: Send + Sync {
    /// Raw `stat` record text for `pid`.
    fn read_stat(&self, pid: u32) -> Result<String>;

    /// Resolved path of the executable image.
    fn read_exe(&self, pid: u32) -> Result<PathBuf>;

    /// Raw `io` accounting record. Sources without one report `Unsupported`.
    fn read_io(&self, pid: u32) -> Result<String> {
        Err(not_provided(pid, "io"))
    }

    /// Raw `status` record. Sources without one report `Unsupported`.
    fn read_status(&self, pid: u32) -> Result<String> {
        Err(not_provided(pid, "status"))
    }
}

fn not_provided(pid: u32, what: &str) -> ProcessError {
    ProcessError::Io {
        pid,
        source: io::Error::new(
            io::ErrorKind::Unsupported,
            format!("record source provides no {what} record"),
        ),
    }
}

/// Lists live processes.
pub trait EnumerationService: Send + Sync {
    fn list_pids(&self) -> Result<Vec<u32>>;

    fn pid_exists(&self, pid: u32) -> Result<bool> {
        Ok(self.list_pids()?.contains(&pid))
    }
}

/// Host constants needed to convert tick-based fields.
pub trait HostClock: Send + Sync {
    fn ticks_per_second(&self) -> f64;

    /// Boot time, seconds since the Unix epoch.
    fn boot_time_secs(&self) -> Result<u64>;

    fn page_size(&self) -> u64;

    /// Current wall-clock time in seconds since the epoch. May go backwards.
    fn now_secs(&self) -> f64;
}

/// procfs-backed record source and enumeration.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pid_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    fn is_live_procfs(&self) -> bool {
        self.root == Path::new("/proc")
    }

    /// Reads `<root>/<pid>/<what>`. The kernel copies the process name into
    /// these records unescaped, so invalid UTF-8 is replaced, not rejected.
    fn read_record(&self, pid: u32, what: &'static str) -> Result<String> {
        let bytes = fs::read(self.pid_dir(pid).join(what))
            .map_err(|e| ProcessError::from_io(pid, what, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Like `read_record`, for records a live process may lack (no task I/O
    /// accounting in the kernel, fixture trees).
    fn read_optional_record(&self, pid: u32, what: &'static str) -> Result<String> {
        match self.read_record(pid, what) {
            Err(ProcessError::RecordUnavailable { .. }) if self.pid_dir(pid).exists() => {
                Err(ProcessError::Io {
                    pid,
                    source: io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("process has no {what} record"),
                    ),
                })
            }
            other => other,
        }
    }
}

impl RecordSource for ProcFs {
    fn read_stat(&self, pid: u32) -> Result<String> {
        let content = self.read_record(pid, "stat")?;
        // A process reaped mid-read can leave an empty record behind.
        if content.trim().is_empty() {
            return Err(ProcessError::RecordUnavailable { pid });
        }
        Ok(content)
    }

    fn read_exe(&self, pid: u32) -> Result<PathBuf> {
        let dir = self.pid_dir(pid);
        match fs::read_link(dir.join("exe")) {
            Ok(path) => Ok(path),
            // Kernel threads have no exe link even though the process exists.
            Err(e) if e.kind() == io::ErrorKind::NotFound && dir.exists() => {
                Err(ProcessError::Io {
                    pid,
                    source: io::Error::new(io::ErrorKind::NotFound, "process has no executable"),
                })
            }
            Err(e) => Err(ProcessError::from_io(pid, "exe", e)),
        }
    }

    fn read_io(&self, pid: u32) -> Result<String> {
        self.read_optional_record(pid, "io")
    }

    fn read_status(&self, pid: u32) -> Result<String> {
        self.read_optional_record(pid, "status")
    }
}

impl EnumerationService for ProcFs {
    fn list_pids(&self) -> Result<Vec<u32>> {
        collect_pids(&self.root).map_err(ProcessError::Enumeration)
    }

    fn pid_exists(&self, pid: u32) -> Result<bool> {
        if pid == 0 {
            return Ok(false);
        }
        if self.is_live_procfs() {
            if let Ok(raw) = i32::try_from(pid) {
                match kill(Pid::from_raw(raw), None) {
                    Ok(()) => return Ok(true),
                    Err(Errno::EPERM) => return Ok(true),
                    Err(Errno::ESRCH) => return Ok(false),
                    Err(e) => debug!("kill({}, 0) failed: {}, falling back to procfs", pid, e),
                }
            } else {
                return Ok(false);
            }
        }
        Ok(self.pid_dir(pid).exists())
    }
}

/// Host constants from `sysconf` and the procfs `stat` file.
#[derive(Debug)]
pub struct SystemClock {
    proc_root: PathBuf,
    boot_time: OnceCell<u64>,
}

impl SystemClock {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            boot_time: OnceCell::new(),
        }
    }
}

/// Extracts `btime` from the contents of `/proc/stat`.
pub fn parse_boot_time(content: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("btime "))
        .and_then(|v| v.trim().parse().ok())
}

impl HostClock for SystemClock {
    fn ticks_per_second(&self) -> f64 {
        *CLK_TCK
    }

    fn boot_time_secs(&self) -> Result<u64> {
        self.boot_time
            .get_or_try_init(|| {
                let path = self.proc_root.join("stat");
                let content = fs::read_to_string(&path).map_err(|e| {
                    ProcessError::HostUnavailable(format!("{}: {}", path.display(), e))
                })?;
                parse_boot_time(&content).ok_or_else(|| {
                    ProcessError::HostUnavailable(format!("no btime line in {}", path.display()))
                })
            })
            .copied()
    }

    fn page_size(&self) -> u64 {
        *PAGE_SIZE
    }

    fn now_secs(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// The set of collaborators a process handle reads through.
///
/// Cloning is cheap; every handle carries its own clone.
#[derive(Clone)]
pub struct Host {
    source: Arc<dyn RecordSource>,
    enumeration: Arc<dyn EnumerationService>,
    clock: Arc<dyn HostClock>,
}

impl Host {
    pub fn new(
        source: Arc<dyn RecordSource>,
        enumeration: Arc<dyn EnumerationService>,
        clock: Arc<dyn HostClock>,
    ) -> Self {
        Self {
            source,
            enumeration,
            clock,
        }
    }

    /// Selects the record source for the running operating system.
    pub fn detect() -> Result<Self> {
        if cfg!(target_os = "linux") {
            Ok(Self::with_proc_root("/proc"))
        } else {
            Err(ProcessError::UnsupportedHost {
                os: std::env::consts::OS,
            })
        }
    }

    /// procfs-backed host rooted somewhere other than `/proc`
    /// (container mounts, fixture trees).
    pub fn with_proc_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let procfs = Arc::new(ProcFs::new(root.clone()));
        Self {
            source: procfs.clone(),
            enumeration: procfs,
            clock: Arc::new(SystemClock::new(root)),
        }
    }

    pub fn source(&self) -> &dyn RecordSource {
        self.source.as_ref()
    }

    pub fn enumeration(&self) -> &dyn EnumerationService {
        self.enumeration.as_ref()
    }

    pub fn clock(&self) -> &dyn HostClock {
        self.clock.as_ref()
    }

    /// Reads and parses the record for `pid`.
    pub fn read_snapshot(&self, pid: u32) -> Result<StatSnapshot> {
        let record = self.source.read_stat(pid)?;
        let snapshot = parse_stat(&record)?;
        if snapshot.pid != pid {
            return Err(ProcessError::RecordMalformed {
                field: 1,
                name: "pid",
                reason: format!("record for {} reports pid {}", pid, snapshot.pid),
            });
        }
        Ok(snapshot)
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("ticks_per_second", &self.clock.ticks_per_second())
            .field("page_size", &self.clock.page_size())
            .finish_non_exhaustive()
    }
}
