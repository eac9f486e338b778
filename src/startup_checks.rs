//! Runtime requirement validation for herakles-procstat.
//!
//! Verifies that the procfs root is usable before any command reads from it.

use herakles_procstat::process::source::parse_boot_time;
use herakles_procstat::{Host, ProcessError};
use nix::unistd::geteuid;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Validate all runtime requirements for reading from `proc_root`.
pub fn validate_requirements(proc_root: &Path) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges();
    check_proc_root(proc_root)?;
    check_boot_time(proc_root)?;
    check_self_record(proc_root)?;

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Warns when other users' processes may be hidden from us.
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - executable paths of other users' processes are unreadable");
        warn!("   Recommendation: Run as root or grant cap_sys_ptrace for full visibility");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

fn check_proc_root(proc_root: &Path) -> Result<(), ValidationError> {
    match fs::read_dir(proc_root) {
        Ok(_) => {
            info!("✅ {} is readable", proc_root.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            error!("❌ Cannot list {} - insufficient permissions", proc_root.display());
            Err(ValidationError::InsufficientPermissions(e.to_string()))
        }
        Err(e) => {
            error!("❌ Cannot list {}: {}", proc_root.display(), e);
            Err(ValidationError::ProcRootUnavailable(format!(
                "{}: {}",
                proc_root.display(),
                e
            )))
        }
    }
}

fn check_boot_time(proc_root: &Path) -> Result<(), ValidationError> {
    let stat = proc_root.join("stat");
    let content = fs::read_to_string(&stat)
        .map_err(|e| ValidationError::BootTimeUnavailable(format!("{}: {}", stat.display(), e)))?;
    match parse_boot_time(&content) {
        Some(btime) => {
            debug!("Boot time: {}", btime);
            info!("✅ Boot time available");
            Ok(())
        }
        None => {
            error!("❌ No btime line in {}", stat.display());
            Err(ValidationError::BootTimeUnavailable(format!(
                "no btime line in {}",
                stat.display()
            )))
        }
    }
}

/// Parses our own record when reading the live procfs; a fixture tree
/// does not contain us, so any one record stands in for it.
fn check_self_record(proc_root: &Path) -> Result<(), ValidationError> {
    let host = Host::with_proc_root(proc_root);
    let pid = if proc_root == Path::new("/proc") {
        std::process::id()
    } else {
        match host.enumeration().list_pids() {
            Ok(pids) => match pids.first() {
                Some(&pid) => pid,
                None => {
                    warn!("⚠️  {} contains no processes", proc_root.display());
                    return Ok(());
                }
            },
            Err(e) => return Err(ValidationError::RecordCheckFailed(e)),
        }
    };

    match host.read_snapshot(pid) {
        Ok(snapshot) => {
            info!("✅ stat record of pid {} ({}) parsed", pid, snapshot.name);
            Ok(())
        }
        Err(e) => {
            error!("❌ Failed to parse stat record of pid {}: {}", pid, e);
            Err(ValidationError::RecordCheckFailed(e))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("procfs root unavailable: {0}")]
    ProcRootUnavailable(String),

    #[error("boot time unavailable: {0}")]
    BootTimeUnavailable(String),

    #[error("stat record check failed: {0}")]
    RecordCheckFailed(#[source] ProcessError),
}
