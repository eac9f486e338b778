//! Error taxonomy for process introspection.
//!
//! Callers are expected to branch on the variant: a vanished process is
//! routine for any monitoring loop, a malformed record is a parser defect,
//! and a permission failure can usually be degraded around.

use std::io;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, ProcessError>;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The record for `pid` could not be located: the process has exited,
    /// or the handle's pid now belongs to a different process.
    #[error("process {pid} is gone (record unavailable)")]
    RecordUnavailable { pid: u32 },

    /// The record violates the expected grammar. `field` is the 1-based
    /// position in a `stat` record, or 0 for keyed records where `name` is
    /// the missing or unparseable key.
    #[error("malformed record at field {field} ({name}): {reason}")]
    RecordMalformed {
        field: usize,
        name: &'static str,
        reason: String,
    },

    /// The caller lacks rights to read `what` for `pid`.
    #[error("permission denied reading {what} of process {pid}")]
    PermissionDenied { pid: u32, what: &'static str },

    /// A relationship target (e.g. a parent) does not resolve to a live process.
    #[error("no such process: {pid}")]
    NoSuchProcess { pid: u32 },

    /// An ancestor walk revisited a pid.
    #[error("cyclic parent chain at pid {pid}: {chain:?}")]
    CyclicRelationship { pid: u32, chain: Vec<u32> },

    /// The live process set could not be listed.
    #[error("failed to enumerate processes: {0}")]
    Enumeration(#[source] io::Error),

    /// A host constant (boot time, tick rate) could not be determined.
    #[error("host information unavailable: {0}")]
    HostUnavailable(String),

    /// No record source exists for the running platform.
    #[error("unsupported host operating system: {os}")]
    UnsupportedHost { os: &'static str },

    /// Any other I/O failure while reading process data.
    #[error("I/O error reading process {pid}: {source}")]
    Io {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

impl ProcessError {
    /// Maps an I/O error from reading `what` of `pid` onto the taxonomy.
    ///
    /// ENOENT and ESRCH mean the process went away between lookup and read.
    pub fn from_io(pid: u32, what: &'static str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ProcessError::RecordUnavailable { pid },
            io::ErrorKind::PermissionDenied => ProcessError::PermissionDenied { pid, what },
            _ if err.raw_os_error() == Some(libc::ESRCH) => {
                ProcessError::RecordUnavailable { pid }
            }
            _ => ProcessError::Io { pid, source: err },
        }
    }

    pub(crate) fn malformed(field: usize, name: &'static str, reason: impl Into<String>) -> Self {
        ProcessError::RecordMalformed {
            field,
            name,
            reason: reason.into(),
        }
    }

    /// True for the expected "process went away" outcomes.
    pub fn is_process_gone(&self) -> bool {
        matches!(
            self,
            ProcessError::RecordUnavailable { .. } | ProcessError::NoSuchProcess { .. }
        )
    }
}
