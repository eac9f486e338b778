//! Keyed per-process counters: the `io` record and the context-switch
//! lines of the `status` record.
//!
//! Both files are `key: value` lines. Keys this module needs must be
//! present; anything else in the file is ignored.

use serde::Serialize;

use crate::error::{ProcessError, Result};

/// Cumulative I/O accounting from `/proc/<pid>/io`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IoCounters {
    /// Read syscalls (`syscr`).
    pub read_count: u64,
    /// Write syscalls (`syscw`).
    pub write_count: u64,
    /// Bytes fetched from storage (`read_bytes`).
    pub read_bytes: u64,
    /// Bytes sent to storage (`write_bytes`).
    pub write_bytes: u64,
    /// Bytes passed through read-like syscalls, cache hits included (`rchar`).
    pub read_chars: u64,
    /// Bytes passed through write-like syscalls (`wchar`).
    pub write_chars: u64,
}

/// Voluntary and involuntary context switches from `/proc/<pid>/status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CtxSwitches {
    pub voluntary: u64,
    pub involuntary: u64,
}

fn keyed_value(content: &str, key: &'static str) -> Result<u64> {
    let raw = content
        .lines()
        .find_map(|line| {
            let (k, v) = line.split_once(':')?;
            (k.trim() == key).then_some(v)
        })
        .ok_or_else(|| ProcessError::malformed(0, key, "key not present"))?;
    raw.trim()
        .parse()
        .map_err(|e| ProcessError::malformed(0, key, format!("{:?}: {}", raw.trim(), e)))
}

/// Parses the contents of `/proc/<pid>/io`.
pub fn parse_io(content: &str) -> Result<IoCounters> {
    Ok(IoCounters {
        read_count: keyed_value(content, "syscr")?,
        write_count: keyed_value(content, "syscw")?,
        read_bytes: keyed_value(content, "read_bytes")?,
        write_bytes: keyed_value(content, "write_bytes")?,
        read_chars: keyed_value(content, "rchar")?,
        write_chars: keyed_value(content, "wchar")?,
    })
}

/// Extracts the context-switch counters from `/proc/<pid>/status`.
pub fn parse_ctx_switches(status: &str) -> Result<CtxSwitches> {
    Ok(CtxSwitches {
        voluntary: keyed_value(status, "voluntary_ctxt_switches")?,
        involuntary: keyed_value(status, "nonvoluntary_ctxt_switches")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const IO: &str = "rchar: 323934931\nwchar: 323929600\nsyscr: 632687\nsyscw: 632675\nread_bytes: 4096\nwrite_bytes: 323932160\ncancelled_write_bytes: 0\n";

    const STATUS: &str = "Name:\tbash\nUmask:\t0022\nState:\tS (sleeping)\nTgid:\t4242\nPid:\t4242\nPPid:\t1\nThreads:\t1\nvoluntary_ctxt_switches:\t150\nnonvoluntary_ctxt_switches:\t545\n";

    // -------------------------------------------------------------------------
    // Tests for parse_io
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_io() {
        let io = parse_io(IO).unwrap();
        assert_eq!(
            io,
            IoCounters {
                read_count: 632687,
                write_count: 632675,
                read_bytes: 4096,
                write_bytes: 323932160,
                read_chars: 323934931,
                write_chars: 323929600,
            }
        );
    }

    #[test]
    fn test_parse_io_missing_key() {
        let truncated = IO.replace("syscw: 632675\n", "");
        assert!(matches!(
            parse_io(&truncated),
            Err(ProcessError::RecordMalformed { field: 0, name: "syscw", .. })
        ));
    }

    #[test]
    fn test_parse_io_bad_value() {
        let bad = IO.replace("read_bytes: 4096", "read_bytes: lots");
        assert!(matches!(
            parse_io(&bad),
            Err(ProcessError::RecordMalformed { name: "read_bytes", .. })
        ));
    }

    // -------------------------------------------------------------------------
    // Tests for parse_ctx_switches
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_ctx_switches() {
        let ctx = parse_ctx_switches(STATUS).unwrap();
        assert_eq!(ctx.voluntary, 150);
        assert_eq!(ctx.involuntary, 545);
    }

    #[test]
    fn test_voluntary_key_not_confused_with_nonvoluntary() {
        let only_non = "nonvoluntary_ctxt_switches:\t3\n";
        assert!(matches!(
            parse_ctx_switches(only_non),
            Err(ProcessError::RecordMalformed { name: "voluntary_ctxt_switches", .. })
        ));
    }
}
