//! Tests against fake procfs trees and fault-injecting collaborators.

use herakles_procstat::{
    parse_stat, pids, EnumerationService, Host, HostClock, Process, ProcessError, ProcessState,
    ProcessTable, RecordSource, Result, ROOT_PPID,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

const BOOT_TIME: u64 = 1_700_000_000;

fn record(pid: u32, name: &str, state: char, ppid: u32, utime: u64, start: u64) -> String {
    format!(
        "{pid} ({name}) {state} {ppid} {pid} {pid} 0 -1 4194304 10 0 0 0 {utime} 0 0 0 20 0 1 0 {start} 1048576 64 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0\n"
    )
}

fn write(root: &Path, pid: u32, content: &str) {
    let dir = root.join(pid.to_string());
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("stat"), content).unwrap();
}

/// init(1) -> sshd(40) -> {bash(41) -> vim(43), bash(42)}; kthreadd(2) -> kworker(3)
fn fixture() -> TempDir {
    let dir = tempdir().expect("Failed to create temp dir");
    fs::write(
        dir.path().join("stat"),
        format!("cpu  1 2 3 4\nbtime {BOOT_TIME}\n"),
    )
    .unwrap();
    write(dir.path(), 1, &record(1, "init", 'S', 0, 100, 1));
    write(dir.path(), 2, &record(2, "kthreadd", 'S', 0, 0, 1));
    write(dir.path(), 3, &record(3, "kworker/0:0-events", 'I', 2, 5, 2));
    write(dir.path(), 40, &record(40, "sshd", 'S', 1, 50, 500));
    write(dir.path(), 41, &record(41, "bash", 'S', 40, 20, 600));
    write(dir.path(), 42, &record(42, "bash", 'R', 40, 20, 650));
    write(dir.path(), 43, &record(43, "vim (x)", 'T', 41, 7, 700));
    dir
}

// -------------------------------------------------------------------------
// procfs fixture trees
// -------------------------------------------------------------------------

#[test]
fn test_fixture_enumeration_and_scan() {
    let dir = fixture();
    let host = Host::with_proc_root(dir.path());
    let mut all = pids(&host).unwrap();
    all.sort_unstable();
    assert_eq!(all, vec![1, 2, 3, 40, 41, 42, 43]);

    let table = ProcessTable::scan(&host).unwrap();
    assert_eq!(table.len(), 7);
    let mut kids = table.children(40);
    kids.sort_unstable();
    assert_eq!(kids, vec![41, 42]);
    assert_eq!(table.get(43).map(|s| s.name.as_str()), Some("vim (x)"));
}

#[test]
fn test_fixture_handle_accessors() {
    let dir = fixture();
    let host = Host::with_proc_root(dir.path());
    let mut vim = Process::new(43, host).unwrap();

    assert_eq!(vim.name().unwrap(), "vim (x)");
    assert_eq!(vim.status().unwrap(), ProcessState::Stopped);
    assert_eq!(vim.ancestors().unwrap(), vec![41, 40, 1]);
    assert_eq!(
        vim.create_time().unwrap().timestamp(),
        BOOT_TIME as i64 + 7
    );
    assert!(vim.children().unwrap().is_empty());
}

#[test]
fn test_fixture_children_of_init() {
    let dir = fixture();
    let host = Host::with_proc_root(dir.path());
    let mut init = Process::new(1, host).unwrap();
    let kids: Vec<u32> = init.children().unwrap().iter().map(|c| c.pid()).collect();
    assert_eq!(kids, vec![40]);
    assert!(matches!(
        init.parent(),
        Err(ProcessError::NoSuchProcess { pid }) if pid == ROOT_PPID
    ));
}

#[test]
fn test_fixture_non_utf8_name_does_not_break_scan() {
    let dir = fixture();
    let rest = record(44, "x", 'S', 40, 3, 800);
    let raw = [b"44 (na\xffme".as_slice(), &rest.as_bytes()[rest.find(')').unwrap()..]].concat();
    fs::create_dir_all(dir.path().join("44")).unwrap();
    fs::write(dir.path().join("44/stat"), raw).unwrap();
    let host = Host::with_proc_root(dir.path());

    let mut odd = Process::new(44, host.clone()).unwrap();
    assert_eq!(odd.name().unwrap(), "na\u{fffd}me");

    let table = ProcessTable::scan(&host).unwrap();
    assert_eq!(table.len(), 8);

    let mut sshd = Process::new(40, host).unwrap();
    let kids: Vec<u32> = sshd.children().unwrap().iter().map(|c| c.pid()).collect();
    assert!(kids.contains(&44), "{kids:?}");
}

#[test]
fn test_fixture_io_counters_and_ctx_switches() {
    let dir = fixture();
    fs::write(
        dir.path().join("41/io"),
        "rchar: 5000\nwchar: 600\nsyscr: 12\nsyscw: 7\nread_bytes: 0\nwrite_bytes: 4096\ncancelled_write_bytes: 0\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("41/status"),
        "Name:\tbash\nState:\tS (sleeping)\nPPid:\t40\nvoluntary_ctxt_switches:\t77\nnonvoluntary_ctxt_switches:\t8\n",
    )
    .unwrap();
    let host = Host::with_proc_root(dir.path());
    let bash = Process::new(41, host).unwrap();

    let io = bash.io_counters().unwrap();
    assert_eq!((io.read_count, io.write_count), (12, 7));
    assert_eq!((io.read_chars, io.write_chars), (5000, 600));
    assert_eq!(io.write_bytes, 4096);

    let ctx = bash.num_ctx_switches().unwrap();
    assert_eq!((ctx.voluntary, ctx.involuntary), (77, 8));
}

#[test]
fn test_fixture_truncated_status_is_malformed() {
    let dir = fixture();
    fs::write(dir.path().join("42/status"), "Name:\tbash\n").unwrap();
    let bash = Process::new(42, Host::with_proc_root(dir.path())).unwrap();
    assert!(matches!(
        bash.num_ctx_switches(),
        Err(ProcessError::RecordMalformed { field: 0, .. })
    ));
}

#[test]
fn test_fixture_process_exits_between_calls() {
    let dir = fixture();
    let host = Host::with_proc_root(dir.path());
    let mut bash = Process::new(42, host).unwrap();
    assert_eq!(bash.status().unwrap(), ProcessState::Running);

    fs::remove_dir_all(dir.path().join("42")).unwrap();
    assert!(!bash.is_running().unwrap());
    assert!(matches!(
        bash.times(),
        Err(ProcessError::RecordUnavailable { pid: 42 })
    ));
}

#[test]
fn test_fixture_pid_reuse_detected() {
    let dir = fixture();
    let host = Host::with_proc_root(dir.path());
    let mut bash = Process::new(42, host.clone()).unwrap();

    // Same pid, new process with a later start time.
    write(dir.path(), 42, &record(42, "python3", 'R', 1, 0, 9000));
    assert!(matches!(
        bash.name(),
        Err(ProcessError::RecordUnavailable { pid: 42 })
    ));
    assert_eq!(Process::new(42, host).unwrap().name().unwrap(), "python3");
}

#[test]
fn test_fixture_reused_parent_pid_not_reported_as_parent() {
    let dir = fixture();
    let host = Host::with_proc_root(dir.path());
    // sshd exits and a younger process takes pid 40.
    write(dir.path(), 40, &record(40, "newcomer", 'S', 1, 0, 9000));
    let mut bash = Process::new(41, host).unwrap();
    assert!(matches!(
        bash.parent(),
        Err(ProcessError::NoSuchProcess { pid: 40 })
    ));
}

#[test]
fn test_fixture_malformed_record_fails_scan() {
    let dir = fixture();
    write(dir.path(), 50, "50 (broken) S 1 50\n");
    let host = Host::with_proc_root(dir.path());
    assert!(matches!(
        ProcessTable::scan(&host),
        Err(ProcessError::RecordMalformed { .. })
    ));
}

#[test]
fn test_fixture_cycle_detected() {
    let dir = fixture();
    write(dir.path(), 60, &record(60, "a", 'S', 61, 0, 800));
    write(dir.path(), 61, &record(61, "b", 'S', 60, 0, 800));
    let host = Host::with_proc_root(dir.path());
    let mut a = Process::new(60, host).unwrap();
    assert!(matches!(
        a.ancestors(),
        Err(ProcessError::CyclicRelationship { .. })
    ));
}

// -------------------------------------------------------------------------
// Fault-injecting collaborators
// -------------------------------------------------------------------------

/// Serves records from memory; each read can be made to fail.
#[derive(Default)]
struct ScriptedHost {
    records: Mutex<HashMap<u32, String>>,
    denied: Mutex<Vec<u32>>,
    reads: AtomicUsize,
    now: Mutex<f64>,
}

impl ScriptedHost {
    fn put(&self, pid: u32, content: String) {
        self.records.lock().unwrap().insert(pid, content);
    }
}

impl RecordSource for ScriptedHost {
    fn read_stat(&self, pid: u32) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.denied.lock().unwrap().contains(&pid) {
            return Err(ProcessError::PermissionDenied { pid, what: "stat" });
        }
        self.records
            .lock()
            .unwrap()
            .get(&pid)
            .cloned()
            .ok_or(ProcessError::RecordUnavailable { pid })
    }

    fn read_exe(&self, pid: u32) -> Result<PathBuf> {
        Err(ProcessError::PermissionDenied { pid, what: "exe" })
    }
}

impl EnumerationService for ScriptedHost {
    fn list_pids(&self) -> Result<Vec<u32>> {
        let mut all: Vec<u32> = self.records.lock().unwrap().keys().copied().collect();
        all.extend(self.denied.lock().unwrap().iter().copied());
        all.sort_unstable();
        all.dedup();
        Ok(all)
    }
}

impl HostClock for ScriptedHost {
    fn ticks_per_second(&self) -> f64 {
        250.0
    }

    fn boot_time_secs(&self) -> Result<u64> {
        Ok(BOOT_TIME)
    }

    fn page_size(&self) -> u64 {
        16384
    }

    fn now_secs(&self) -> f64 {
        *self.now.lock().unwrap()
    }
}

fn scripted() -> (Arc<ScriptedHost>, Host) {
    let fake = Arc::new(ScriptedHost::default());
    *fake.now.lock().unwrap() = BOOT_TIME as f64 + 100.0;
    let host = Host::new(fake.clone(), fake.clone(), fake.clone());
    (fake, host)
}

#[test]
fn test_scripted_scan_skips_denied_and_vanished() {
    let (fake, host) = scripted();
    fake.put(1, record(1, "init", 'S', 0, 0, 1));
    fake.put(5, record(5, "svc", 'S', 1, 0, 10));
    fake.denied.lock().unwrap().push(6);

    let table = ProcessTable::scan(&host).unwrap();
    let mut seen: Vec<u32> = table.iter().map(|s| s.pid).collect();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 5]);
}

#[test]
fn test_scripted_host_constants_flow_through() {
    let (fake, host) = scripted();
    // 500 ticks at 250 Hz = 2s of CPU; starttime 1000 ticks = 4s after boot
    fake.put(9, record(9, "job", 'R', 1, 500, 1000));
    let mut p = Process::new(9, host).unwrap();

    assert_eq!(p.times().unwrap().user, 2.0);
    assert_eq!(p.create_time().unwrap().timestamp(), BOOT_TIME as i64 + 4);
    assert_eq!(p.memory_info().unwrap().rss, 64 * 16384);
    assert_eq!(p.uptime().unwrap(), Duration::from_secs(96));
    assert!(matches!(
        p.exe(),
        Err(ProcessError::PermissionDenied { what: "exe", .. })
    ));
}

#[test]
fn test_scripted_cpu_percent_sequence() {
    let (fake, host) = scripted();
    fake.put(9, record(9, "job", 'R', 1, 0, 1000));
    let mut p = Process::new(9, host).unwrap();
    assert_eq!(p.cpu_percent(Duration::ZERO).unwrap(), 0.0);

    // 250 ticks (1s) over 4s
    fake.put(9, record(9, "job", 'R', 1, 250, 1000));
    *fake.now.lock().unwrap() += 4.0;
    assert_eq!(p.cpu_percent(Duration::ZERO).unwrap(), 25.0);
}

#[test]
fn test_scripted_cached_snapshot_needs_no_io() {
    let (fake, host) = scripted();
    fake.put(9, record(9, "job", 'R', 1, 0, 1000));
    let p = Process::new(9, host).unwrap();
    let reads = fake.reads.load(Ordering::SeqCst);
    assert_eq!(p.cached().map(|s| s.pid), Some(9));
    assert_eq!(fake.reads.load(Ordering::SeqCst), reads);
}

#[test]
fn test_scripted_record_for_wrong_pid_is_malformed() {
    let (fake, host) = scripted();
    fake.put(9, record(10, "liar", 'R', 1, 0, 1000));
    assert!(matches!(
        Process::new(9, host),
        Err(ProcessError::RecordMalformed { field: 1, .. })
    ));
}

#[test]
fn test_parse_is_pure() {
    let r = record(43, "vim (x)", 'T', 41, 7, 700);
    assert_eq!(parse_stat(&r).unwrap(), parse_stat(&r).unwrap());
    assert_eq!(parse_stat(&r).unwrap().to_record(), r);
}
