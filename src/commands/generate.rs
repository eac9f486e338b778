//! Generate fixture command implementation.
//!
//! Writes a synthetic procfs tree (`stat` with `btime`, `<pid>/stat` and
//! `<pid>/exe`) that every other command can read through `--proc-root`.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use herakles_procstat::{ProcessState, ResourceLimit, StatSnapshot, ROOT_PPID};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// PF_KTHREAD | PF_NOFREEZE, as carried by kthreadd's children
const KTHREAD_FLAGS: u32 = 0x0020_8040;
const USER_FLAGS: u32 = 0x0040_0100;

const PAGE: u64 = 4096;
const MB: u64 = 1024 * 1024;

// Fraction of generated processes that are kernel threads
const KERNEL_THREAD_RATIO: f64 = 0.25;

const USER_NAMES: [&str; 12] = [
    "sshd", "bash", "nginx", "postgres", "cron", "dbus-daemon", "systemd-journal",
    "containerd", "python3", "java", "node", "rsyslogd",
];

const KERNEL_NAMES: [&str; 6] = [
    "kworker/0:1", "ksoftirqd/0", "migration/0", "rcu_sched", "kswapd0", "jbd2/sda1-8",
];

/// Builds a full record for a synthetic process.
fn synthetic_snapshot(
    rng: &mut impl Rng,
    pid: u32,
    ppid: u32,
    name: &str,
    kernel: bool,
    starttime: u64,
) -> StatSnapshot {
    let state = if kernel {
        *[ProcessState::Sleeping, ProcessState::Idle]
            .choose(rng)
            .unwrap_or(&ProcessState::Sleeping)
    } else {
        *[
            ProcessState::Sleeping,
            ProcessState::Sleeping,
            ProcessState::Sleeping,
            ProcessState::Running,
            ProcessState::DiskWait,
            ProcessState::Stopped,
        ]
        .choose(rng)
        .unwrap_or(&ProcessState::Sleeping)
    };

    let (vsize, rss) = if kernel {
        (0, 0)
    } else {
        let rss_bytes = rng.gen_range(2 * MB..512 * MB);
        (rss_bytes * rng.gen_range(2..8), (rss_bytes / PAGE) as i64)
    };

    let utime = rng.gen_range(0..500_000);
    let stime = rng.gen_range(0..utime / 2 + 1);
    let tty_nr = if !kernel && rng.gen_bool(0.2) {
        (136 << 8) | rng.gen_range(0..8)
    } else {
        0
    };

    StatSnapshot {
        pid,
        name: name.to_string(),
        state,
        ppid,
        pgrp: if kernel { 0 } else { pid },
        session: if kernel { 0 } else { pid },
        tty_nr,
        tpgid: -1,
        flags: if kernel { KTHREAD_FLAGS } else { USER_FLAGS },
        minflt: rng.gen_range(0..1_000_000),
        cminflt: rng.gen_range(0..1_000_000),
        majflt: rng.gen_range(0..1_000),
        cmajflt: rng.gen_range(0..1_000),
        utime,
        stime,
        cutime: rng.gen_range(0..10_000),
        cstime: rng.gen_range(0..5_000),
        priority: 20,
        nice: if kernel { 0 } else { rng.gen_range(-5..=19) },
        num_threads: if kernel { 1 } else { rng.gen_range(1..=64) },
        itrealvalue: 0,
        starttime,
        vsize,
        rss,
        rsslim: ResourceLimit::Unlimited,
        startcode: if kernel { 0 } else { 0x5555_5555_4000 },
        endcode: if kernel { 0 } else { 0x5555_5556_8000 },
        startstack: if kernel { 0 } else { 0x7ffd_0000_0000 },
        kstkesp: 0,
        kstkeip: 0,
        signal: 0,
        blocked: 0,
        sigignore: if kernel { 0xffff_ffff } else { 0x1000 },
        sigcatch: if kernel { 0 } else { 0x4_4a02 },
        wchan: 0,
        nswap: 0,
        cnswap: 0,
        exit_signal: Some(17),
        processor: Some(rng.gen_range(0..8)),
        rt_priority: Some(0),
        policy: Some(0),
        delayacct_blkio_ticks: Some(rng.gen_range(0..2_000)),
        guest_time: Some(0),
        cguest_time: Some(0),
        start_data: Some(0),
        end_data: Some(0),
        start_brk: Some(0),
        arg_start: Some(0),
        arg_end: Some(0),
        env_start: Some(0),
        env_end: Some(0),
        exit_code: Some(0),
    }
}

/// Generates `count` processes under `root` and returns what was written.
///
/// Pid 1 is always an init process and pid 2 always `kthreadd`. Every other
/// process is parented to an earlier one that started before it.
pub fn generate_fixture(
    root: &Path,
    count: usize,
    seed: Option<u64>,
) -> Result<Vec<StatSnapshot>> {
    if count < 2 {
        bail!("count must be at least 2 (init and kthreadd)");
    }

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    fs::create_dir_all(root).with_context(|| format!("creating {}", root.display()))?;

    let boot_time = Utc::now().timestamp() - rng.gen_range(3_600..30 * 86_400);
    fs::write(
        root.join("stat"),
        format!("cpu  0 0 0 0 0 0 0 0 0 0\nbtime {boot_time}\nprocesses {count}\n"),
    )?;

    let mut snapshots: Vec<StatSnapshot> = Vec::with_capacity(count);
    snapshots.push(synthetic_snapshot(&mut rng, 1, ROOT_PPID, "systemd", false, 1));
    snapshots.push(synthetic_snapshot(&mut rng, 2, ROOT_PPID, "kthreadd", true, 1));

    let mut pid: u32 = 100;
    let mut starttime: u64 = 200;
    while snapshots.len() < count {
        pid += rng.gen_range(1..40);
        starttime += rng.gen_range(1..5_000);

        let kernel = rng.gen_bool(KERNEL_THREAD_RATIO);
        let (ppid, name) = if kernel {
            (2, *KERNEL_NAMES.choose(&mut rng).unwrap_or(&"kworker/0:0"))
        } else {
            let user_parents: Vec<u32> = snapshots
                .iter()
                .filter(|s| !s.is_kernel_thread())
                .map(|s| s.pid)
                .collect();
            let ppid = *user_parents.choose(&mut rng).unwrap_or(&1);
            (ppid, *USER_NAMES.choose(&mut rng).unwrap_or(&"bash"))
        };

        snapshots.push(synthetic_snapshot(&mut rng, pid, ppid, name, kernel, starttime));
    }

    for s in &snapshots {
        write_process(root, s)?;
    }

    info!(
        "Generated {} processes in {} (boot time {})",
        snapshots.len(),
        root.display(),
        boot_time
    );
    Ok(snapshots)
}

fn write_process(root: &Path, snapshot: &StatSnapshot) -> Result<()> {
    let dir = root.join(snapshot.pid.to_string());
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("stat"), snapshot.to_record())?;

    if !snapshot.is_kernel_thread() {
        let exe = dir.join("exe");
        if exe.symlink_metadata().is_ok() {
            fs::remove_file(&exe)?;
        }
        let target = PathBuf::from("/usr/bin").join(&snapshot.name);
        std::os::unix::fs::symlink(&target, &exe)
            .with_context(|| format!("linking {}", exe.display()))?;
    }
    debug!("Wrote pid {} ({})", snapshot.pid, snapshot.name);
    Ok(())
}

/// Writes a synthetic procfs tree for offline testing.
pub fn command_generate_fixture(output: PathBuf, count: usize, seed: Option<u64>) -> Result<()> {
    let snapshots = generate_fixture(&output, count, seed)?;
    println!(
        "✅ Generated procfs fixture: {} processes in {}",
        snapshots.len(),
        output.display()
    );
    println!(
        "   Try: herakles-procstat --proc-root {} tree 1",
        output.display()
    );
    Ok(())
}
