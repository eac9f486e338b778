//! Typed model and parser for `/proc/<pid>/stat`.
//!
//! The record is positional: `pid (comm) state ppid ...`. The `comm` field is
//! the only free-text field and may itself contain spaces and parentheses, so
//! it is delimited by the first `(` and the *last* `)` in the record. Everything
//! after the name is consumed strictly left to right; see `proc(5)` for the
//! field list. Fields 38 and later were added over several kernel releases and
//! are parsed as an optional tail.

use serde::Serialize;
use std::fmt;
use std::str::{FromStr, SplitWhitespace};

use crate::error::{ProcessError, Result};

/// Parent pid reported for processes without a live parent (init, kthreadd).
pub const ROOT_PPID: u32 = 0;

/// `PF_KTHREAD` from `include/linux/sched.h`.
const PF_KTHREAD: u32 = 0x0020_0000;

/// Number of fields every supported kernel emits (through `cnswap`).
const MANDATORY_FIELDS: usize = 37;

/// Scheduler state, field 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Running,
    Sleeping,
    DiskWait,
    Zombie,
    Stopped,
    TracingStop,
    Paging,
    Dead,
    WakeKill,
    Parked,
    Idle,
    Unknown(char),
}

impl ProcessState {
    pub fn from_char(c: char) -> Self {
        match c {
            'R' => ProcessState::Running,
            'S' => ProcessState::Sleeping,
            'D' => ProcessState::DiskWait,
            'Z' => ProcessState::Zombie,
            'T' => ProcessState::Stopped,
            't' => ProcessState::TracingStop,
            'W' => ProcessState::Paging,
            'X' | 'x' => ProcessState::Dead,
            'K' => ProcessState::WakeKill,
            'P' => ProcessState::Parked,
            'I' => ProcessState::Idle,
            other => ProcessState::Unknown(other),
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            ProcessState::Running => 'R',
            ProcessState::Sleeping => 'S',
            ProcessState::DiskWait => 'D',
            ProcessState::Zombie => 'Z',
            ProcessState::Stopped => 'T',
            ProcessState::TracingStop => 't',
            ProcessState::Paging => 'W',
            ProcessState::Dead => 'X',
            ProcessState::WakeKill => 'K',
            ProcessState::Parked => 'P',
            ProcessState::Idle => 'I',
            ProcessState::Unknown(c) => *c,
        }
    }

    /// Human-readable name, as shown by `ps`-style tools.
    pub fn label(&self) -> &'static str {
        match self {
            ProcessState::Running => "running",
            ProcessState::Sleeping => "sleeping",
            ProcessState::DiskWait => "disk-sleep",
            ProcessState::Zombie => "zombie",
            ProcessState::Stopped => "stopped",
            ProcessState::TracingStop => "tracing-stop",
            ProcessState::Paging => "paging",
            ProcessState::Dead => "dead",
            ProcessState::WakeKill => "wake-kill",
            ProcessState::Parked => "parked",
            ProcessState::Idle => "idle",
            ProcessState::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Soft RSS limit, field 25. `RLIM_INFINITY` is reported as `u64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceLimit {
    Limited(u64),
    Unlimited,
}

impl ResourceLimit {
    /// Any value that does not fit below `u64::MAX` collapses to `Unlimited`.
    fn from_raw(raw: u128) -> Self {
        if raw >= u64::MAX as u128 {
            ResourceLimit::Unlimited
        } else {
            ResourceLimit::Limited(raw as u64)
        }
    }
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceLimit::Limited(v) => write!(f, "{v}"),
            ResourceLimit::Unlimited => write!(f, "{}", u64::MAX),
        }
    }
}

/// Controlling terminal decoded from `tty_nr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TtyDevice {
    pub major: u32,
    pub minor: u32,
}

impl TtyDevice {
    /// Decodes the kernel's `new_encode_dev` layout. Returns `None` for 0.
    pub fn from_tty_nr(tty_nr: i32) -> Option<Self> {
        if tty_nr == 0 {
            return None;
        }
        let raw = tty_nr as u32;
        Some(TtyDevice {
            major: (raw >> 8) & 0xfff,
            minor: (raw & 0xff) | ((raw >> 12) & 0xfff00),
        })
    }

    /// Best-effort device name for the common terminal majors.
    pub fn name(&self) -> Option<String> {
        match self.major {
            4 if self.minor < 64 => Some(format!("tty{}", self.minor)),
            4 => Some(format!("ttyS{}", self.minor - 64)),
            136..=143 => Some(format!("pts/{}", (self.major - 136) * 256 + self.minor)),
            _ => None,
        }
    }
}

/// One parsed `/proc/<pid>/stat` record.
///
/// Tick-valued fields are raw clock ticks; use [`crate::process::cpu`] to
/// convert them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatSnapshot {
    pub pid: u32,
    pub name: String,
    pub state: ProcessState,
    pub ppid: u32,
    pub pgrp: u32,
    pub session: u32,
    pub tty_nr: i32,
    pub tpgid: i32,
    pub flags: u32,
    pub minflt: u64,
    pub cminflt: u64,
    pub majflt: u64,
    pub cmajflt: u64,
    pub utime: u64,
    pub stime: u64,
    pub cutime: i64,
    pub cstime: i64,
    pub priority: i64,
    pub nice: i64,
    pub num_threads: i64,
    pub itrealvalue: i64,
    pub starttime: u64,
    pub vsize: u64,
    pub rss: i64,
    pub rsslim: ResourceLimit,
    pub startcode: u64,
    pub endcode: u64,
    pub startstack: u64,
    pub kstkesp: u64,
    pub kstkeip: u64,
    pub signal: u64,
    pub blocked: u64,
    pub sigignore: u64,
    pub sigcatch: u64,
    pub wchan: u64,
    pub nswap: u64,
    pub cnswap: u64,
    // Optional tail: each field is absent on kernels older than the one
    // that introduced it, and absence of one implies absence of the rest.
    pub exit_signal: Option<i32>,
    pub processor: Option<i32>,
    pub rt_priority: Option<u32>,
    pub policy: Option<u32>,
    pub delayacct_blkio_ticks: Option<u64>,
    pub guest_time: Option<u64>,
    pub cguest_time: Option<i64>,
    pub start_data: Option<u64>,
    pub end_data: Option<u64>,
    pub start_brk: Option<u64>,
    pub arg_start: Option<u64>,
    pub arg_end: Option<u64>,
    pub env_start: Option<u64>,
    pub env_end: Option<u64>,
    pub exit_code: Option<i32>,
}

impl StatSnapshot {
    /// utime + stime, in ticks.
    pub fn total_cpu_ticks(&self) -> u64 {
        self.utime.saturating_add(self.stime)
    }

    pub fn terminal(&self) -> Option<TtyDevice> {
        TtyDevice::from_tty_nr(self.tty_nr)
    }

    pub fn is_kernel_thread(&self) -> bool {
        self.flags & PF_KTHREAD != 0
    }

    pub fn has_parent(&self) -> bool {
        self.ppid != ROOT_PPID
    }

    /// Renders the snapshot back into the kernel's positional format.
    ///
    /// The optional tail is emitted up to the first absent field.
    pub fn to_record(&self) -> String {
        let mut out = format!(
            "{} ({}) {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} \
             {} {} {} {} {} {} {} {} {} {} {} {}",
            self.pid,
            self.name,
            self.state,
            self.ppid,
            self.pgrp,
            self.session,
            self.tty_nr,
            self.tpgid,
            self.flags,
            self.minflt,
            self.cminflt,
            self.majflt,
            self.cmajflt,
            self.utime,
            self.stime,
            self.cutime,
            self.cstime,
            self.priority,
            self.nice,
            self.num_threads,
            self.itrealvalue,
            self.starttime,
            self.vsize,
            self.rss,
            self.rsslim,
            self.startcode,
            self.endcode,
            self.startstack,
            self.kstkesp,
            self.kstkeip,
            self.signal,
            self.blocked,
            self.sigignore,
            self.sigcatch,
            self.wchan,
            self.nswap,
            self.cnswap,
        );

        let tail: [Option<String>; 15] = [
            self.exit_signal.map(|v| v.to_string()),
            self.processor.map(|v| v.to_string()),
            self.rt_priority.map(|v| v.to_string()),
            self.policy.map(|v| v.to_string()),
            self.delayacct_blkio_ticks.map(|v| v.to_string()),
            self.guest_time.map(|v| v.to_string()),
            self.cguest_time.map(|v| v.to_string()),
            self.start_data.map(|v| v.to_string()),
            self.end_data.map(|v| v.to_string()),
            self.start_brk.map(|v| v.to_string()),
            self.arg_start.map(|v| v.to_string()),
            self.arg_end.map(|v| v.to_string()),
            self.env_start.map(|v| v.to_string()),
            self.env_end.map(|v| v.to_string()),
            self.exit_code.map(|v| v.to_string()),
        ];
        for value in tail.into_iter().map_while(|v| v) {
            out.push(' ');
            out.push_str(&value);
        }
        out.push('\n');
        out
    }
}

/// Positional cursor over the fields following the name.
struct Fields<'a> {
    iter: SplitWhitespace<'a>,
    /// 1-based index of the next field.
    index: usize,
}

impl<'a> Fields<'a> {
    fn new(rest: &'a str) -> Self {
        Self {
            iter: rest.split_whitespace(),
            index: 3,
        }
    }

    fn raw(&mut self, name: &'static str) -> Result<&'a str> {
        let field = self.index;
        self.index += 1;
        self.iter.next().ok_or_else(|| {
            ProcessError::malformed(
                field,
                name,
                format!("record ends before field {field} (expected at least {MANDATORY_FIELDS})"),
            )
        })
    }

    fn next<T>(&mut self, name: &'static str) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let field = self.index;
        let raw = self.raw(name)?;
        parse_decimal(raw, field, name)
    }

    fn next_optional<T>(&mut self, name: &'static str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let field = self.index;
        match self.iter.next() {
            Some(raw) => {
                self.index += 1;
                parse_decimal(raw, field, name).map(Some)
            }
            None => Ok(None),
        }
    }
}

/// All `/proc/<pid>/stat` numbers are printed in base 10, including addresses.
fn parse_decimal<T>(raw: &str, field: usize, name: &'static str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ProcessError::malformed(field, name, format!("{raw:?}: {e}")))
}

/// Parses one `/proc/<pid>/stat` record.
pub fn parse_stat(record: &str) -> Result<StatSnapshot> {
    let open = record
        .find('(')
        .ok_or_else(|| ProcessError::malformed(2, "comm", "missing '('"))?;
    let close = record
        .rfind(')')
        .ok_or_else(|| ProcessError::malformed(2, "comm", "missing ')'"))?;
    if close < open {
        return Err(ProcessError::malformed(2, "comm", "')' precedes '('"));
    }

    let pid: u32 = parse_decimal(record[..open].trim(), 1, "pid")?;
    let name = record[open + 1..close].to_string();

    let mut fields = Fields::new(&record[close + 1..]);

    let state_raw = fields.raw("state")?;
    let mut chars = state_raw.chars();
    let state = match (chars.next(), chars.next()) {
        (Some(c), None) => ProcessState::from_char(c),
        _ => {
            return Err(ProcessError::malformed(
                3,
                "state",
                format!("expected a single character, got {state_raw:?}"),
            ))
        }
    };

    Ok(StatSnapshot {
        pid,
        name,
        state,
        ppid: fields.next("ppid")?,
        pgrp: fields.next("pgrp")?,
        session: fields.next("session")?,
        tty_nr: fields.next("tty_nr")?,
        tpgid: fields.next("tpgid")?,
        flags: fields.next("flags")?,
        minflt: fields.next("minflt")?,
        cminflt: fields.next("cminflt")?,
        majflt: fields.next("majflt")?,
        cmajflt: fields.next("cmajflt")?,
        utime: fields.next("utime")?,
        stime: fields.next("stime")?,
        cutime: fields.next("cutime")?,
        cstime: fields.next("cstime")?,
        priority: fields.next("priority")?,
        nice: fields.next("nice")?,
        num_threads: fields.next("num_threads")?,
        itrealvalue: fields.next("itrealvalue")?,
        starttime: fields.next("starttime")?,
        vsize: fields.next("vsize")?,
        rss: fields.next("rss")?,
        rsslim: ResourceLimit::from_raw(fields.next("rsslim")?),
        startcode: fields.next("startcode")?,
        endcode: fields.next("endcode")?,
        startstack: fields.next("startstack")?,
        kstkesp: fields.next("kstkesp")?,
        kstkeip: fields.next("kstkeip")?,
        signal: fields.next("signal")?,
        blocked: fields.next("blocked")?,
        sigignore: fields.next("sigignore")?,
        sigcatch: fields.next("sigcatch")?,
        wchan: fields.next("wchan")?,
        nswap: fields.next("nswap")?,
        cnswap: fields.next("cnswap")?,
        exit_signal: fields.next_optional("exit_signal")?,
        processor: fields.next_optional("processor")?,
        rt_priority: fields.next_optional("rt_priority")?,
        policy: fields.next_optional("policy")?,
        delayacct_blkio_ticks: fields.next_optional("delayacct_blkio_ticks")?,
        guest_time: fields.next_optional("guest_time")?,
        cguest_time: fields.next_optional("cguest_time")?,
        start_data: fields.next_optional("start_data")?,
        end_data: fields.next_optional("end_data")?,
        start_brk: fields.next_optional("start_brk")?,
        arg_start: fields.next_optional("arg_start")?,
        arg_end: fields.next_optional("arg_end")?,
        env_start: fields.next_optional("env_start")?,
        env_end: fields.next_optional("env_end")?,
        exit_code: fields.next_optional("exit_code")?,
    })
}
