//! Parent/child relationships derived from the live process set.
//!
//! Nothing here is cached between queries: a [`ProcessTable`] is one scan of
//! the host, and the child index is built from it on first use.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{ProcessError, Result};
use crate::process::source::Host;
use crate::process::stat::{StatSnapshot, ROOT_PPID};

/// Every readable process on the host, in enumeration order.
#[derive(Debug, Default)]
pub struct ProcessTable {
    entries: Vec<StatSnapshot>,
    index: HashMap<u32, usize>,
    children: OnceCell<HashMap<u32, Vec<u32>>>,
}

impl ProcessTable {
    /// Reads every enumerated process in parallel.
    ///
    /// Processes that exit between enumeration and read, or whose record is
    /// hidden from us, are skipped. A malformed record fails the scan.
    pub fn scan(host: &Host) -> Result<Self> {
        let pids = host.enumeration().list_pids()?;
        let snapshots = pids
            .par_iter()
            .map(|&pid| match host.read_snapshot(pid) {
                Ok(s) => Ok(Some(s)),
                Err(e @ ProcessError::RecordUnavailable { .. })
                | Err(e @ ProcessError::PermissionDenied { .. }) => {
                    debug!("Skipping pid {} during scan: {}", pid, e);
                    Ok(None)
                }
                Err(e) => Err(e),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_snapshots(snapshots.into_iter().flatten()))
    }

    pub fn from_snapshots(snapshots: impl IntoIterator<Item = StatSnapshot>) -> Self {
        let entries: Vec<StatSnapshot> = snapshots.into_iter().collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, s)| (s.pid, i))
            .collect();
        Self {
            entries,
            index,
            children: OnceCell::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatSnapshot> {
        self.entries.iter()
    }

    pub fn get(&self, pid: u32) -> Option<&StatSnapshot> {
        self.index.get(&pid).map(|&i| &self.entries[i])
    }

    pub fn into_snapshots(self) -> Vec<StatSnapshot> {
        self.entries
    }

    /// ppid -> children, each list in enumeration order.
    pub fn children_map(&self) -> &HashMap<u32, Vec<u32>> {
        self.children.get_or_init(|| {
            let mut map: HashMap<u32, Vec<u32>> = HashMap::new();
            for s in &self.entries {
                map.entry(s.ppid).or_default().push(s.pid);
            }
            map
        })
    }

    /// Direct children of `pid`; empty if it has none.
    pub fn children(&self, pid: u32) -> Vec<u32> {
        self.children_map().get(&pid).cloned().unwrap_or_default()
    }

    /// All descendants of `pid`, breadth first.
    pub fn descendants(&self, pid: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut seen: HashSet<u32> = HashSet::new();
        seen.insert(pid);
        let mut frontier = vec![pid];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for parent in frontier {
                for child in self.children(parent) {
                    if seen.insert(child) {
                        out.push(child);
                        next.push(child);
                    }
                }
            }
            frontier = next;
        }
        out
    }

    /// Ancestors of `pid`, nearest first, from this table alone.
    ///
    /// An ancestor that started after its child holds a reused pid and ends
    /// the chain.
    pub fn ancestors(&self, pid: u32) -> Result<Vec<u32>> {
        let mut child_start: Option<u64> = None;
        walk_ancestors(pid, |p| {
            let s = self.get(p).ok_or(ProcessError::NoSuchProcess { pid: p })?;
            if matches!(child_start, Some(c) if s.starttime > c) {
                return Err(ProcessError::NoSuchProcess { pid: p });
            }
            child_start = Some(s.starttime);
            Ok(s.ppid)
        })
    }
}

/// Walks parent links from `start` until the root sentinel.
///
/// `parent_of(pid)` returns the ppid recorded for `pid`. The result lists
/// ancestors nearest first and only contains pids whose own record resolved;
/// the walk ends quietly at an ancestor that is gone. Revisiting a pid fails
/// with [`ProcessError::CyclicRelationship`].
pub fn walk_ancestors<F>(start: u32, mut parent_of: F) -> Result<Vec<u32>>
where
    F: FnMut(u32) -> Result<u32>,
{
    let mut chain = Vec::new();
    let mut visited: HashSet<u32> = HashSet::new();
    visited.insert(start);

    let mut next = parent_of(start)?;
    while next != ROOT_PPID {
        if !visited.insert(next) {
            chain.push(next);
            return Err(ProcessError::CyclicRelationship { pid: next, chain });
        }
        let grandparent = match parent_of(next) {
            Ok(p) => p,
            Err(e) if e.is_process_gone() => {
                debug!("Ancestor walk from {} stopped at {}: {}", start, next, e);
                break;
            }
            Err(e) => return Err(e),
        };
        chain.push(next);
        next = grandparent;
    }
    Ok(chain)
}
