//! Process discovery by scanning a procfs root for numeric entries.

use std::fs;
use std::io;
use std::path::Path;

/// Scans `root` for numeric entries and returns their pids, in directory order.
///
/// Entries that disappear while the directory is being read are skipped.
pub fn collect_pids(root: &Path) -> io::Result<Vec<u32>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root)?.flatten() {
        let file_name = entry.file_name();
        let name = match file_name.to_str() {
            Some(v) => v,
            None => continue,
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        match name.parse() {
            Ok(pid) => out.push(pid),
            Err(_) => continue,
        }
    }
    Ok(out)
}
