//! Tree command implementation.
//!
//! Renders the descendants of a process from a single scan.

use ahash::AHashSet as HashSet;
use anyhow::Result;
use herakles_procstat::{Host, ProcessError, ProcessTable};
use serde::Serialize;
use tracing::debug;

use crate::commands::{host_for, render};
use crate::config::Config;

#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub pid: u32,
    pub name: String,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Number of nodes in this subtree, itself included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }
}

/// Builds the tree under `root` from one scan of the host.
pub fn build_tree(host: &Host, root: u32) -> Result<TreeNode> {
    let table = ProcessTable::scan(host)?;
    debug!("Scanned {} processes", table.len());
    tree_from_table(&table, root)
}

pub fn tree_from_table(table: &ProcessTable, root: u32) -> Result<TreeNode> {
    let snapshot = table
        .get(root)
        .ok_or(ProcessError::NoSuchProcess { pid: root })?;
    let mut seen = HashSet::new();
    seen.insert(root);
    Ok(node(table, root, snapshot.name.clone(), &mut seen))
}

fn node(table: &ProcessTable, pid: u32, name: String, seen: &mut HashSet<u32>) -> TreeNode {
    let mut children = Vec::new();
    for child in table.children(pid) {
        // A pid can only appear once even if the parent links loop.
        if !seen.insert(child) {
            continue;
        }
        let child_name = table.get(child).map(|s| s.name.clone()).unwrap_or_default();
        children.push(node(table, child, child_name, seen));
    }
    TreeNode {
        pid,
        name,
        children,
    }
}

fn render_text(root: &TreeNode) -> String {
    let mut out = format!("{} {}\n", root.pid, root.name);
    draw_children(&root.children, "", &mut out);
    out
}

fn draw_children(children: &[TreeNode], prefix: &str, out: &mut String) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let (branch, indent) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        out.push_str(&format!("{prefix}{branch}{} {}\n", child.pid, child.name));
        draw_children(&child.children, &format!("{prefix}{indent}"), out);
    }
}

/// Prints the descendant tree of `pid`.
pub fn command_tree(pid: u32, config: &Config) -> Result<()> {
    let host = host_for(config)?;
    let tree = build_tree(&host, pid)?;
    print!("{}", render(&tree, config.output_format(), render_text)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_procstat::parse_stat;

    fn table(links: &[(u32, u32)]) -> ProcessTable {
        ProcessTable::from_snapshots(links.iter().map(|&(pid, ppid)| {
            parse_stat(&format!(
                "{pid} (p{pid}) S {ppid} {pid} {pid} 0 -1 0 0 0 0 0 0 0 0 0 20 0 1 0 100 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0"
            ))
            .unwrap()
        }))
    }

    // -------------------------------------------------------------------------
    // Tests for tree_from_table
    // -------------------------------------------------------------------------

    #[test]
    fn test_tree_shape_and_text() {
        let t = table(&[(1, 0), (10, 1), (11, 10), (12, 10), (20, 1)]);
        let tree = tree_from_table(&t, 1).unwrap();
        assert_eq!(tree.size(), 5);
        assert_eq!(tree.children.len(), 2);

        let text = render_text(&tree);
        let expected = "\
1 p1
├── 10 p10
│   ├── 11 p11
│   └── 12 p12
└── 20 p20
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_tree_unknown_root() {
        let t = table(&[(1, 0)]);
        let err = tree_from_table(&t, 5).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProcessError>(),
            Some(ProcessError::NoSuchProcess { pid: 5 })
        ));
    }

    #[test]
    fn test_tree_survives_parent_loop() {
        let t = table(&[(5, 6), (6, 5)]);
        let tree = tree_from_table(&t, 5).unwrap();
        assert_eq!(tree.size(), 2);
    }
}
