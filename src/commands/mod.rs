//! CLI command implementations for herakles-procstat.
//!
//! This module provides implementations for all CLI subcommands:
//! - `show`: One process in detail
//! - `tree`: Descendant tree
//! - `ancestors`: Ancestor chain
//! - `top`: Busiest processes over a sampling interval
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `generate`: Synthetic procfs fixture generation

pub mod ancestors;
pub mod check;
pub mod config;
pub mod generate;
pub mod show;
pub mod top;
pub mod tree;

// Re-export command functions
pub use ancestors::command_ancestors;
pub use check::command_check;
pub use config::command_config;
pub use generate::command_generate_fixture;
pub use show::command_show;
pub use top::command_top;
pub use tree::command_tree;

use anyhow::Result;
use herakles_procstat::Host;
use serde::Serialize;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::config::Config;

/// Host for the configured procfs root.
pub(crate) fn host_for(config: &Config) -> Result<Host> {
    let root = config.proc_root();
    if root == Path::new("/proc") {
        Ok(Host::detect()?)
    } else {
        Ok(Host::with_proc_root(root))
    }
}

/// Serializes `report` in the structured formats, or renders it with `text`.
pub(crate) fn render<T, F>(report: &T, format: OutputFormat, text: F) -> Result<String>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    Ok(match format {
        OutputFormat::Text => text(report),
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
        OutputFormat::Toml => toml::to_string_pretty(report)?,
    })
}
