//! CLI arguments and subcommands for herakles-procstat.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Report format for process output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-procstat",
    about = "Inspect Linux processes: stat records, CPU usage and process trees",
    long_about = "Inspect Linux processes: stat records, CPU usage and process trees.\n\n\
                  Reads the kernel's per-process stat record, follows a process across \
                  calls without confusing it with a later process that reuses its pid, \
                  samples CPU usage and walks parent/child relationships.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-procstat | More info: https://www.herakles.now | Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides config)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Read processes from this procfs root instead of /proc
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Parallel scan threads (0 = auto)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Report format (overrides config)
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Include only processes matching these names (comma-separated)
    #[arg(long)]
    pub include_names: Option<String>,

    /// Exclude processes matching these names (comma-separated)
    #[arg(long)]
    pub exclude_names: Option<String>,

    /// Include only processes whose name matches this regex
    #[arg(long)]
    pub name_pattern: Option<String>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show identity, state, times and CPU usage of one process
    Show {
        /// Process id
        pid: u32,

        /// CPU sampling interval in milliseconds (default from config)
        #[arg(short = 'i', long)]
        interval_ms: Option<u64>,
    },

    /// Print the descendant tree of a process
    Tree {
        /// Root process id (default: 1)
        #[arg(default_value_t = 1)]
        pid: u32,
    },

    /// Print the ancestor chain of a process
    Ancestors {
        /// Process id
        pid: u32,
    },

    /// Sample all processes and list the busiest
    Top {
        /// CPU sampling interval in milliseconds (default from config)
        #[arg(short = 'i', long)]
        interval_ms: Option<u64>,

        /// Number of processes to list (default from config)
        #[arg(short = 'n', long)]
        n: Option<usize>,
    },

    /// Validate procfs access, privileges and configuration
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Generate a synthetic procfs tree for offline testing
    GenerateFixture {
        /// Output directory (use with --proc-root)
        #[arg(short = 'o', long, default_value = "procfs-fixture")]
        output: PathBuf,

        /// Number of processes to generate
        #[arg(long, default_value_t = 24)]
        count: usize,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
}
