//! Config command implementation.
//!
//! Generates configuration files in various formats.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(output: Option<PathBuf>, format: ConfigFormat, commented: bool) -> Result<()> {
    let output = output.unwrap_or_else(|| PathBuf::from("herakles-procstat.yaml"));
    let content = config_content(format, commented)?;

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)
            .with_context(|| format!("failed to write {}", output.display()))?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

fn config_content(format: ConfigFormat, commented: bool) -> Result<String> {
    let content = render_config(&Config::default(), format)?;
    Ok(match format {
        ConfigFormat::Yaml if commented => add_config_comments(content),
        _ => content,
    })
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Procstat Configuration
# ===============================
#
# Host
# ----
# proc_root: "/proc"           # procfs mount (fixture trees: see generate-fixture)
#
# Sampling
# --------
# sample_interval_ms: 500      # CPU sampling interval for show/top
# top_n: 10                    # Processes listed by top
# parallelism: null            # Scan threads (null = auto)
#
# Filtering (top)
# ---------------
# include_names: null          # Keep only names containing one of these
# exclude_names: null          # Drop names containing one of these
# name_pattern: null           # Keep only names matching this regex
#
# Output
# ------
# log_level: "info"            # off, error, warn, info, debug, trace
# output_format: "text"        # text, yaml, json, toml
"#;

    format!("{comments}\n{yaml}")
}
