//! Configuration management for herakles-procstat.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::{Args, ConfigFormat, LogLevel, OutputFormat};

// Default configuration constants
pub const DEFAULT_PROC_ROOT: &str = "/proc";
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 500;
pub const DEFAULT_TOP_N: usize = 10;

/// Locations tried, in order, when no config file is given.
const DEFAULT_CONFIG_PATHS: [&str; 8] = [
    "/etc/herakles/procstat.yaml",
    "/etc/herakles/procstat.yml",
    "/etc/herakles/procstat.json",
    "/etc/herakles/procstat.toml",
    "./herakles-procstat.yaml",
    "./herakles-procstat.yml",
    "./herakles-procstat.json",
    "./herakles-procstat.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// procfs mount to read from
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,

    // Sampling
    #[serde(alias = "sample-interval-ms")]
    pub sample_interval_ms: Option<u64>,
    #[serde(alias = "top-n")]
    pub top_n: Option<usize>,
    /// Scan threads (None or 0 = one per core)
    pub parallelism: Option<usize>,

    // Filtering
    #[serde(alias = "include-names")]
    pub include_names: Option<Vec<String>>,
    #[serde(alias = "exclude-names")]
    pub exclude_names: Option<Vec<String>>,
    #[serde(alias = "name-pattern")]
    pub name_pattern: Option<String>,

    // Output
    #[serde(alias = "log-level")]
    pub log_level: Option<LogLevel>,
    #[serde(alias = "output-format")]
    pub output_format: Option<OutputFormat>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            sample_interval_ms: Some(DEFAULT_SAMPLE_INTERVAL_MS),
            top_n: Some(DEFAULT_TOP_N),
            parallelism: None,
            include_names: None,
            exclude_names: None,
            name_pattern: None,
            log_level: Some(LogLevel::Info),
            output_format: Some(OutputFormat::Text),
        }
    }
}

impl Config {
    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }

    pub fn sample_interval_ms(&self) -> u64 {
        self.sample_interval_ms.unwrap_or(DEFAULT_SAMPLE_INTERVAL_MS)
    }

    pub fn top_n(&self) -> usize {
        self.top_n.unwrap_or(DEFAULT_TOP_N)
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level.unwrap_or(LogLevel::Info)
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format.unwrap_or(OutputFormat::Text)
    }

    /// Compiled name filter built from the include/exclude lists and pattern.
    pub fn name_filter(&self) -> Result<NameFilter> {
        let pattern = match self.name_pattern.as_deref() {
            Some(p) => Some(Regex::new(p).with_context(|| format!("invalid name_pattern '{p}'"))?),
            None => None,
        };
        Ok(NameFilter {
            include: self.include_names.clone().unwrap_or_default(),
            exclude: self.exclude_names.clone().unwrap_or_default(),
            pattern,
        })
    }
}

/// Decides which process names a listing keeps.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    include: Vec<String>,
    exclude: Vec<String>,
    pattern: Option<Regex>,
}

impl NameFilter {
    /// Include entries match as substrings; exclude wins over include.
    pub fn matches(&self, name: &str) -> bool {
        if self.exclude.iter().any(|e| name.contains(e.as_str())) {
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|i| name.contains(i.as_str())) {
            return false;
        }
        self.pattern.as_ref().map_or(true, |re| re.is_match(name))
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<()> {
    if cfg.top_n() == 0 {
        bail!("top_n must be at least 1");
    }

    if let Some(pattern) = cfg.name_pattern.as_deref() {
        if let Err(e) = Regex::new(pattern) {
            bail!("Invalid name_pattern '{}': {}", pattern, e);
        }
    }

    let root = cfg.proc_root();
    if !root.is_dir() {
        bail!("proc_root does not exist or is not a directory: {}", root.display());
    }

    Ok(())
}

fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level);
    }
    if let Some(threads) = args.parallelism {
        config.parallelism = Some(threads);
    }
    if let Some(format) = args.format {
        config.output_format = Some(format);
    }

    // Parse comma-separated include/exclude names
    if let Some(include_str) = &args.include_names {
        config.include_names = Some(split_names(include_str));
    }
    if let Some(exclude_str) = &args.exclude_names {
        config.exclude_names = Some(split_names(exclude_str));
    }
    if let Some(pattern) = &args.name_pattern {
        config.name_pattern = Some(pattern.clone());
    }

    Ok(config)
}

fn first_existing(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Loads a config file, or the first default location that exists.
///
/// Missing fields keep their defaults. No file at all yields `Config::default()`.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match first_existing(&DEFAULT_CONFIG_PATHS) {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let config: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config = serde_json::from_str(&content)
                .with_context(|| format!("invalid JSON in {}", path.display()))?;
            info!("Loaded JSON configuration from: {}", path.display());
            config
        }
        Some("toml") => {
            let config = toml::from_str(&content)
                .with_context(|| format!("invalid TOML in {}", path.display()))?;
            info!("Loaded TOML configuration from: {}", path.display());
            config
        }
        _ => {
            // Default to YAML
            let config = serde_yaml::from_str(&content)
                .with_context(|| format!("invalid YAML in {}", path.display()))?;
            info!("Loaded YAML configuration from: {}", path.display());
            config
        }
    };

    Ok(merge_defaults(config))
}

/// Fills fields the file left out with the defaults.
fn merge_defaults(file: Config) -> Config {
    let d = Config::default();
    Config {
        proc_root: file.proc_root.or(d.proc_root),
        sample_interval_ms: file.sample_interval_ms.or(d.sample_interval_ms),
        top_n: file.top_n.or(d.top_n),
        parallelism: file.parallelism.or(d.parallelism),
        include_names: file.include_names.or(d.include_names),
        exclude_names: file.exclude_names.or(d.exclude_names),
        name_pattern: file.name_pattern.or(d.name_pattern),
        log_level: file.log_level.or(d.log_level),
        output_format: file.output_format.or(d.output_format),
    }
}

pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<()> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::tempdir;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["herakles-procstat"];
        full.extend_from_slice(argv);
        Args::parse_from(full)
    }

    // -------------------------------------------------------------------------
    // Tests for load_config
    // -------------------------------------------------------------------------

    #[test]
    fn test_load_yaml_with_partial_fields() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("procstat.yaml");
        fs::write(&path, "top_n: 3\nname-pattern: \"^ssh\"\nlog_level: debug\n").unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.top_n(), 3);
        assert_eq!(cfg.name_pattern.as_deref(), Some("^ssh"));
        assert_eq!(cfg.log_level(), LogLevel::Debug);
        assert_eq!(cfg.sample_interval_ms(), DEFAULT_SAMPLE_INTERVAL_MS);
        assert_eq!(cfg.proc_root(), PathBuf::from("/proc"));
    }

    #[test]
    fn test_default_locations_cover_every_format() {
        for dir in ["/etc/herakles/procstat", "./herakles-procstat"] {
            for ext in ["yaml", "yml", "json", "toml"] {
                let path = format!("{dir}.{ext}");
                assert!(DEFAULT_CONFIG_PATHS.contains(&path.as_str()), "{path}");
            }
        }
    }

    #[test]
    fn test_first_existing_toml_is_loaded_as_toml() {
        let dir = tempdir().expect("Failed to create temp dir");
        let yaml = dir.path().join("missing.yaml");
        let toml_path = dir.path().join("procstat.toml");
        fs::write(&toml_path, "top_n = 4\nproc_root = \"/proc\"\n").unwrap();

        let yaml_s = yaml.to_string_lossy().into_owned();
        let toml_s = toml_path.to_string_lossy().into_owned();
        let found = first_existing(&[yaml_s.as_str(), toml_s.as_str()]).unwrap();
        assert_eq!(found, toml_path);
        assert_eq!(load_config(Some(&found)).unwrap().top_n(), 4);
    }

    #[test]
    fn test_load_json_and_toml() {
        let dir = tempdir().expect("Failed to create temp dir");
        let json = dir.path().join("c.json");
        fs::write(&json, r#"{"sample_interval_ms": 250, "output_format": "json"}"#).unwrap();
        let cfg = load_config(Some(&json)).unwrap();
        assert_eq!(cfg.sample_interval_ms(), 250);
        assert_eq!(cfg.output_format(), OutputFormat::Json);

        let toml_path = dir.path().join("c.toml");
        fs::write(&toml_path, "top_n = 7\nexclude_names = [\"kworker\"]\n").unwrap();
        let cfg = load_config(Some(&toml_path)).unwrap();
        assert_eq!(cfg.top_n(), 7);
        assert_eq!(cfg.exclude_names, Some(vec!["kworker".to_string()]));
    }

    #[test]
    fn test_load_invalid_file_errors() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load_config(Some(&path)).is_err());
        assert!(load_config(Some(&dir.path().join("missing.yaml"))).is_err());
    }

    // -------------------------------------------------------------------------
    // Tests for resolve_config / validation
    // -------------------------------------------------------------------------

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("procstat.yaml");
        fs::write(&path, "top_n: 3\ninclude_names: [bash]\n").unwrap();
        let path_str = path.to_str().unwrap();

        let cfg = resolve_config(&args(&[
            "-c",
            path_str,
            "--include-names",
            "sshd, nginx,",
            "--proc-root",
            "/tmp",
            "--log-level",
            "warn",
        ]))
        .unwrap();
        assert_eq!(cfg.top_n(), 3);
        assert_eq!(
            cfg.include_names,
            Some(vec!["sshd".to_string(), "nginx".to_string()])
        );
        assert_eq!(cfg.proc_root(), PathBuf::from("/tmp"));
        assert_eq!(cfg.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_no_config_uses_defaults() {
        let cfg = resolve_config(&args(&["--no-config"])).unwrap();
        assert_eq!(cfg.top_n(), DEFAULT_TOP_N);
        assert_eq!(cfg.output_format(), OutputFormat::Text);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let dir = tempdir().expect("Failed to create temp dir");
        let ok = Config {
            proc_root: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        assert!(validate_effective_config(&ok).is_ok());

        let zero = Config {
            top_n: Some(0),
            ..ok.clone()
        };
        assert!(validate_effective_config(&zero).is_err());

        let bad_regex = Config {
            name_pattern: Some("(".into()),
            ..ok.clone()
        };
        assert!(validate_effective_config(&bad_regex).is_err());

        let missing_root = Config {
            proc_root: Some(dir.path().join("nope")),
            ..ok
        };
        assert!(validate_effective_config(&missing_root).is_err());
    }

    #[test]
    fn test_render_config_formats() {
        let cfg = Config::default();
        for format in [ConfigFormat::Yaml, ConfigFormat::Json, ConfigFormat::Toml] {
            let out = render_config(&cfg, format).unwrap();
            assert!(out.contains("top_n"), "{format:?}: {out}");
        }
    }

    // -------------------------------------------------------------------------
    // Tests for NameFilter
    // -------------------------------------------------------------------------

    #[test]
    fn test_name_filter() {
        let cfg = Config {
            include_names: Some(vec!["ssh".into(), "nginx".into()]),
            exclude_names: Some(vec!["sshd-session".into()]),
            ..Config::default()
        };
        let f = cfg.name_filter().unwrap();
        assert!(f.matches("sshd"));
        assert!(f.matches("nginx"));
        assert!(!f.matches("sshd-session"));
        assert!(!f.matches("bash"));

        let cfg = Config {
            name_pattern: Some("^kworker/".into()),
            ..Config::default()
        };
        let f = cfg.name_filter().unwrap();
        assert!(f.matches("kworker/0:1"));
        assert!(!f.matches("bash"));

        assert!(NameFilter::default().matches("anything"));
    }
}
