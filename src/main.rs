//! herakles-procstat - version 0.1.0
//!
//! Process inspection CLI with tracing logging.
//! This is the main entry point that resolves configuration and dispatches subcommands.

mod cli;
mod commands;
mod config;
mod startup_checks;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, Level};

use cli::{Args, Commands, LogLevel};
use commands::{
    command_ancestors, command_check, command_config, command_generate_fixture, command_show,
    command_top, command_tree,
};
use config::{resolve_config, show_config, validate_effective_config, Config};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(level: LogLevel) {
    let log_level = match level {
        LogLevel::Off => return,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    debug!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
fn main() -> Result<()> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    let Some(command) = &args.command else {
        eprintln!("No command given. See --help.");
        std::process::exit(2);
    };

    // Config and GenerateFixture commands don't need config validation
    match command {
        Commands::Config {
            output,
            format,
            commented,
        } => return command_config(output.clone(), *format, *commented),
        Commands::GenerateFixture {
            output,
            count,
            seed,
        } => {
            setup_logging(args.log_level.unwrap_or(LogLevel::Info));
            return command_generate_fixture(output.clone(), *count, *seed);
        }
        _ => {
            // Other commands read processes and need a valid config
        }
    }

    let config = load_validated_config(&args)?;
    setup_logging(config.log_level());
    info!("Reading processes from {}", config.proc_root().display());

    // Configure parallel processing
    if let Some(threads) = config.parallelism.filter(|&n| n > 0) {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            debug!("Failed to set rayon thread pool: {}", e);
        }
        debug!("Rayon thread pool configured with {} threads", threads);
    }

    match command {
        Commands::Show { pid, interval_ms } => command_show(*pid, *interval_ms, &config),
        Commands::Tree { pid } => command_tree(*pid, &config),
        Commands::Ancestors { pid } => command_ancestors(*pid, &config),
        Commands::Top { interval_ms, n } => command_top(*interval_ms, *n, &config),
        Commands::Check => command_check(&config),
        Commands::Config { .. } => unreachable!("Config handled above"),
        Commands::GenerateFixture { .. } => unreachable!("GenerateFixture handled above"),
    }
}
