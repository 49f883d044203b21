//! munin-open-files
//!
//! Munin plugin reporting Linux open file table usage. Munin calls it with
//! `config`, `autoconf`, or no argument; diagnostics and logs go to stderr so
//! that munin-node only ever sees protocol lines on stdout.

use std::io;
use std::process;

use clap::Parser;
use tracing::{debug, level_filters::LevelFilter, warn};

use munin_open_files::cli::Args;
use munin_open_files::config::{
    fallback_config, resolve_config, show_config, validate_effective_config, Config,
};
use munin_open_files::{ConfigError, FileTableReporter, Mode};

/// Initializes tracing logging on stderr with the configured log level.
fn setup_logging(config: &Config) {
    let level: LevelFilter = config.log_level().into();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("open_files: failed to set tracing subscriber: {}", e);
    }
}

fn resolve_validated_config(args: &Args) -> Result<Config, ConfigError> {
    let config = resolve_config(args)?;
    validate_effective_config(&config)?;
    Ok(config)
}

/// Resolves and validates configuration.
///
/// `autoconf` must answer even with a broken config file, so it falls back to
/// defaults plus CLI options and hands the error back for logging. Every
/// other run exits with error code 1.
fn load_validated_config(args: &Args, mode: Mode) -> (Config, Option<ConfigError>) {
    let operator_run = args.check_config || args.show_config;

    match resolve_validated_config(args) {
        Ok(config) => (config, None),
        Err(e) if mode == Mode::Autoconf && !operator_run => (fallback_config(args), Some(e)),
        Err(e) => {
            eprintln!("open_files: configuration invalid: {}", e);
            process::exit(1);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mode = Mode::from_arg(args.mode.as_deref());
    let (config, config_error) = load_validated_config(&args, mode);

    if args.check_config {
        println!("✅ Configuration is valid");
        return Ok(());
    }

    if args.show_config {
        return show_config(&config, args.config_format.clone());
    }

    setup_logging(&config);

    if let Some(e) = config_error {
        warn!("Ignoring configuration for autoconf: {}", e);
    }
    debug!("Effective configuration: {:?}", config);

    let reporter = FileTableReporter::from_config(&config);
    debug!(
        "Running {:?} against {}",
        mode,
        reporter.counter_file().display()
    );

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = reporter.run(mode, &mut handle) {
        eprintln!("{}", e);
        process::exit(1);
    }

    Ok(())
}
