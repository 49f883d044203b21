//! CLI arguments for munin-open-files.
//!
//! Munin only ever passes the plugin mode as the first argument. The options
//! are meant for operators and tests.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "munin-open-files",
    about = "Munin plugin graphing Linux open file table usage",
    long_about = "Munin plugin graphing Linux open file table usage.\n\n\
                  Reads /proc/sys/fs/file-nr and prints the Munin plugin protocol. \
                  Run with `config` for the graph definition, `autoconf` to check \
                  whether the plugin can run here, or without an argument for values.",
    version
)]
pub struct Args {
    /// Plugin mode: config, autoconf, or anything else to fetch values
    #[arg(allow_hyphen_values = true)]
    pub mode: Option<String>,

    /// Further arguments are accepted and ignored
    #[arg(hide = true, allow_hyphen_values = true, trailing_var_arg = true)]
    pub rest: Vec<String>,

    /// Read counters from this file instead of /proc/sys/fs/file-nr
    #[arg(long)]
    pub counter_file: Option<PathBuf>,

    /// Log level (logs go to stderr)
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
}
