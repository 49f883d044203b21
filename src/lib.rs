//! Munin plugin for the Linux open file table
//!
//! This library reads `/proc/sys/fs/file-nr` and renders the Munin plugin
//! protocol for it. The binary is a thin wrapper that picks the mode from the
//! first argument, so everything here can be used and tested without a
//! process.
//!
//! # Modes
//!
//! - `config`: graph definition plus `used.warning`/`used.critical` levels at
//!   92% and 98% of the maximum number of file handles
//! - `autoconf`: `yes` if the counter file is readable, `no <reason>` otherwise
//! - anything else: `used.value` and `max.value`
//!
//! # Usage
//!
//! ```rust,no_run
//! use munin_open_files::{FileTableReporter, Mode, ThresholdRatios};
//!
//! let reporter = FileTableReporter::new(
//!     "/proc/sys/fs/file-nr",
//!     ThresholdRatios::default(),
//!     false,
//! );
//!
//! let output = reporter.render(Mode::Fetch).expect("counter file readable");
//! print!("{}", String::from_utf8_lossy(&output));
//! ```

pub mod cli;
pub mod config;
pub mod counters;
pub mod plugin;
pub mod thresholds;

// Re-export main types for convenience
pub use config::{Config, ConfigError};
pub use counters::{CounterError, FileNr, DEFAULT_COUNTER_FILE};
pub use plugin::{Capability, FileTableReporter, Mode, ReportError};
pub use thresholds::{ThresholdRatios, Thresholds};
