//! Munin plugin protocol for the open file table.
//!
//! Munin runs the plugin with `config` to learn about the graph, with
//! `autoconf` to ask whether the plugin can run on this host, and without an
//! argument to fetch values. Each mode is rendered by a plain function into a
//! writer so that the protocol text can be checked without a process.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nix::unistd::{access, AccessFlags};
use tracing::{debug, info};

use crate::config::Config;
use crate::counters::{
    read_file_nr, read_max, CounterError, FileNr, DEFAULT_COUNTER_FILE,
};
use crate::thresholds::{ThresholdRatios, Thresholds};

/// Invocation mode, selected once from the first argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Config,
    Autoconf,
    Fetch,
}

impl Mode {
    /// Maps the first argument to a mode; anything unrecognised fetches.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some("config") => Mode::Config,
            Some("autoconf") => Mode::Autoconf,
            _ => Mode::Fetch,
        }
    }
}

/// Result of the autoconf probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Capable,
    Incapable(String),
}

/// Checks read access to the counter file without opening it.
pub fn probe(path: &Path) -> Capability {
    match access(path, AccessFlags::R_OK) {
        Ok(()) => Capability::Capable,
        Err(errno) => {
            debug!("access({}, R_OK) failed: {}", path.display(), errno);
            Capability::Incapable(format!("{} not readable", path.display()))
        }
    }
}

/// Tells Munin the plugin can be enabled here.
pub fn write_yes<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "yes")
}

/// Tells Munin the plugin cannot be enabled here, and why.
pub fn write_no<W: Write>(out: &mut W, reason: &str) -> io::Result<()> {
    writeln!(out, "no {}", reason)
}

/// Writes the autoconf answer for a probe result.
pub fn write_autoconf<W: Write>(out: &mut W, capability: &Capability) -> io::Result<()> {
    match capability {
        Capability::Capable => write_yes(out),
        Capability::Incapable(reason) => write_no(out, reason),
    }
}

/// Writes the graph definition followed by the alert levels for `max`.
pub fn write_config<W: Write>(out: &mut W, max: u64, ratios: &ThresholdRatios) -> io::Result<()> {
    let thresholds = Thresholds::from_max(max, ratios);

    writeln!(out, "graph_title File table usage")?;
    writeln!(out, "graph_args --base 1000 -l 0")?;
    writeln!(out, "graph_vlabel number of open files")?;
    writeln!(out, "graph_category system")?;
    writeln!(out, "graph_info This graph monitors the Linux open files table.")?;
    writeln!(out, "used.label open files")?;
    writeln!(out, "used.info The number of currently open files.")?;
    writeln!(out, "max.label max open files")?;
    writeln!(
        out,
        "max.info The maximum supported number of open files. Tune by modifying {}.",
        DEFAULT_COUNTER_FILE
    )?;
    writeln!(out, "used.warning {}", thresholds.warning)?;
    writeln!(out, "used.critical {}", thresholds.critical)?;
    Ok(())
}

/// Writes the current values.
pub fn write_fetch<W: Write>(out: &mut W, counters: &FileNr) -> io::Result<()> {
    writeln!(out, "used.value {}", counters.used())?;
    writeln!(out, "max.value {}", counters.max)?;
    Ok(())
}

/// Errors that end a `config` or fetch run with a non-zero exit status.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Counter(#[from] CounterError),

    #[error("failed to write plugin output: {0}")]
    Output(#[from] io::Error),
}

/// Reads the counter file and renders the report for one mode.
#[derive(Debug, Clone)]
pub struct FileTableReporter {
    counter_file: PathBuf,
    ratios: ThresholdRatios,
    dirtyconfig: bool,
}

impl FileTableReporter {
    pub fn new(counter_file: impl Into<PathBuf>, ratios: ThresholdRatios, dirtyconfig: bool) -> Self {
        Self {
            counter_file: counter_file.into(),
            ratios,
            dirtyconfig,
        }
    }

    /// Builds a reporter from the effective configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.counter_file(), config.ratios(), config.dirtyconfig())
    }

    pub fn counter_file(&self) -> &Path {
        &self.counter_file
    }

    /// Renders the complete output for `mode`.
    ///
    /// Nothing is returned unless the counter file was read and parsed, so a
    /// failure never produces partial protocol output.
    pub fn render(&self, mode: Mode) -> Result<Vec<u8>, ReportError> {
        let mut buf = Vec::new();

        match mode {
            Mode::Autoconf => {
                let capability = probe(&self.counter_file);
                info!("autoconf: {:?}", capability);
                write_autoconf(&mut buf, &capability)?;
            }
            Mode::Config if self.dirtyconfig => {
                // Values follow the config block, so all three fields are needed
                let counters = read_file_nr(&self.counter_file)?;
                debug!("dirtyconfig enabled, counters: {:?}", counters);
                write_config(&mut buf, counters.max, &self.ratios)?;
                write_fetch(&mut buf, &counters)?;
            }
            Mode::Config => {
                let max = read_max(&self.counter_file)?;
                debug!("max file handles: {}", max);
                write_config(&mut buf, max, &self.ratios)?;
            }
            Mode::Fetch => {
                let counters = read_file_nr(&self.counter_file)?;
                debug!("counters: {:?}", counters);
                write_fetch(&mut buf, &counters)?;
            }
        }

        Ok(buf)
    }

    /// Renders `mode` and writes it to `out` in one go.
    pub fn run<W: Write>(&self, mode: Mode, out: &mut W) -> Result<(), ReportError> {
        let report = self.render(mode)?;
        out.write_all(&report)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn render_to_string<F>(render: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        render(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_mode_from_arg() {
        assert_eq!(Mode::from_arg(Some("config")), Mode::Config);
        assert_eq!(Mode::from_arg(Some("autoconf")), Mode::Autoconf);
        assert_eq!(Mode::from_arg(None), Mode::Fetch);
        assert_eq!(Mode::from_arg(Some("fetch")), Mode::Fetch);
        assert_eq!(Mode::from_arg(Some("CONFIG")), Mode::Fetch);
        assert_eq!(Mode::from_arg(Some("")), Mode::Fetch);
    }

    #[test]
    fn test_write_config() {
        let output =
            render_to_string(|buf| write_config(buf, 1000, &ThresholdRatios::default()));
        let expected = "graph_title File table usage\n\
                        graph_args --base 1000 -l 0\n\
                        graph_vlabel number of open files\n\
                        graph_category system\n\
                        graph_info This graph monitors the Linux open files table.\n\
                        used.label open files\n\
                        used.info The number of currently open files.\n\
                        max.label max open files\n\
                        max.info The maximum supported number of open files. Tune by modifying /proc/sys/fs/file-nr.\n\
                        used.warning 920\n\
                        used.critical 980\n";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_write_config_small_max() {
        let output = render_to_string(|buf| write_config(buf, 1, &ThresholdRatios::default()));
        assert!(output.ends_with("used.warning 0\nused.critical 0\n"));
    }

    #[test]
    fn test_write_fetch() {
        let counters = FileNr {
            allocated: 3264,
            free: 64,
            max: 9_000_000,
        };
        let output = render_to_string(|buf| write_fetch(buf, &counters));
        assert_eq!(output, "used.value 3200\nmax.value 9000000\n");
    }

    #[test]
    fn test_write_autoconf() {
        let yes = render_to_string(|buf| write_autoconf(buf, &Capability::Capable));
        assert_eq!(yes, "yes\n");

        let no = render_to_string(|buf| {
            write_autoconf(
                buf,
                &Capability::Incapable("/proc/sys/fs/file-nr not readable".to_string()),
            )
        });
        assert_eq!(no, "no /proc/sys/fs/file-nr not readable\n");
    }

    #[test]
    fn test_probe() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("file-nr");

        let missing = probe(&path);
        assert_eq!(
            missing,
            Capability::Incapable(format!("{} not readable", path.display()))
        );

        std::fs::write(&path, "1 0 2\n").expect("Failed to write file-nr");
        assert_eq!(probe(&path), Capability::Capable);
    }

    #[test]
    fn test_render_modes() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("file-nr");
        std::fs::write(&path, "120 880 1000\n").expect("Failed to write file-nr");

        let reporter = FileTableReporter::new(&path, ThresholdRatios::default(), false);

        let fetch = String::from_utf8(reporter.render(Mode::Fetch).unwrap()).unwrap();
        assert_eq!(fetch, "used.value 120\nmax.value 1000\n");

        let config = String::from_utf8(reporter.render(Mode::Config).unwrap()).unwrap();
        assert!(config.starts_with("graph_title File table usage\n"));
        assert!(config.ends_with("used.warning 920\nused.critical 980\n"));

        let autoconf = String::from_utf8(reporter.render(Mode::Autoconf).unwrap()).unwrap();
        assert_eq!(autoconf, "yes\n");
    }

    #[test]
    fn test_render_config_with_dirtyconfig() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("file-nr");
        std::fs::write(&path, "2048 0 100000\n").expect("Failed to write file-nr");

        let reporter = FileTableReporter::new(&path, ThresholdRatios::default(), true);
        let config = String::from_utf8(reporter.render(Mode::Config).unwrap()).unwrap();
        assert!(config.ends_with(
            "used.warning 92000\nused.critical 98000\nused.value 2048\nmax.value 100000\n"
        ));
    }

    #[test]
    fn test_render_missing_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("file-nr");
        let reporter = FileTableReporter::new(&path, ThresholdRatios::default(), false);

        assert!(matches!(
            reporter.render(Mode::Fetch),
            Err(ReportError::Counter(CounterError::Unavailable { .. }))
        ));
        assert!(matches!(
            reporter.render(Mode::Config),
            Err(ReportError::Counter(CounterError::Unavailable { .. }))
        ));

        let autoconf = String::from_utf8(reporter.render(Mode::Autoconf).unwrap()).unwrap();
        assert_eq!(autoconf, format!("no {} not readable\n", path.display()));
    }

    #[test]
    fn test_run_writes_nothing_on_failure() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("file-nr");
        std::fs::write(&path, "120 880").expect("Failed to write file-nr");

        let reporter = FileTableReporter::new(&path, ThresholdRatios::default(), false);
        let mut out = Vec::new();
        assert!(reporter.run(Mode::Fetch, &mut out).is_err());
        assert!(reporter.run(Mode::Config, &mut out).is_err());
        assert!(out.is_empty());
    }
}
