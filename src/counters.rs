//! Open file table counters from /proc/sys/fs/file-nr.
//!
//! The kernel exposes three whitespace-separated integers in this file:
//! allocated file handles, free file handles and the maximum number of
//! file handles. The file is re-read on every invocation, nothing is cached.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Kernel location of the open file table counters.
pub const DEFAULT_COUNTER_FILE: &str = "/proc/sys/fs/file-nr";

/// Number of integer fields the counter file carries.
const FIELD_COUNT: usize = 3;

/// Snapshot of the three open file table counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileNr {
    pub allocated: u64,
    pub free: u64,
    pub max: u64,
}

impl FileNr {
    /// Number of file handles currently in use.
    ///
    /// Kernels since 2.6 always report 0 free handles. A sample claiming more
    /// free than allocated handles is inconsistent, so the free count is
    /// ignored for it and the value never goes negative.
    pub fn used(&self) -> u64 {
        // "120 880 1000" reports 120 used, see test_used_never_negative
        self.allocated.checked_sub(self.free).unwrap_or(self.allocated)
    }
}

/// Errors raised while reading the counter file.
#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    /// The file could not be opened (missing /proc, permissions, old kernel).
    #[error("cannot open {}: {}", .path.display(), .source)]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file was opened but did not hold the expected integer fields.
    #[error("cannot read from {}: {}", .path.display(), .reason)]
    Malformed { path: PathBuf, reason: String },
}

/// Parses all three counters.
///
/// Format: "<allocated> <free> <max>"
pub fn parse_file_nr(content: &str) -> Result<FileNr, String> {
    let [allocated, free, max] = parse_fields(content)?;
    Ok(FileNr {
        allocated,
        free,
        max,
    })
}

/// Parses only the maximum, the third field.
///
/// The leading two fields still have to be integers, they are skipped
/// rather than ignored.
pub fn parse_max(content: &str) -> Result<u64, String> {
    let [_, _, max] = parse_fields(content)?;
    Ok(max)
}

fn parse_fields(content: &str) -> Result<[u64; FIELD_COUNT], String> {
    const NAMES: [&str; FIELD_COUNT] = ["allocated", "free", "max"];

    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < FIELD_COUNT {
        return Err(format!(
            "expected {} fields, got {}",
            FIELD_COUNT,
            parts.len()
        ));
    }
    if parts.len() > FIELD_COUNT {
        trace!("Ignoring {} trailing fields", parts.len() - FIELD_COUNT);
    }

    let mut fields = [0u64; FIELD_COUNT];
    for (idx, name) in NAMES.iter().enumerate() {
        fields[idx] = parts[idx]
            .parse::<u64>()
            .map_err(|e| format!("failed to parse {} handles '{}': {}", name, parts[idx], e))?;
    }

    Ok(fields)
}

/// Reads the whole counter file.
///
/// The handle lives only inside this function, it is closed on every return
/// path before the caller gets to parse or print anything.
fn read_counter_file(path: &Path) -> Result<String, CounterError> {
    let mut file = File::open(path).map_err(|source| CounterError::Unavailable {
        path: path.to_path_buf(),
        source,
    })?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| CounterError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    debug!("Read {} bytes from {}", content.len(), path.display());
    Ok(content)
}

/// Reads allocated, free and max handles from the counter file.
pub fn read_file_nr(path: &Path) -> Result<FileNr, CounterError> {
    let content = read_counter_file(path)?;
    parse_file_nr(&content).map_err(|reason| CounterError::Malformed {
        path: path.to_path_buf(),
        reason,
    })
}

/// Reads only the maximum number of handles from the counter file.
pub fn read_max(path: &Path) -> Result<u64, CounterError> {
    let content = read_counter_file(path)?;
    parse_max(&content).map_err(|reason| CounterError::Malformed {
        path: path.to_path_buf(),
        reason,
    })
}
