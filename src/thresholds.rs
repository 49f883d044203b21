//! Warning and critical levels for the `used` series.
//!
//! Both levels are derived from the current maximum on every `config` run:
//! `warning = int(max * 0.92)` and `critical = int(max * 0.98)`.

/// Default share of the maximum at which Munin should warn.
pub const DEFAULT_WARNING_RATIO: f64 = 0.92;
/// Default share of the maximum at which Munin should go critical.
pub const DEFAULT_CRITICAL_RATIO: f64 = 0.98;

/// Ratios applied to the maximum number of file handles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdRatios {
    pub warning: f64,
    pub critical: f64,
}

impl Default for ThresholdRatios {
    fn default() -> Self {
        Self {
            warning: DEFAULT_WARNING_RATIO,
            critical: DEFAULT_CRITICAL_RATIO,
        }
    }
}

impl ThresholdRatios {
    /// Checks `0 < warning <= critical <= 1`.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("warning_ratio", self.warning), ("critical_ratio", self.critical)] {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(format!(
                    "{} must be within (0, 1], got {}",
                    name, value
                ));
            }
        }

        if self.warning > self.critical {
            return Err(format!(
                "warning_ratio ({}) must not exceed critical_ratio ({})",
                self.warning, self.critical
            ));
        }

        Ok(())
    }
}

/// Absolute alert levels for the `used` series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub warning: u64,
    pub critical: u64,
}

impl Thresholds {
    /// Derives both levels from `max`, truncating toward zero.
    pub fn from_max(max: u64, ratios: &ThresholdRatios) -> Self {
        Self {
            warning: scale(max, ratios.warning),
            critical: scale(max, ratios.critical),
        }
    }
}

fn scale(max: u64, ratio: f64) -> u64 {
    // `as` truncates, it does not round
    (max as f64 * ratio) as u64
}
