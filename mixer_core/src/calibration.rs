//! Percentage → actuation duration lookup.
//!
//! Durations come from timing each pump against a measuring jug at every
//! percentage step. One entry per `Percentage::ALL` value; 0% never actuates.

use std::time::Duration;

use crate::error::{BuildError, Result};
use crate::types::Percentage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationTable {
    durations_ms: [u64; 6],
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self {
            durations_ms: mixer_config::DEFAULT_DURATIONS_MS,
        }
    }
}

impl CalibrationTable {
    /// Build from per-step milliseconds. The 0% entry must be 0 and the
    /// table must be non-decreasing.
    pub fn from_millis(durations_ms: [u64; 6]) -> Result<Self> {
        if durations_ms[0] != 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "calibration for 0% must be 0 ms",
            )));
        }
        if durations_ms.windows(2).any(|w| w[1] < w[0]) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "calibration durations must be non-decreasing",
            )));
        }
        Ok(Self { durations_ms })
    }

    /// For tables already checked by `mixer_config`.
    pub(crate) fn from_validated(durations_ms: [u64; 6]) -> Self {
        Self { durations_ms }
    }

    pub fn duration_for(&self, percentage: Percentage) -> Duration {
        Duration::from_millis(self.durations_ms[percentage.step_index()])
    }

    /// Lookup for an unvalidated value. Anything outside the step set yields
    /// a zero duration (no actuation) rather than an error.
    pub fn duration_for_raw(&self, value: u8) -> Duration {
        match Percentage::try_new(value) {
            Ok(p) => self.duration_for(p),
            Err(_) => {
                tracing::warn!(value, "no calibration entry for percentage; not actuating");
                Duration::ZERO
            }
        }
    }

    /// `(percentage, duration)` pairs in ascending order.
    pub fn entries(&self) -> impl Iterator<Item = (Percentage, Duration)> + '_ {
        Percentage::ALL
            .into_iter()
            .map(|p| (p, self.duration_for(p)))
    }
}
