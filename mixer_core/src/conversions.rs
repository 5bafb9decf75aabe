//! `From` implementations bridging `mixer_config` types to `mixer_core` types.

use std::time::Duration;

use crate::calibration::CalibrationTable;
use crate::config::{DebounceMode, EncoderMode, InputCfg, PanelCfg, TimingCfg};

// ── InputCfg ─────────────────────────────────────────────────────────────────

impl From<mixer_config::DebounceMode> for DebounceMode {
    fn from(m: mixer_config::DebounceMode) -> Self {
        match m {
            mixer_config::DebounceMode::Edge => Self::Edge,
            mixer_config::DebounceMode::Recheck => Self::Recheck,
        }
    }
}

impl From<mixer_config::EncoderMode> for EncoderMode {
    fn from(m: mixer_config::EncoderMode) -> Self {
        match m {
            mixer_config::EncoderMode::HalfStep => Self::HalfStep,
            mixer_config::EncoderMode::Quadrature => Self::Quadrature,
        }
    }
}

impl From<&mixer_config::InputCfg> for InputCfg {
    fn from(c: &mixer_config::InputCfg) -> Self {
        Self {
            active_low: c.active_low,
            settle: Duration::from_millis(c.settle_ms),
            debounce: c.debounce.into(),
            encoder: c.encoder.into(),
        }
    }
}

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&mixer_config::TimingCfg> for TimingCfg {
    fn from(c: &mixer_config::TimingCfg) -> Self {
        Self {
            poll: Duration::from_millis(c.poll_ms),
            notice: Duration::from_millis(c.notice_ms),
            tick: Duration::from_millis(c.tick_ms),
        }
    }
}

// ── PanelCfg ─────────────────────────────────────────────────────────────────

impl From<&mixer_config::Config> for PanelCfg {
    fn from(c: &mixer_config::Config) -> Self {
        Self {
            cols: c.display.cols,
            names: c.ingredients.names.clone(),
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

/// The config-side table is validated on load, so this is infallible.
impl From<&mixer_config::Calibration> for CalibrationTable {
    fn from(c: &mixer_config::Calibration) -> Self {
        Self::from_validated(c.durations_ms)
    }
}
