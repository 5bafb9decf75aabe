//! Runtime configuration for the dispenser.
//!
//! These are the structs the core works with; the TOML schema lives in
//! `mixer_config` and is bridged by `conversions`.

use std::time::Duration;

/// How switch presses are turned into events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DebounceMode {
    /// Report a press once, re-arm after the line is seen released.
    #[default]
    Edge,
    /// Sample, settle, re-sample. A held switch reports again on every poll.
    Recheck,
}

/// Rotary encoder decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncoderMode {
    /// One step per clock-line transition, direction from the data line.
    #[default]
    HalfStep,
    /// Full Gray-code decoding, one step per detent (four transitions).
    Quadrature,
}

/// Panel input handling.
#[derive(Debug, Clone)]
pub struct InputCfg {
    /// Pressed reads electrically low (pull-up wiring).
    pub active_low: bool,
    /// Delay between the first active sample and the confirming one.
    pub settle: Duration,
    pub debounce: DebounceMode,
    pub encoder: EncoderMode,
}

impl Default for InputCfg {
    fn default() -> Self {
        Self {
            active_low: true,
            settle: Duration::from_millis(50),
            debounce: DebounceMode::Edge,
            encoder: EncoderMode::HalfStep,
        }
    }
}

/// Foreground loop pacing.
#[derive(Debug, Clone)]
pub struct TimingCfg {
    /// Sleep after each interactive poll.
    pub poll: Duration,
    /// How long fixed notices stay on screen.
    pub notice: Duration,
    /// One sequencer increment; cancellation latency is at most one tick.
    pub tick: Duration,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(50),
            notice: Duration::from_millis(4000),
            tick: Duration::from_millis(1),
        }
    }
}

/// Display geometry and ingredient labels.
#[derive(Debug, Clone)]
pub struct PanelCfg {
    pub cols: u8,
    pub names: [String; 4],
}

impl Default for PanelCfg {
    fn default() -> Self {
        Self {
            cols: 16,
            names: ["PINEAPPLE", "MANGO", "APPLE", "ORANGE"].map(String::from),
        }
    }
}
