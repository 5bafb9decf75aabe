//! Type-state builder for `Dispenser`.
//!
//! Inputs, pumps and display must be provided before `build()` is
//! available. `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use mixer_traits::{CharDisplay, InputPins, MonotonicClock, Pumps};

use crate::SharedClock;
use crate::allocation::AllocationEngine;
use crate::calibration::CalibrationTable;
use crate::cancel::CancelFlag;
use crate::config::{InputCfg, PanelCfg, TimingCfg};
use crate::error::{BuildError, Result};
use crate::input::PanelInput;
use crate::machine::{Dispenser, State};
use crate::sequencer::Sequencer;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Dispenser`. All fields are validated on `build()`.
pub struct DispenserBuilder<I, P, D> {
    inputs: Option<Box<dyn InputPins + Send>>,
    pumps: Option<Box<dyn Pumps + Send>>,
    display: Option<Box<dyn CharDisplay + Send>>,
    input_cfg: Option<InputCfg>,
    timing: Option<TimingCfg>,
    panel: Option<PanelCfg>,
    calibration: Option<CalibrationTable>,
    clock: Option<SharedClock>,
    cancel: Option<CancelFlag>,
    _i: PhantomData<I>,
    _p: PhantomData<P>,
    _d: PhantomData<D>,
}

impl Default for DispenserBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            inputs: None,
            pumps: None,
            display: None,
            input_cfg: None,
            timing: None,
            panel: None,
            calibration: None,
            clock: None,
            cancel: None,
            _i: PhantomData,
            _p: PhantomData,
            _d: PhantomData,
        }
    }
}

fn validate(timing: &TimingCfg, panel: &PanelCfg, input: &InputCfg) -> Result<()> {
    if timing.tick.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "tick must be >= 1 ms",
        )));
    }
    if timing.poll.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "poll period must be >= 1 ms",
        )));
    }
    if input.settle.as_millis() > 1000 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "debounce settle delay must be <= 1000 ms",
        )));
    }
    if panel.cols < 8 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "display must have at least 8 columns",
        )));
    }
    if panel.names.iter().any(|n| n.trim().is_empty()) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "ingredient names must not be blank",
        )));
    }
    Ok(())
}

impl<I, P, D> DispenserBuilder<I, P, D> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Dispenser> {
        let inputs = self
            .inputs
            .ok_or_else(|| eyre::Report::new(BuildError::MissingInputs))?;
        let pumps = self
            .pumps
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPumps))?;
        let display = self
            .display
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDisplay))?;

        let input_cfg = self.input_cfg.unwrap_or_default();
        let timing = self.timing.unwrap_or_default();
        let panel = self.panel.unwrap_or_default();
        validate(&timing, &panel, &input_cfg)?;

        let clock: SharedClock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let sequencer = Sequencer::new(
            pumps,
            clock.clone(),
            self.calibration.unwrap_or_default(),
            timing.tick,
        );

        Ok(Dispenser {
            input: PanelInput::new(inputs, clock.clone(), input_cfg),
            sequencer,
            display,
            clock,
            timing,
            panel,
            cancel: self.cancel.unwrap_or_default(),
            engine: AllocationEngine::new(),
            allocation: None,
            state: State::ModeSelect,
            entered: false,
            report: None,
        })
    }
}

/// Chainable setters that do not affect type-state.
impl<I, P, D> DispenserBuilder<I, P, D> {
    pub fn with_input_cfg(mut self, cfg: InputCfg) -> Self {
        self.input_cfg = Some(cfg);
        self
    }

    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn with_panel(mut self, panel: PanelCfg) -> Self {
        self.panel = Some(panel);
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationTable) -> Self {
        self.calibration = Some(calibration);
        self
    }

    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share an existing flag, e.g. one already handed to a `CancelWatcher`.
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }
}

// Setters that advance type-state
impl<P, D> DispenserBuilder<Missing, P, D> {
    pub fn with_inputs(
        self,
        inputs: impl InputPins + Send + 'static,
    ) -> DispenserBuilder<Set, P, D> {
        DispenserBuilder {
            inputs: Some(Box::new(inputs)),
            pumps: self.pumps,
            display: self.display,
            input_cfg: self.input_cfg,
            timing: self.timing,
            panel: self.panel,
            calibration: self.calibration,
            clock: self.clock,
            cancel: self.cancel,
            _i: PhantomData,
            _p: PhantomData,
            _d: PhantomData,
        }
    }
}

impl<I, D> DispenserBuilder<I, Missing, D> {
    pub fn with_pumps(self, pumps: impl Pumps + Send + 'static) -> DispenserBuilder<I, Set, D> {
        DispenserBuilder {
            inputs: self.inputs,
            pumps: Some(Box::new(pumps)),
            display: self.display,
            input_cfg: self.input_cfg,
            timing: self.timing,
            panel: self.panel,
            calibration: self.calibration,
            clock: self.clock,
            cancel: self.cancel,
            _i: PhantomData,
            _p: PhantomData,
            _d: PhantomData,
        }
    }
}

impl<I, P> DispenserBuilder<I, P, Missing> {
    pub fn with_display(
        self,
        display: impl CharDisplay + Send + 'static,
    ) -> DispenserBuilder<I, P, Set> {
        DispenserBuilder {
            inputs: self.inputs,
            pumps: self.pumps,
            display: Some(Box::new(display)),
            input_cfg: self.input_cfg,
            timing: self.timing,
            panel: self.panel,
            calibration: self.calibration,
            clock: self.clock,
            cancel: self.cancel,
            _i: PhantomData,
            _p: PhantomData,
            _d: PhantomData,
        }
    }
}

impl DispenserBuilder<Set, Set, Set> {
    /// Validate and build the Dispenser. Only available when inputs, pumps and display are set.
    pub fn build(self) -> Result<Dispenser> {
        self.try_build()
    }
}
