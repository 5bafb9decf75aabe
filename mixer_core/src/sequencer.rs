//! Pump actuation: one ingredient at a time, for its calibrated duration.
//!
//! The wait is a tick loop that checks the cancellation flag before every
//! tick. The pump is stopped on every exit path, including errors raised
//! after it was started.

use std::time::Duration;

use mixer_traits::Pumps;
use tracing::{debug, info, warn};

use crate::SharedClock;
use crate::allocation::Allocation;
use crate::calibration::CalibrationTable;
use crate::cancel::CancelFlag;
use crate::error::Result;
use crate::hw_error::report;
use crate::types::{Ingredient, Percentage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuationOutcome {
    /// Ran for the full calibrated duration.
    Completed,
    /// Stopped early because the cancellation flag was raised.
    Cancelled,
    /// Zero duration; the pump was never started.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actuation {
    pub ingredient: Ingredient,
    pub percentage: Percentage,
    pub outcome: ActuationOutcome,
    /// Ticks slept while the pump was on.
    pub ticks: u64,
    /// Time the pump was on, as measured by the clock.
    pub elapsed: Duration,
}

pub struct Sequencer {
    pumps: Box<dyn Pumps + Send>,
    clock: SharedClock,
    calibration: CalibrationTable,
    tick: Duration,
}

impl core::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sequencer")
            .field("calibration", &self.calibration)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl Sequencer {
    pub fn new(
        pumps: Box<dyn Pumps + Send>,
        clock: SharedClock,
        calibration: CalibrationTable,
        tick: Duration,
    ) -> Self {
        Self {
            pumps,
            clock,
            calibration,
            tick,
        }
    }

    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    /// Run one pump for `duration_for(percentage)`, stopping early if
    /// `cancel` is raised. Returns with the pump off.
    pub fn actuate(
        &mut self,
        ingredient: Ingredient,
        percentage: Percentage,
        cancel: Option<&CancelFlag>,
    ) -> Result<Actuation> {
        let duration = self.calibration.duration_for(percentage);
        let slot = ingredient.slot();
        if duration.is_zero() {
            debug!(slot, %percentage, "zero duration; pump not started");
            return Ok(Actuation {
                ingredient,
                percentage,
                outcome: ActuationOutcome::Skipped,
                ticks: 0,
                elapsed: Duration::ZERO,
            });
        }

        if let Err(e) = self.pumps.start(slot) {
            self.stop_best_effort(slot);
            return Err(report(e));
        }
        let started = self.clock.now();
        debug!(slot, ?duration, "pump on");

        let mut ticks = 0u64;
        let outcome = loop {
            if cancel.is_some_and(CancelFlag::is_raised) {
                break ActuationOutcome::Cancelled;
            }
            if self.clock.now().saturating_duration_since(started) >= duration {
                break ActuationOutcome::Completed;
            }
            self.clock.sleep(self.tick);
            ticks += 1;
        };

        let elapsed = self.clock.now().saturating_duration_since(started);
        self.pumps.stop(slot).map_err(|e| {
            self.stop_best_effort(slot);
            report(e)
        })?;
        info!(slot, %percentage, ?outcome, ?elapsed, "actuation finished");

        Ok(Actuation {
            ingredient,
            percentage,
            outcome,
            ticks,
            elapsed,
        })
    }

    /// Dispense a validated allocation, ingredients in index order, one at a time.
    pub fn actuate_all(&mut self, allocation: &Allocation) -> Result<Vec<Actuation>> {
        let mut done = Vec::with_capacity(crate::types::INGREDIENT_COUNT);
        for (ingredient, percentage) in allocation.iter() {
            done.push(self.actuate(ingredient, percentage, None)?);
        }
        Ok(done)
    }

    /// Force every pump off.
    pub fn stop_all(&mut self) -> Result<()> {
        self.pumps.stop_all().map_err(report)
    }

    fn stop_best_effort(&mut self, slot: u8) {
        if let Err(e) = self.pumps.stop(slot) {
            warn!(slot, error = %e, "failed to stop pump; forcing all off");
            if let Err(e) = self.pumps.stop_all() {
                warn!(error = %e, "failed to force pumps off");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{PumpEvent, RecordingPumps};
    use mixer_traits::clock::test_clock::TestClock;
    use std::sync::Arc;

    fn sequencer(pumps: &RecordingPumps, clock: &TestClock) -> Sequencer {
        Sequencer::new(
            Box::new(pumps.clone()),
            Arc::new(clock.clone()),
            CalibrationTable::default(),
            Duration::from_millis(1),
        )
    }

    #[test]
    fn zero_percent_never_touches_the_pump() {
        let pumps = RecordingPumps::new();
        let clock = TestClock::new();
        let mut seq = sequencer(&pumps, &clock);
        let a = seq
            .actuate(Ingredient::FIRST, Percentage::ZERO, None)
            .unwrap();
        assert_eq!(a.outcome, ActuationOutcome::Skipped);
        assert!(pumps.events().is_empty());
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn raised_flag_before_start_cancels_without_waiting() {
        let pumps = RecordingPumps::new();
        let clock = TestClock::new();
        let mut seq = sequencer(&pumps, &clock);
        let flag = CancelFlag::new();
        flag.raise();
        let a = seq
            .actuate(Ingredient::ALL[1], Percentage::FULL, Some(&flag))
            .unwrap();
        assert_eq!(a.outcome, ActuationOutcome::Cancelled);
        assert_eq!(a.ticks, 0);
        assert!(!pumps.is_running(1));
    }

    #[test]
    fn failed_start_still_leaves_pump_off() {
        let clock = TestClock::new();
        let pumps = RecordingPumps::with_clock(Arc::new(clock.clone()));
        pumps.fail_start(2);
        let mut seq = sequencer(&pumps, &clock);
        assert!(seq.actuate(Ingredient::ALL[2], Percentage::FULL, None).is_err());
        assert!(!pumps.any_running());
        assert!(pumps.events().contains(&PumpEvent::Off { slot: 2, at_ms: 0 }));
    }
}
