//! Debounced panel input: switch presses and encoder steps.

use std::collections::HashSet;

use mixer_traits::{InputLine, InputPins};
use tracing::debug;

use crate::SharedClock;
use crate::config::{DebounceMode, EncoderMode, InputCfg};
use crate::error::Result;
use crate::hw_error::report;
use crate::types::Direction;

/// Result of polling one switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    None,
    Pressed,
}

/// Gray-code transition table indexed by `(prev << 2) | curr`, each state
/// packed as `(clk << 1) | dt`.
const QUAD_TRANS: [i8; 16] = [
    0, -1, 1, 0, //
    1, 0, 0, -1, //
    -1, 0, 0, 1, //
    0, 1, -1, 0,
];

/// Transitions per mechanical detent in quadrature mode.
const QUAD_PER_DETENT: i8 = 4;

/// Owns the input pins and turns raw levels into logical events.
pub struct PanelInput {
    pins: Box<dyn InputPins + Send>,
    clock: SharedClock,
    cfg: InputCfg,
    /// Lines reported as pressed and not yet seen released (edge mode).
    latched: HashSet<InputLine>,
    last_clk: Option<bool>,
    last_quad: Option<u8>,
    quad_acc: i8,
}

impl core::fmt::Debug for PanelInput {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PanelInput")
            .field("cfg", &self.cfg)
            .field("latched", &self.latched)
            .field("last_clk", &self.last_clk)
            .finish_non_exhaustive()
    }
}

impl PanelInput {
    pub fn new(pins: Box<dyn InputPins + Send>, clock: SharedClock, cfg: InputCfg) -> Self {
        Self {
            pins,
            clock,
            cfg,
            latched: HashSet::new(),
            last_clk: None,
            last_quad: None,
            quad_acc: 0,
        }
    }

    /// Whether `line` currently reads as pressed, honoring `active_low`.
    pub fn is_active(&mut self, line: InputLine) -> Result<bool> {
        let high = self.pins.is_high(line).map_err(report)?;
        Ok(high != self.cfg.active_low)
    }

    /// Sample, wait the settle delay, sample again.
    ///
    /// In `Recheck` mode a switch held across polls is reported on every
    /// poll. In `Edge` mode it is reported once and re-armed only after a
    /// poll sees it released.
    pub fn poll_edge(&mut self, line: InputLine) -> Result<Edge> {
        if !self.is_active(line)? {
            self.latched.remove(&line);
            return Ok(Edge::None);
        }
        if self.cfg.debounce == DebounceMode::Edge && self.latched.contains(&line) {
            return Ok(Edge::None);
        }
        self.clock.sleep(self.cfg.settle);
        if !self.is_active(line)? {
            return Ok(Edge::None);
        }
        if self.cfg.debounce == DebounceMode::Edge {
            self.latched.insert(line);
        }
        debug!(?line, "press");
        Ok(Edge::Pressed)
    }

    /// Take the current encoder levels as the baseline, discarding any
    /// movement since the last poll.
    pub fn prime_encoder(&mut self) -> Result<()> {
        let clk = self.pins.is_high(InputLine::EncoderClk).map_err(report)?;
        let dt = self.pins.is_high(InputLine::EncoderDt).map_err(report)?;
        self.last_clk = Some(clk);
        self.last_quad = Some((u8::from(clk) << 1) | u8::from(dt));
        self.quad_acc = 0;
        Ok(())
    }

    /// One encoder step, if the lines moved since the last poll.
    pub fn poll_encoder(&mut self) -> Result<Option<Direction>> {
        let step = match self.cfg.encoder {
            EncoderMode::HalfStep => self.poll_half_step()?,
            EncoderMode::Quadrature => self.poll_quadrature()?,
        };
        if let Some(dir) = step {
            debug!(?dir, "encoder step");
        }
        Ok(step)
    }

    fn poll_half_step(&mut self) -> Result<Option<Direction>> {
        let clk = self.pins.is_high(InputLine::EncoderClk).map_err(report)?;
        let Some(last) = self.last_clk.replace(clk) else {
            return Ok(None);
        };
        if clk == last {
            return Ok(None);
        }
        let dt = self.pins.is_high(InputLine::EncoderDt).map_err(report)?;
        Ok(Some(if dt {
            Direction::Clockwise
        } else {
            Direction::CounterClockwise
        }))
    }

    // Positive table deltas are counter-clockwise so that a rising clock with
    // the data line low agrees with the half-step decoder.
    fn poll_quadrature(&mut self) -> Result<Option<Direction>> {
        let clk = self.pins.is_high(InputLine::EncoderClk).map_err(report)?;
        let dt = self.pins.is_high(InputLine::EncoderDt).map_err(report)?;
        let curr = (u8::from(clk) << 1) | u8::from(dt);
        let Some(prev) = self.last_quad.replace(curr) else {
            return Ok(None);
        };
        self.quad_acc += QUAD_TRANS[usize::from((prev << 2) | curr)];
        if self.quad_acc >= QUAD_PER_DETENT {
            self.quad_acc = 0;
            Ok(Some(Direction::CounterClockwise))
        } else if self.quad_acc <= -QUAD_PER_DETENT {
            self.quad_acc = 0;
            Ok(Some(Direction::Clockwise))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::FakePanel;
    use mixer_traits::clock::test_clock::TestClock;
    use std::sync::Arc;
    use std::time::Duration;

    fn input(panel: &FakePanel, debounce: DebounceMode, encoder: EncoderMode) -> PanelInput {
        let cfg = InputCfg {
            debounce,
            encoder,
            ..InputCfg::default()
        };
        PanelInput::new(Box::new(panel.clone()), Arc::new(TestClock::new()), cfg)
    }

    #[test]
    fn recheck_reports_held_switch_every_poll() {
        let panel = FakePanel::new();
        let mut inp = input(&panel, DebounceMode::Recheck, EncoderMode::HalfStep);
        panel.press(InputLine::ConfirmSwitch);
        assert_eq!(inp.poll_edge(InputLine::ConfirmSwitch).unwrap(), Edge::Pressed);
        assert_eq!(inp.poll_edge(InputLine::ConfirmSwitch).unwrap(), Edge::Pressed);
    }

    #[test]
    fn edge_mode_reports_once_until_release() {
        let panel = FakePanel::new();
        let mut inp = input(&panel, DebounceMode::Edge, EncoderMode::HalfStep);
        panel.press(InputLine::ConfirmSwitch);
        assert_eq!(inp.poll_edge(InputLine::ConfirmSwitch).unwrap(), Edge::Pressed);
        assert_eq!(inp.poll_edge(InputLine::ConfirmSwitch).unwrap(), Edge::None);
        panel.release(InputLine::ConfirmSwitch);
        assert_eq!(inp.poll_edge(InputLine::ConfirmSwitch).unwrap(), Edge::None);
        panel.press(InputLine::ConfirmSwitch);
        assert_eq!(inp.poll_edge(InputLine::ConfirmSwitch).unwrap(), Edge::Pressed);
    }

    #[test]
    fn bounce_shorter_than_settle_is_ignored() {
        let panel = FakePanel::new();
        let clock = TestClock::new();
        // Line reads pressed once, then released by the time the recheck happens.
        panel.press_for(InputLine::AutoSwitch, 1);
        let mut inp = PanelInput::new(
            Box::new(panel.clone()),
            Arc::new(clock.clone()),
            InputCfg::default(),
        );
        assert_eq!(inp.poll_edge(InputLine::AutoSwitch).unwrap(), Edge::None);
        assert_eq!(clock.elapsed(), Duration::from_millis(50));
    }

    #[test]
    fn half_step_follows_data_line_on_clock_change() {
        let panel = FakePanel::new();
        let mut inp = input(&panel, DebounceMode::Edge, EncoderMode::HalfStep);
        assert_eq!(inp.poll_encoder().unwrap(), None);
        panel.turn(Direction::Clockwise);
        assert_eq!(inp.poll_encoder().unwrap(), Some(Direction::Clockwise));
        assert_eq!(inp.poll_encoder().unwrap(), None);
        panel.turn(Direction::CounterClockwise);
        assert_eq!(inp.poll_encoder().unwrap(), Some(Direction::CounterClockwise));
    }

    #[test]
    fn quadrature_needs_a_full_detent() {
        let panel = FakePanel::new();
        let mut inp = input(&panel, DebounceMode::Edge, EncoderMode::Quadrature);
        // Rest at 11, then 01 -> 00 -> 10 -> 11: four +1 transitions.
        panel.set_encoder(true, true);
        assert_eq!(inp.poll_encoder().unwrap(), None);
        for (clk, dt) in [(false, true), (false, false), (true, false)] {
            panel.set_encoder(clk, dt);
            assert_eq!(inp.poll_encoder().unwrap(), None);
        }
        panel.set_encoder(true, true);
        assert_eq!(inp.poll_encoder().unwrap(), Some(Direction::CounterClockwise));

        // Reverse sequence: 10 -> 00 -> 01 -> 11.
        for (clk, dt) in [(true, false), (false, false), (false, true)] {
            panel.set_encoder(clk, dt);
            assert_eq!(inp.poll_encoder().unwrap(), None);
        }
        panel.set_encoder(true, true);
        assert_eq!(inp.poll_encoder().unwrap(), Some(Direction::Clockwise));
        assert_eq!(inp.quad_acc, 0);
    }

    #[test]
    fn priming_discards_earlier_movement() {
        let panel = FakePanel::new();
        let mut inp = input(&panel, DebounceMode::Edge, EncoderMode::HalfStep);
        inp.prime_encoder().unwrap();
        panel.turn(Direction::Clockwise);
        inp.prime_encoder().unwrap();
        assert_eq!(inp.poll_encoder().unwrap(), None);
        panel.turn(Direction::Clockwise);
        assert_eq!(inp.poll_encoder().unwrap(), Some(Direction::Clockwise));
    }

    #[test]
    fn active_high_wiring_inverts_levels() {
        let panel = FakePanel::new();
        let cfg = InputCfg {
            active_low: false,
            ..InputCfg::default()
        };
        let mut inp = PanelInput::new(Box::new(panel.clone()), Arc::new(TestClock::new()), cfg);
        // FakePanel idles high, which is "pressed" for active-high wiring.
        assert!(inp.is_active(InputLine::ManualSwitch).unwrap());
    }
}
