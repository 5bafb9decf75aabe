//! Test and helper mocks for mixer_core.
//!
//! All mocks are cheaply cloneable handles over shared state so a test can
//! keep one clone for assertions after moving another into the dispenser.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use mixer_traits::{CharDisplay, Clock, HwResult, InputLine, InputPins, MonotonicClock, Pumps};

use crate::SharedClock;
use crate::types::Direction;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[derive(Debug)]
struct PanelLevels {
    levels: HashMap<InputLine, bool>,
    /// Lines that read low for a limited number of further reads.
    transient: HashMap<InputLine, u32>,
}

/// Panel with directly settable line levels. Idles high (nothing pressed,
/// active-low wiring).
#[derive(Debug, Clone)]
pub struct FakePanel {
    inner: Arc<Mutex<PanelLevels>>,
}

impl Default for FakePanel {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePanel {
    pub fn new() -> Self {
        let levels = InputLine::ALL.into_iter().map(|l| (l, true)).collect();
        Self {
            inner: Arc::new(Mutex::new(PanelLevels {
                levels,
                transient: HashMap::new(),
            })),
        }
    }

    pub fn press(&self, line: InputLine) {
        lock(&self.inner).levels.insert(line, false);
    }

    pub fn release(&self, line: InputLine) {
        let mut p = lock(&self.inner);
        p.levels.insert(line, true);
        p.transient.remove(&line);
    }

    /// Read low for the next `reads` reads of `line`, then high (contact bounce).
    pub fn press_for(&self, line: InputLine, reads: u32) {
        lock(&self.inner).transient.insert(line, reads);
    }

    /// One half-step: data line set for the direction, clock line toggled.
    pub fn turn(&self, dir: Direction) {
        let mut p = lock(&self.inner);
        let clk = p.levels.get(&InputLine::EncoderClk).copied().unwrap_or(true);
        p.levels
            .insert(InputLine::EncoderDt, dir == Direction::Clockwise);
        p.levels.insert(InputLine::EncoderClk, !clk);
    }

    pub fn set_encoder(&self, clk: bool, dt: bool) {
        let mut p = lock(&self.inner);
        p.levels.insert(InputLine::EncoderClk, clk);
        p.levels.insert(InputLine::EncoderDt, dt);
    }
}

impl InputPins for FakePanel {
    fn is_high(&mut self, line: InputLine) -> HwResult<bool> {
        let mut p = lock(&self.inner);
        if let Some(left) = p.transient.get_mut(&line) {
            if *left > 0 {
                *left -= 1;
                return Ok(false);
            }
            p.transient.remove(&line);
        }
        Ok(p.levels.get(&line).copied().unwrap_or(true))
    }
}

/// Pump switching observed by `RecordingPumps`, timestamped in ms since creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEvent {
    On { slot: u8, at_ms: u64 },
    Off { slot: u8, at_ms: u64 },
}

#[derive(Debug, Default)]
struct PumpLog {
    running: [bool; 4],
    events: Vec<PumpEvent>,
    fail_start: Option<u8>,
}

/// Pump bank that records every start/stop.
#[derive(Clone)]
pub struct RecordingPumps {
    inner: Arc<Mutex<PumpLog>>,
    clock: SharedClock,
    epoch: Instant,
}

impl Default for RecordingPumps {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingPumps {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    /// Timestamps come from `clock`, relative to the moment of creation.
    pub fn with_clock(clock: SharedClock) -> Self {
        let epoch = clock.now();
        Self {
            inner: Arc::new(Mutex::new(PumpLog::default())),
            clock,
            epoch,
        }
    }

    /// Make `start(slot)` fail from now on.
    pub fn fail_start(&self, slot: u8) {
        lock(&self.inner).fail_start = Some(slot);
    }

    pub fn events(&self) -> Vec<PumpEvent> {
        lock(&self.inner).events.clone()
    }

    pub fn is_running(&self, slot: u8) -> bool {
        lock(&self.inner)
            .running
            .get(usize::from(slot))
            .copied()
            .unwrap_or(false)
    }

    pub fn any_running(&self) -> bool {
        lock(&self.inner).running.iter().any(|on| *on)
    }

    /// `(slot, ms)` for every completed on/off pair, in order.
    pub fn on_durations(&self) -> Vec<(u8, u64)> {
        let events = self.events();
        let mut open: HashMap<u8, u64> = HashMap::new();
        let mut out = Vec::new();
        for ev in events {
            match ev {
                PumpEvent::On { slot, at_ms } => {
                    open.insert(slot, at_ms);
                }
                PumpEvent::Off { slot, at_ms } => {
                    if let Some(start) = open.remove(&slot) {
                        out.push((slot, at_ms.saturating_sub(start)));
                    }
                }
            }
        }
        out
    }

    fn check_slot(slot: u8) -> HwResult<usize> {
        let idx = usize::from(slot);
        if idx < 4 {
            Ok(idx)
        } else {
            Err(Box::new(std::io::Error::other(format!("no pump in slot {slot}"))))
        }
    }
}

impl Pumps for RecordingPumps {
    fn start(&mut self, slot: u8) -> HwResult<()> {
        let idx = Self::check_slot(slot)?;
        let at_ms = self.clock.ms_since(self.epoch);
        let mut log = lock(&self.inner);
        if log.fail_start == Some(slot) {
            return Err(Box::new(std::io::Error::other("relay stuck")));
        }
        log.running[idx] = true;
        log.events.push(PumpEvent::On { slot, at_ms });
        Ok(())
    }

    fn stop(&mut self, slot: u8) -> HwResult<()> {
        let idx = Self::check_slot(slot)?;
        let at_ms = self.clock.ms_since(self.epoch);
        let mut log = lock(&self.inner);
        log.running[idx] = false;
        log.events.push(PumpEvent::Off { slot, at_ms });
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Screen {
    rows: [String; 2],
    row: usize,
    frames: Vec<[String; 2]>,
}

/// Display that keeps every flushed frame.
#[derive(Debug, Clone, Default)]
pub struct BufferDisplay {
    inner: Arc<Mutex<Screen>>,
}

impl BufferDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every flushed `[row0, row1]`, oldest first.
    pub fn frames(&self) -> Vec<[String; 2]> {
        lock(&self.inner).frames.clone()
    }

    pub fn last_frame(&self) -> Option<[String; 2]> {
        lock(&self.inner).frames.last().cloned()
    }

    /// True if some frame showed exactly these two rows.
    pub fn showed(&self, row0: &str, row1: &str) -> bool {
        lock(&self.inner)
            .frames
            .iter()
            .any(|[a, b]| a == row0 && b == row1)
    }
}

impl CharDisplay for BufferDisplay {
    fn clear(&mut self) -> HwResult<()> {
        let mut s = lock(&self.inner);
        s.rows = [String::new(), String::new()];
        s.row = 0;
        Ok(())
    }

    fn set_cursor(&mut self, _col: u8, row: u8) -> HwResult<()> {
        if row > 1 {
            return Err(Box::new(std::io::Error::other(format!(
                "row {row} out of range"
            ))));
        }
        lock(&self.inner).row = usize::from(row);
        Ok(())
    }

    fn print(&mut self, text: &str) -> HwResult<()> {
        let mut s = lock(&self.inner);
        let row = s.row;
        s.rows[row].push_str(text);
        Ok(())
    }

    fn flush(&mut self) -> HwResult<()> {
        let mut s = lock(&self.inner);
        let frame = s.rows.clone();
        s.frames.push(frame);
        Ok(())
    }
}
