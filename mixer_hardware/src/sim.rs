//! Simulated operator panel, pump bank and character display.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use mixer_traits::{CharDisplay, Clock, HwResult, InputLine, InputPins, Pumps};
use tracing::{debug, info};

use crate::error::{HwError, Result};

/// How long a simulated switch press keeps its line active.
pub const DEFAULT_HOLD: Duration = Duration::from_millis(150);

/// One thing an operator can do at the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    Auto,
    Manual,
    Confirm,
    Cancel,
    Clockwise,
    CounterClockwise,
}

impl FromStr for PanelAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "a" => Ok(Self::Auto),
            "manual" | "m" => Ok(Self::Manual),
            "confirm" | "c" => Ok(Self::Confirm),
            "cancel" | "x" => Ok(Self::Cancel),
            "cw" | "+" => Ok(Self::Clockwise),
            "ccw" | "-" => Ok(Self::CounterClockwise),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

impl PanelAction {
    fn is_turn(self) -> bool {
        matches!(self, Self::Clockwise | Self::CounterClockwise)
    }
}

/// Parse a panel script: one `<ms> <action>` per line, `#` starts a comment.
pub fn parse_script(src: &str) -> Result<Vec<(Duration, PanelAction)>> {
    let mut out = Vec::new();
    for (idx, raw) in src.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(at), Some(action), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(HwError::Script {
                line: idx + 1,
                msg: "expected '<ms> <action>'".into(),
            });
        };
        let at_ms: u64 = at.parse().map_err(|_| HwError::Script {
            line: idx + 1,
            msg: format!("bad time '{at}'"),
        })?;
        let action = action.parse().map_err(|msg| HwError::Script {
            line: idx + 1,
            msg,
        })?;
        out.push((Duration::from_millis(at_ms), action));
    }
    out.sort_by_key(|(at, _)| *at);
    Ok(out)
}

struct PanelState {
    clk_high: bool,
    dt_high: bool,
    /// Switch lines currently held, with their release instant.
    held: HashMap<InputLine, Instant>,
    /// Switch presses, in time order.
    pending: VecDeque<(Instant, PanelAction)>,
    /// Encoder turns; at most one is applied per clock-line read.
    turns: VecDeque<(Instant, PanelAction)>,
    /// Every live sender has been dropped.
    live_closed: bool,
}

/// Simulated panel with pull-up, active-low switches and a two-line encoder.
///
/// Actions come from a timed script and/or a live channel. Clones share the
/// same panel, so the background cancel watcher can poll its own handle.
#[derive(Clone)]
pub struct SimulatedPanel {
    state: Arc<Mutex<PanelState>>,
    live: Option<xch::Receiver<PanelAction>>,
    clock: Arc<dyn Clock + Send + Sync>,
    hold: Duration,
}

impl SimulatedPanel {
    /// Panel replaying `script`, times relative to now.
    pub fn scripted(
        script: Vec<(Duration, PanelAction)>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let start = clock.now();
        let (turns, pending): (VecDeque<_>, VecDeque<_>) = script
            .into_iter()
            .map(|(at, a)| (start + at, a))
            .partition(|(_, a)| a.is_turn());
        Self {
            state: Arc::new(Mutex::new(PanelState {
                clk_high: true,
                dt_high: true,
                held: HashMap::new(),
                pending,
                turns,
                live_closed: false,
            })),
            live: None,
            clock,
            hold: DEFAULT_HOLD,
        }
    }

    /// Panel fed by the returned sender; each action applies when next polled.
    pub fn live(clock: Arc<dyn Clock + Send + Sync>) -> (Self, xch::Sender<PanelAction>) {
        let (tx, rx) = xch::unbounded();
        let mut panel = Self::scripted(Vec::new(), clock);
        panel.live = Some(rx);
        (panel, tx)
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// True once every scripted action has been applied and, for a live
    /// panel, the sender side has hung up.
    pub fn script_done(&self) -> bool {
        let live = self.live.is_some();
        self.state
            .lock()
            .map(|s| s.pending.is_empty() && s.turns.is_empty() && (!live || s.live_closed))
            .unwrap_or(true)
    }

    fn apply_due(&self, st: &mut PanelState, now: Instant, line: InputLine) {
        if let Some(rx) = &self.live {
            loop {
                match rx.try_recv() {
                    Ok(action) if action.is_turn() => st.turns.push_back((now, action)),
                    Ok(action) => st.pending.push_back((now, action)),
                    Err(xch::TryRecvError::Empty) => break,
                    Err(xch::TryRecvError::Disconnected) => {
                        st.live_closed = true;
                        break;
                    }
                }
            }
        }
        if line == InputLine::EncoderClk {
            if let Some((at, action)) = st.turns.front().copied() {
                if at <= now {
                    st.turns.pop_front();
                    debug!(?action, "panel turn");
                    st.dt_high = action == PanelAction::Clockwise;
                    st.clk_high = !st.clk_high;
                }
            }
        }
        while let Some((at, action)) = st.pending.front().copied() {
            if at > now {
                break;
            }
            st.pending.pop_front();
            debug!(?action, "panel action");
            match action {
                PanelAction::Auto => {
                    st.held.insert(InputLine::AutoSwitch, now + self.hold);
                }
                PanelAction::Manual => {
                    st.held.insert(InputLine::ManualSwitch, now + self.hold);
                }
                PanelAction::Confirm => {
                    st.held.insert(InputLine::ConfirmSwitch, now + self.hold);
                }
                PanelAction::Cancel => {
                    st.held.insert(InputLine::CancelSwitch, now + self.hold);
                }
                PanelAction::Clockwise | PanelAction::CounterClockwise => {}
            }
        }
        st.held.retain(|_, release| *release > now);
    }
}

impl InputPins for SimulatedPanel {
    fn is_high(&mut self, line: InputLine) -> HwResult<bool> {
        let now = self.clock.now();
        let mut st = self.state.lock().map_err(|_| HwError::Poisoned)?;
        self.apply_due(&mut st, now, line);
        let level = match line {
            InputLine::EncoderClk => st.clk_high,
            InputLine::EncoderDt => st.dt_high,
            switch => !st.held.contains_key(&switch),
        };
        Ok(level)
    }
}

/// Pump bank that only records state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPumps {
    running: Arc<Mutex<[bool; 4]>>,
}

impl SimulatedPumps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self, slot: u8) -> bool {
        self.running
            .lock()
            .map(|r| r.get(usize::from(slot)).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    pub fn any_running(&self) -> bool {
        self.running
            .lock()
            .map(|r| r.iter().any(|on| *on))
            .unwrap_or(false)
    }

    fn set(&self, slot: u8, on: bool) -> Result<()> {
        let mut r = self.running.lock().map_err(|_| HwError::Poisoned)?;
        let cell = r
            .get_mut(usize::from(slot))
            .ok_or(HwError::InvalidSlot(slot))?;
        if *cell != on {
            info!(slot, on, "pump (simulated)");
        }
        *cell = on;
        Ok(())
    }
}

impl Pumps for SimulatedPumps {
    fn start(&mut self, slot: u8) -> HwResult<()> {
        Ok(self.set(slot, true)?)
    }
    fn stop(&mut self, slot: u8) -> HwResult<()> {
        Ok(self.set(slot, false)?)
    }
}

/// Two-row display rendered as a framed box on a writer (stdout by default).
pub struct TerminalDisplay {
    cols: usize,
    rows: [Vec<char>; 2],
    cursor: (usize, usize),
    out: Box<dyn Write + Send>,
}

impl TerminalDisplay {
    pub fn new(cols: u8) -> Self {
        Self::with_writer(cols, Box::new(std::io::stdout()))
    }

    pub fn with_writer(cols: u8, out: Box<dyn Write + Send>) -> Self {
        let cols = usize::from(cols);
        Self {
            cols,
            rows: [vec![' '; cols], vec![' '; cols]],
            cursor: (0, 0),
            out,
        }
    }

    /// Current contents of a row, trailing blanks trimmed.
    pub fn row(&self, row: usize) -> String {
        self.rows
            .get(row)
            .map(|r| r.iter().collect::<String>().trim_end().to_string())
            .unwrap_or_default()
    }
}

impl CharDisplay for TerminalDisplay {
    fn clear(&mut self) -> HwResult<()> {
        for row in &mut self.rows {
            row.fill(' ');
        }
        self.cursor = (0, 0);
        Ok(())
    }

    fn set_cursor(&mut self, col: u8, row: u8) -> HwResult<()> {
        if row > 1 {
            return Err(Box::new(HwError::DisplayRange { col, row }));
        }
        self.cursor = (usize::from(col).min(self.cols), usize::from(row));
        Ok(())
    }

    fn print(&mut self, text: &str) -> HwResult<()> {
        let (mut col, row) = self.cursor;
        for ch in text.chars() {
            if col >= self.cols {
                break;
            }
            self.rows[row][col] = ch;
            col += 1;
        }
        self.cursor = (col, row);
        Ok(())
    }

    fn flush(&mut self) -> HwResult<()> {
        let border = "-".repeat(self.cols);
        let top: String = self.rows[0].iter().collect();
        let bottom: String = self.rows[1].iter().collect();
        writeln!(self.out, "+{border}+\n|{top}|\n|{bottom}|\n+{border}+")
            .map_err(HwError::from)?;
        self.out.flush().map_err(HwError::from)?;
        Ok(())
    }
}
