//! Dispensing state machine.
//!
//! `step()` performs one foreground poll or one blocking action (a notice,
//! a dispense) and returns the resulting state. Screens for interactive
//! states are drawn on entry; notices are drawn and held by the state that
//! owns them.

use mixer_traits::{CharDisplay, InputLine};
use tracing::{debug, info, warn};

use crate::SharedClock;
use crate::allocation::{Allocation, AllocationEngine, TotalCheck};
use crate::cancel::CancelFlag;
use crate::config::{PanelCfg, TimingCfg};
use crate::error::{MixerError, Result};
use crate::input::{Edge, PanelInput};
use crate::screens::{self, Screen};
use crate::sequencer::{Actuation, ActuationOutcome, Sequencer};
use crate::types::{Direction, Ingredient, Percentage};

/// Terminal outcome of a manual dispense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualOutcome {
    Completed,
    Cancelled,
}

/// Operating mode implied by a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Auto,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    ModeSelect,
    AutoProcessing,
    /// Choosing the percentage for this ingredient.
    AutoAllocate(Ingredient),
    AutoValidate,
    AutoDispense,
    AutoComplete,
    ManualProcessing,
    /// Ingredient currently highlighted.
    ManualSelectIngredient(Ingredient),
    ManualArmed(Ingredient),
    ManualDispense(Ingredient),
    ManualDone(ManualOutcome),
}

impl State {
    pub fn mode(self) -> Mode {
        match self {
            Self::ModeSelect => Mode::Idle,
            Self::AutoProcessing
            | Self::AutoAllocate(_)
            | Self::AutoValidate
            | Self::AutoDispense
            | Self::AutoComplete => Mode::Auto,
            Self::ManualProcessing
            | Self::ManualSelectIngredient(_)
            | Self::ManualArmed(_)
            | Self::ManualDispense(_)
            | Self::ManualDone(_) => Mode::Manual,
        }
    }
}

/// What a finished session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReport {
    Auto {
        allocation: Allocation,
        actuations: Vec<Actuation>,
    },
    Manual {
        ingredient: Ingredient,
        outcome: ManualOutcome,
    },
}

pub struct Dispenser {
    pub(crate) input: PanelInput,
    pub(crate) sequencer: Sequencer,
    pub(crate) display: Box<dyn CharDisplay + Send>,
    pub(crate) clock: SharedClock,
    pub(crate) timing: TimingCfg,
    pub(crate) panel: PanelCfg,
    pub(crate) cancel: CancelFlag,
    pub(crate) engine: AllocationEngine,
    pub(crate) allocation: Option<Allocation>,
    pub(crate) state: State,
    pub(crate) entered: bool,
    pub(crate) report: Option<SessionReport>,
}

impl core::fmt::Debug for Dispenser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispenser")
            .field("state", &self.state)
            .field("engine", &self.engine)
            .field("cancel_raised", &self.cancel.is_raised())
            .finish_non_exhaustive()
    }
}

impl Dispenser {
    /// Start building a Dispenser.
    pub fn builder() -> crate::builder::DispenserBuilder<
        crate::builder::Missing,
        crate::builder::Missing,
        crate::builder::Missing,
    > {
        crate::builder::DispenserBuilder::default()
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Idle at the mode-selection screen.
    pub fn is_idle(&self) -> bool {
        self.state == State::ModeSelect
    }

    /// Handle for the background cancel watcher.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Force every pump off.
    pub fn stop_all_pumps(&mut self) -> Result<()> {
        self.sequencer.stop_all()
    }

    /// Report of the session that just ended, once back at `ModeSelect`.
    pub fn take_report(&mut self) -> Option<SessionReport> {
        if self.is_idle() {
            self.report.take()
        } else {
            None
        }
    }

    /// Run one poll or action and return the resulting state.
    pub fn step(&mut self) -> Result<State> {
        if !self.entered {
            self.enter()?;
            self.entered = true;
        }
        let next = match self.state {
            State::ModeSelect => self.on_mode_select()?,
            State::AutoProcessing => self.on_auto_processing()?,
            State::AutoAllocate(i) => self.on_auto_allocate(i)?,
            State::AutoValidate => self.on_auto_validate()?,
            State::AutoDispense => self.on_auto_dispense()?,
            State::AutoComplete => {
                self.notice(screens::ENJOY)?;
                self.engine.begin();
                State::ModeSelect
            }
            State::ManualProcessing => {
                self.cancel.clear();
                self.notice(screens::MANUAL_PROCESSING)?;
                self.notice(screens::MANUAL_RULE)?;
                self.input.prime_encoder()?;
                State::ManualSelectIngredient(Ingredient::FIRST)
            }
            State::ManualSelectIngredient(i) => self.on_manual_select(i)?,
            State::ManualArmed(i) => State::ManualDispense(i),
            State::ManualDispense(i) => self.on_manual_dispense(i)?,
            State::ManualDone(outcome) => {
                let notice = match outcome {
                    ManualOutcome::Completed => screens::ENJOY,
                    ManualOutcome::Cancelled => screens::CANCELLED,
                };
                self.notice(notice)?;
                State::ModeSelect
            }
        };
        if next != self.state {
            info!(from = ?self.state, to = ?next, "transition");
            self.state = next;
            self.enter()?;
        }
        Ok(self.state)
    }

    /// Step until a session has completed and the machine is back at
    /// `ModeSelect`. Blocks for as long as nobody selects a mode.
    pub fn run_session(&mut self) -> Result<SessionReport> {
        loop {
            self.step()?;
            if let Some(report) = self.take_report() {
                return Ok(report);
            }
        }
    }

    fn enter(&mut self) -> Result<()> {
        match self.state {
            State::ModeSelect => self.draw(screens::MODE_SELECT),
            State::AutoAllocate(i) => self.draw_allocation(i),
            State::ManualSelectIngredient(i) => {
                let name = self.name(i).to_string();
                screens::show(&mut *self.display, &name, "", self.panel.cols)
            }
            State::ManualArmed(_) => self.draw(screens::MANUAL_ARMED),
            State::AutoDispense => self.draw(screens::ORDER_ON_THE_WAY),
            _ => Ok(()),
        }
    }

    fn on_mode_select(&mut self) -> Result<State> {
        if self.input.poll_edge(InputLine::AutoSwitch)? == Edge::Pressed {
            return Ok(State::AutoProcessing);
        }
        if self.input.poll_edge(InputLine::ManualSwitch)? == Edge::Pressed {
            return Ok(State::ManualProcessing);
        }
        self.idle();
        Ok(State::ModeSelect)
    }

    fn on_auto_processing(&mut self) -> Result<State> {
        self.notice(screens::AUTO_PROCESSING)?;
        self.notice(screens::CHOOSE_PERCENTAGES)?;
        self.notice(screens::TOTAL_RULE)?;
        self.engine.begin();
        self.allocation = None;
        self.input.prime_encoder()?;
        Ok(State::AutoAllocate(Ingredient::FIRST))
    }

    fn on_auto_allocate(&mut self, ingredient: Ingredient) -> Result<State> {
        if let Some(dir) = self.input.poll_encoder()? {
            let before = self.engine.working();
            if self.engine.adjust(dir) != before {
                self.draw_allocation(ingredient)?;
            }
        }
        if self.input.poll_edge(InputLine::ConfirmSwitch)? == Edge::Pressed {
            let committed = self.engine.commit_current().map_err(eyre::Report::new)?;
            if committed != ingredient {
                return Err(eyre::Report::new(MixerError::State(format!(
                    "committed ingredient {} while allocating {}",
                    committed.index(),
                    ingredient.index()
                ))));
            }
            let value = self.engine.committed(committed);
            info!(ingredient = committed.index(), %value, "percentage committed");
            return Ok(match self.engine.current() {
                Some(next) => State::AutoAllocate(next),
                None => State::AutoValidate,
            });
        }
        self.idle();
        Ok(State::AutoAllocate(ingredient))
    }

    fn on_auto_validate(&mut self) -> Result<State> {
        match self.engine.validate_total().map_err(eyre::Report::new)? {
            TotalCheck::Ok(allocation) => {
                info!(total = allocation.total(), "allocation accepted");
                self.allocation = Some(allocation);
                Ok(State::AutoDispense)
            }
            TotalCheck::Exceeded { total } => {
                warn!(total, "allocation exceeds 100%; starting over");
                self.notice(screens::EXCEEDED)?;
                self.engine.begin();
                self.input.prime_encoder()?;
                Ok(State::AutoAllocate(Ingredient::FIRST))
            }
        }
    }

    fn on_auto_dispense(&mut self) -> Result<State> {
        let allocation = self.allocation.take().ok_or_else(|| {
            eyre::Report::new(MixerError::State("dispense without a validated allocation".into()))
        })?;
        let actuations = self.sequencer.actuate_all(&allocation)?;
        self.report = Some(SessionReport::Auto {
            allocation,
            actuations,
        });
        Ok(State::AutoComplete)
    }

    fn on_manual_select(&mut self, highlighted: Ingredient) -> Result<State> {
        let selected = match self.input.poll_encoder()? {
            Some(Direction::Clockwise) => highlighted.next_wrapping(),
            Some(Direction::CounterClockwise) => highlighted.prev_wrapping(),
            None => highlighted,
        };
        if self.input.poll_edge(InputLine::ConfirmSwitch)? == Edge::Pressed {
            info!(ingredient = selected.index(), "manual ingredient armed");
            return Ok(State::ManualArmed(selected));
        }
        if selected == highlighted {
            self.idle();
        }
        Ok(State::ManualSelectIngredient(selected))
    }

    fn on_manual_dispense(&mut self, ingredient: Ingredient) -> Result<State> {
        self.cancel.clear();
        let actuation = self
            .sequencer
            .actuate(ingredient, Percentage::FULL, Some(&self.cancel))?;
        let outcome = match actuation.outcome {
            ActuationOutcome::Cancelled => ManualOutcome::Cancelled,
            ActuationOutcome::Completed | ActuationOutcome::Skipped => ManualOutcome::Completed,
        };
        info!(ingredient = ingredient.index(), ?outcome, "manual dispense finished");
        self.report = Some(SessionReport::Manual { ingredient, outcome });
        Ok(State::ManualDone(outcome))
    }

    fn name(&self, ingredient: Ingredient) -> &str {
        &self.panel.names[ingredient.index()]
    }

    fn draw(&mut self, (row0, row1): Screen) -> Result<()> {
        screens::show(&mut *self.display, row0, row1, self.panel.cols)
    }

    fn draw_allocation(&mut self, ingredient: Ingredient) -> Result<()> {
        let name = self.name(ingredient).to_string();
        let value = self.engine.working().to_string();
        screens::show(&mut *self.display, &name, &value, self.panel.cols)
    }

    fn notice(&mut self, screen: Screen) -> Result<()> {
        debug!(row0 = screen.0, row1 = screen.1, "notice");
        self.draw(screen)?;
        self.clock.sleep(self.timing.notice);
        Ok(())
    }

    fn idle(&self) {
        self.clock.sleep(self.timing.poll);
    }
}
