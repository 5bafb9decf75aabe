//! State machine walk-throughs on a fake panel and a simulated clock.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mixer_core::mocks::{BufferDisplay, FakePanel, RecordingPumps};
use mixer_core::{
    CancelFlag, DebounceMode, Direction, Dispenser, Ingredient, InputCfg, ManualOutcome, Mode,
    SessionReport, State,
};
use mixer_traits::clock::test_clock::TestClock;
use mixer_traits::{Clock, InputLine};

/// Test clock that raises a cancel flag once armed and a deadline passes.
#[derive(Clone)]
struct CancelAt {
    inner: TestClock,
    flag: CancelFlag,
    deadline: Arc<Mutex<Option<Instant>>>,
}

impl Clock for CancelAt {
    fn now(&self) -> Instant {
        self.inner.now()
    }
    fn sleep(&self, d: Duration) {
        self.inner.sleep(d);
        if let Some(at) = *self.deadline.lock().unwrap() {
            if self.inner.now() >= at {
                self.flag.raise();
            }
        }
    }
}

struct Rig {
    panel: FakePanel,
    pumps: RecordingPumps,
    lcd: BufferDisplay,
    clock: CancelAt,
    d: Dispenser,
}

impl Rig {
    fn new() -> Self {
        let flag = CancelFlag::new();
        let clock = CancelAt {
            inner: TestClock::new(),
            flag: flag.clone(),
            deadline: Arc::new(Mutex::new(None)),
        };
        let shared = Arc::new(clock.clone());
        let panel = FakePanel::new();
        let pumps = RecordingPumps::with_clock(shared.clone());
        let lcd = BufferDisplay::new();
        // Recheck: a press held for exactly one step is reported once.
        let d = Dispenser::builder()
            .with_inputs(panel.clone())
            .with_pumps(pumps.clone())
            .with_display(lcd.clone())
            .with_clock(shared)
            .with_cancel_flag(flag)
            .with_input_cfg(InputCfg {
                debounce: DebounceMode::Recheck,
                ..InputCfg::default()
            })
            .build()
            .expect("build");
        Self {
            panel,
            pumps,
            lcd,
            clock,
            d,
        }
    }

    fn step(&mut self) -> State {
        self.d.step().unwrap_or_else(|e| panic!("step: {e}"))
    }

    fn click(&mut self, line: InputLine) -> State {
        self.panel.press(line);
        let s = self.step();
        self.panel.release(line);
        s
    }

    fn turn(&mut self, dir: Direction) -> State {
        self.panel.turn(dir);
        self.step()
    }

    fn enter_auto(&mut self) {
        assert_eq!(self.step(), State::ModeSelect);
        assert_eq!(self.click(InputLine::AutoSwitch), State::AutoProcessing);
        assert_eq!(self.step(), State::AutoAllocate(Ingredient::FIRST));
    }

    /// Dial `pct` for the current ingredient and confirm.
    fn allocate(&mut self, pct: u8) -> State {
        for _ in 0..pct / 20 {
            self.turn(Direction::Clockwise);
        }
        self.click(InputLine::ConfirmSwitch)
    }

    fn enter_manual(&mut self) {
        assert_eq!(self.step(), State::ModeSelect);
        assert_eq!(self.click(InputLine::ManualSwitch), State::ManualProcessing);
        assert_eq!(
            self.step(),
            State::ManualSelectIngredient(Ingredient::FIRST)
        );
    }
}

fn rows(a: &str, b: &str) -> [String; 2] {
    [a.to_string(), b.to_string()]
}

#[test]
fn auto_session_with_eighty_percent_dispenses_all_four() {
    let mut r = Rig::new();
    r.enter_auto();
    assert!(r.lcd.showed("Processing", "Auto Mode..."));
    assert!(r.lcd.showed("Select the", "Percentages.."));
    assert!(r.lcd.showed("Total should not", "exceed 100%"));
    assert_eq!(r.lcd.last_frame().unwrap(), rows("PINEAPPLE", "0%"));

    assert_eq!(r.allocate(20), State::AutoAllocate(Ingredient::ALL[1]));
    assert!(r.lcd.showed("PINEAPPLE", "20%"));
    assert_eq!(r.lcd.last_frame().unwrap(), rows("MANGO", "0%"));
    assert_eq!(r.allocate(20), State::AutoAllocate(Ingredient::ALL[2]));
    assert_eq!(r.allocate(20), State::AutoAllocate(Ingredient::ALL[3]));
    assert_eq!(r.allocate(20), State::AutoValidate);

    assert_eq!(r.step(), State::AutoDispense);
    assert_eq!(r.lcd.last_frame().unwrap(), rows("Your order is", "on the way"));
    assert_eq!(r.step(), State::AutoComplete);
    assert_eq!(
        r.pumps.on_durations(),
        vec![(0, 2180), (1, 2180), (2, 2180), (3, 2180)]
    );
    assert_eq!(r.step(), State::ModeSelect);
    assert!(r.lcd.showed("Enjoy", "Your drink"));
    assert_eq!(r.lcd.last_frame().unwrap(), rows("1. Auto Mode", "2. Manual Mode"));

    match r.d.take_report() {
        Some(SessionReport::Auto { allocation, actuations }) => {
            assert_eq!(allocation.total(), 80);
            assert_eq!(actuations.len(), 4);
        }
        other => panic!("expected auto report, got {other:?}"),
    }
    assert!(!r.pumps.any_running());
}

#[test]
fn over_one_hundred_percent_restarts_allocation_without_dispensing() {
    let mut r = Rig::new();
    r.enter_auto();
    for _ in 0..3 {
        r.allocate(40);
    }
    assert_eq!(r.allocate(40), State::AutoValidate);

    // Knob movement while the notice is up is not carried into the restart.
    r.panel.turn(Direction::Clockwise);
    assert_eq!(r.step(), State::AutoAllocate(Ingredient::FIRST));
    assert!(r.lcd.showed("Exceeded 100%", "Try again"));
    assert_eq!(r.lcd.last_frame().unwrap(), rows("PINEAPPLE", "0%"));
    assert_eq!(r.step(), State::AutoAllocate(Ingredient::FIRST));
    assert_eq!(r.lcd.last_frame().unwrap(), rows("PINEAPPLE", "0%"));
    assert!(r.pumps.events().is_empty());
    assert_eq!(r.d.take_report(), None);

    // A fresh, valid allocation then goes through.
    assert_eq!(r.allocate(100), State::AutoAllocate(Ingredient::ALL[1]));
    r.allocate(0);
    r.allocate(0);
    assert_eq!(r.allocate(0), State::AutoValidate);
    assert_eq!(r.step(), State::AutoDispense);
    r.step();
    assert_eq!(r.pumps.on_durations(), vec![(0, 8110)]);
}

#[test]
fn encoder_clamps_at_both_ends() {
    let mut r = Rig::new();
    r.enter_auto();
    r.turn(Direction::CounterClockwise);
    assert_eq!(r.lcd.last_frame().unwrap(), rows("PINEAPPLE", "0%"));
    for _ in 0..7 {
        r.turn(Direction::Clockwise);
    }
    assert_eq!(r.lcd.last_frame().unwrap(), rows("PINEAPPLE", "100%"));
    r.turn(Direction::CounterClockwise);
    assert_eq!(r.lcd.last_frame().unwrap(), rows("PINEAPPLE", "80%"));
}

#[test]
fn manual_switch_is_ignored_outside_mode_select() {
    let mut r = Rig::new();
    r.enter_auto();
    assert_eq!(
        r.click(InputLine::ManualSwitch),
        State::AutoAllocate(Ingredient::FIRST)
    );
    assert_eq!(r.d.state().mode(), Mode::Auto);
}

#[test]
fn manual_selection_wraps_around() {
    let mut r = Rig::new();
    r.enter_manual();
    assert!(r.lcd.showed("Processing", "Manual Mode..."));
    assert!(r.lcd.showed("Select only", "One Fruit!"));
    assert_eq!(
        r.turn(Direction::CounterClockwise),
        State::ManualSelectIngredient(Ingredient::ALL[3])
    );
    assert_eq!(r.lcd.last_frame().unwrap(), rows("ORANGE", ""));
    assert_eq!(
        r.turn(Direction::Clockwise),
        State::ManualSelectIngredient(Ingredient::FIRST)
    );
}

#[test]
fn manual_dispense_runs_full_calibration_when_uninterrupted() {
    let mut r = Rig::new();
    r.enter_manual();
    r.turn(Direction::Clockwise);
    assert_eq!(
        r.click(InputLine::ConfirmSwitch),
        State::ManualArmed(Ingredient::ALL[1])
    );
    assert_eq!(r.lcd.last_frame().unwrap(), rows("Push Switch 1", "to stop"));
    assert_eq!(r.step(), State::ManualDispense(Ingredient::ALL[1]));
    assert_eq!(r.step(), State::ManualDone(ManualOutcome::Completed));
    assert_eq!(r.pumps.on_durations(), vec![(1, 8110)]);
    assert_eq!(r.step(), State::ModeSelect);
    assert!(r.lcd.showed("Enjoy", "Your drink"));
    assert_eq!(
        r.d.take_report(),
        Some(SessionReport::Manual {
            ingredient: Ingredient::ALL[1],
            outcome: ManualOutcome::Completed
        })
    );
}

#[test]
fn manual_dispense_cancelled_midway_turns_pump_off() {
    let mut r = Rig::new();
    r.enter_manual();
    r.turn(Direction::Clockwise);
    r.turn(Direction::Clockwise);
    assert_eq!(
        r.click(InputLine::ConfirmSwitch),
        State::ManualArmed(Ingredient::ALL[2])
    );
    assert_eq!(r.step(), State::ManualDispense(Ingredient::ALL[2]));

    *r.clock.deadline.lock().unwrap() = Some(r.clock.now() + Duration::from_millis(500));
    assert_eq!(r.step(), State::ManualDone(ManualOutcome::Cancelled));
    assert!(!r.pumps.is_running(2));
    let on = r.pumps.on_durations();
    assert_eq!(on.len(), 1);
    assert!(on[0].1 <= 501, "pump ran {} ms", on[0].1);

    assert_eq!(r.step(), State::ModeSelect);
    assert!(r.lcd.showed("Order stopped", ""));
    assert_eq!(
        r.d.take_report(),
        Some(SessionReport::Manual {
            ingredient: Ingredient::ALL[2],
            outcome: ManualOutcome::Cancelled
        })
    );
}

#[test]
fn stale_cancel_is_cleared_when_a_manual_session_starts() {
    let mut r = Rig::new();
    r.d.cancel_flag().raise();
    r.enter_manual();
    assert!(!r.d.cancel_flag().is_raised());
    r.click(InputLine::ConfirmSwitch);
    r.step();
    assert_eq!(r.step(), State::ManualDone(ManualOutcome::Completed));
    assert_eq!(r.pumps.on_durations(), vec![(0, 8110)]);
}

