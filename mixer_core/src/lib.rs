#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core dispensing logic (hardware-agnostic).
//!
//! All hardware interaction goes through the `mixer_traits` collaborator
//! traits: `InputPins`, `Pumps` and `CharDisplay`.
//!
//! ## Architecture
//!
//! - **Input**: debounced switch presses and encoder steps (`input`)
//! - **Allocation**: per-ingredient percentages, total ≤ 100% (`allocation`)
//! - **Calibration**: percentage → pump run time (`calibration`)
//! - **Sequencer**: cancellable, tick-paced pump actuation (`sequencer`)
//! - **Cancellation**: flag raised from a background watcher (`cancel`)
//! - **State machine**: Auto and Manual workflows (`machine`, `runner`)

pub mod allocation;
pub mod builder;
pub mod calibration;
pub mod cancel;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod input;
pub mod machine;
pub mod mocks;
pub mod runner;
pub mod screens;
pub mod sequencer;
pub mod types;

use std::sync::Arc;

use mixer_traits::Clock;

/// Clock handle shared by the input layer, the sequencer and the machine.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

pub use allocation::{Allocation, AllocationEngine, TotalCheck};
pub use builder::DispenserBuilder;
pub use calibration::CalibrationTable;
pub use cancel::{CancelFlag, CancelWatcher, on_cancel_edge};
pub use config::{DebounceMode, EncoderMode, InputCfg, PanelCfg, TimingCfg};
pub use error::{BuildError, MixerError, Result};
pub use input::{Edge, PanelInput};
pub use machine::{Dispenser, ManualOutcome, Mode, SessionReport, State};
pub use sequencer::{Actuation, ActuationOutcome, Sequencer};
pub use types::{Direction, INGREDIENT_COUNT, Ingredient, Percentage};
