//! Panel, pump and display backends.
//!
//! The simulated backends are always available and drive the CLI when the
//! `hardware` feature is off. With `hardware` on Linux, `gpio` provides
//! rppal-backed switch inputs and active-low pump outputs.

pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod sim;

pub use sim::{PanelAction, SimulatedPanel, SimulatedPumps, TerminalDisplay, parse_script};
