//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "mixer", version, about = "Beverage mixer controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/mixer_config.toml")]
    pub config: PathBuf,

    /// Optional calibration CSV (strict `percent,ms` header); overrides [calibration]
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the appliance: mode selection, auto and manual sessions
    Run {
        /// Panel script (`<ms> <action>` per line) for the simulated panel;
        /// without it, actions are read from stdin
        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,
        /// Stop after this many completed sessions
        #[arg(long, value_name = "N")]
        sessions: Option<usize>,
    },
    /// Run one pump for the calibrated duration of a percentage
    Dispense {
        /// Ingredient slot (0..=3)
        #[arg(long)]
        ingredient: u8,
        /// Percentage: 0, 20, 40, 60, 80 or 100
        #[arg(long)]
        percent: u8,
    },
    /// Print the calibration table in effect
    Table,
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
