//! Foreground loop: step the dispenser until told to stop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::error::Result;
use crate::machine::{Dispenser, SessionReport};

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown flag was set (Ctrl-C).
    Shutdown,
    /// `max_sessions` sessions completed.
    SessionLimit,
    /// The machine was idle and the input source reported it has nothing left.
    InputExhausted,
}

/// Summary of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: StopReason,
    pub sessions: Vec<SessionReport>,
}

/// Run sessions until `shutdown` is set or `max_sessions` have completed.
pub fn run(
    dispenser: &mut Dispenser,
    shutdown: &Arc<AtomicBool>,
    max_sessions: Option<usize>,
) -> Result<RunSummary> {
    run_until(dispenser, shutdown, max_sessions, || false)
}

/// Like `run`, additionally returning once the machine is idle and
/// `exhausted()` reports the input source is done (end of a scripted panel).
///
/// Pumps are forced off on every exit path.
pub fn run_until<F>(
    dispenser: &mut Dispenser,
    shutdown: &Arc<AtomicBool>,
    max_sessions: Option<usize>,
    mut exhausted: F,
) -> Result<RunSummary>
where
    F: FnMut() -> bool,
{
    let result = drive(dispenser, shutdown, max_sessions, &mut exhausted);
    if let Err(e) = dispenser.stop_all_pumps() {
        warn!(error = %e, "failed to force pumps off on exit");
    }
    result
}

fn drive(
    dispenser: &mut Dispenser,
    shutdown: &Arc<AtomicBool>,
    max_sessions: Option<usize>,
    exhausted: &mut dyn FnMut() -> bool,
) -> Result<RunSummary> {
    let mut sessions = Vec::new();
    let reason = loop {
        if shutdown.load(Ordering::Relaxed) {
            break StopReason::Shutdown;
        }
        if max_sessions.is_some_and(|max| sessions.len() >= max) {
            break StopReason::SessionLimit;
        }
        if dispenser.is_idle() && exhausted() {
            break StopReason::InputExhausted;
        }
        dispenser.step()?;
        if let Some(report) = dispenser.take_report() {
            info!(session = sessions.len() + 1, ?report, "session complete");
            sessions.push(report);
        }
    };
    info!(?reason, sessions = sessions.len(), "runner stopped");
    Ok(RunSummary { reason, sessions })
}
