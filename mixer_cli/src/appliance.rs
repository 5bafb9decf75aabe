//! Backend assembly and command execution: run, dispense, table, self-check.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mixer_config::{Calibration, Config};
use mixer_core::runner::{self, RunSummary};
use mixer_core::{
    Actuation, CalibrationTable, CancelFlag, CancelWatcher, Dispenser, Ingredient, InputCfg,
    PanelCfg, Percentage, Sequencer, SessionReport, SharedClock, TimingCfg,
};
use mixer_hardware::TerminalDisplay;
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
use mixer_hardware::{PanelAction, SimulatedPanel};
use mixer_traits::{InputLine, InputPins, MonotonicClock, Pumps};
use serde_json::json;

/// Where the simulated panel takes its operator actions from.
pub enum PanelSource<'a> {
    Script(&'a Path),
    Stdin,
    /// No operator at all.
    Idle,
}

fn clock() -> SharedClock {
    Arc::new(MonotonicClock::new())
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
type Panel = mixer_hardware::gpio::GpioPanel;
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
type Panel = SimulatedPanel;

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_panel(cfg: &Config, source: PanelSource<'_>, _clock: &SharedClock) -> eyre::Result<Panel> {
    if matches!(source, PanelSource::Script(_)) {
        tracing::warn!("--script is ignored with the hardware panel");
    }
    let pins = mixer_hardware::gpio::PanelPins {
        auto_switch: cfg.pins.auto_switch,
        manual_switch: cfg.pins.manual_switch,
        confirm_switch: cfg.pins.confirm_switch,
        cancel_switch: cfg.pins.cancel_switch,
        encoder_clk: cfg.pins.encoder_clk,
        encoder_dt: cfg.pins.encoder_dt,
    };
    mixer_hardware::gpio::GpioPanel::new(pins).map_err(hw)
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_panel(_cfg: &Config, source: PanelSource<'_>, clock: &SharedClock) -> eyre::Result<Panel> {
    use eyre::WrapErr;
    match source {
        PanelSource::Script(path) => {
            let text = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("read panel script {}", path.display()))?;
            let script = mixer_hardware::parse_script(&text)
                .wrap_err_with(|| format!("parse panel script {}", path.display()))?;
            tracing::info!(actions = script.len(), "replaying panel script");
            Ok(SimulatedPanel::scripted(script, clock.clone()))
        }
        PanelSource::Stdin => {
            let (panel, tx) = SimulatedPanel::live(clock.clone());
            spawn_stdin_reader(move |action| tx.send(action).is_ok());
            Ok(panel)
        }
        PanelSource::Idle => Ok(SimulatedPanel::scripted(Vec::new(), clock.clone())),
    }
}

/// A physical panel never runs out of input.
#[cfg(all(feature = "hardware", target_os = "linux"))]
fn input_exhausted(_panel: &Panel) -> bool {
    false
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn input_exhausted(panel: &Panel) -> bool {
    panel.script_done()
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_pumps(cfg: &Config) -> eyre::Result<mixer_hardware::gpio::GpioPumps> {
    mixer_hardware::gpio::GpioPumps::new(cfg.pins.pumps).map_err(hw)
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_pumps(_cfg: &Config) -> eyre::Result<mixer_hardware::SimulatedPumps> {
    Ok(mixer_hardware::SimulatedPumps::new())
}

fn hw(e: mixer_hardware::error::HwError) -> eyre::Report {
    eyre::Report::new(mixer_core::hw_error::map_hw_error(&e))
}

fn boundary(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    eyre::Report::new(mixer_core::hw_error::map_hw_error(&*e))
}

/// Cancel input, read from a private handle of a shared panel.
fn cancel_line<P>(panel: &P, active_low: bool) -> impl Fn() -> bool + Send + 'static
where
    P: InputPins + Clone + Send + 'static,
{
    let probe = Mutex::new(panel.clone());
    move || {
        probe
            .lock()
            .ok()
            .and_then(|mut p| p.is_high(InputLine::CancelSwitch).ok())
            .is_some_and(|high| high != active_low)
    }
}

/// Run the appliance until Ctrl-C, the session limit, or the end of the
/// operator input.
pub fn run_appliance(
    cfg: &Config,
    calibration: &Calibration,
    source: PanelSource<'_>,
    sessions: Option<usize>,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<RunSummary> {
    let clock = clock();
    let panel = open_panel(cfg, source, &clock)?;
    let pumps = open_pumps(cfg)?;
    let probe = panel.clone();
    drive(
        cfg,
        calibration,
        clock,
        panel,
        pumps,
        sessions,
        shutdown,
        move || input_exhausted(&probe),
    )
}

#[allow(clippy::too_many_arguments)]
fn drive<P, U>(
    cfg: &Config,
    calibration: &Calibration,
    clock: SharedClock,
    panel: P,
    pumps: U,
    sessions: Option<usize>,
    shutdown: &Arc<AtomicBool>,
    exhausted: impl FnMut() -> bool,
) -> eyre::Result<RunSummary>
where
    P: InputPins + Clone + Send + 'static,
    U: Pumps + Send + 'static,
{
    let input = InputCfg::from(&cfg.input);
    let cancel = CancelFlag::new();
    let line = cancel_line(&panel, input.active_low);
    let stop = shutdown.clone();
    let _watcher = CancelWatcher::spawn(
        move || line() || stop.load(Ordering::Relaxed),
        Duration::from_millis(cfg.cancel.poll_ms),
        cancel.clone(),
    );

    let mut dispenser = Dispenser::builder()
        .with_inputs(panel)
        .with_pumps(pumps)
        .with_display(TerminalDisplay::new(cfg.display.cols))
        .with_clock(clock)
        .with_input_cfg(input)
        .with_timing(TimingCfg::from(&cfg.timing))
        .with_panel(PanelCfg::from(cfg))
        .with_calibration(CalibrationTable::from(calibration))
        .with_cancel_flag(cancel)
        .build()?;
    tracing::info!(?sessions, "dispenser ready");

    runner::run_until(&mut dispenser, shutdown, sessions, exhausted)
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn spawn_stdin_reader<F>(mut send: F)
where
    F: FnMut(PanelAction) -> bool + Send + 'static,
{
    use std::io::BufRead;
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let line = line.split('#').next().unwrap_or("").trim().to_string();
            if line.is_empty() {
                continue;
            }
            match line.parse::<PanelAction>() {
                Ok(action) => {
                    if !send(action) {
                        break;
                    }
                }
                Err(msg) => tracing::warn!(%msg, "ignoring panel input"),
            }
        }
        tracing::debug!("stdin closed");
    });
}

/// One actuation outside the state machine. Ctrl-C cancels it.
pub fn run_dispense(
    cfg: &Config,
    calibration: &Calibration,
    ingredient: u8,
    percent: u8,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<Actuation> {
    let ingredient = Ingredient::new(ingredient).map_err(eyre::Report::new)?;
    let percentage = Percentage::try_new(percent).map_err(eyre::Report::new)?;

    let cancel = CancelFlag::new();
    let stop = shutdown.clone();
    let _watcher = CancelWatcher::spawn(
        move || stop.load(Ordering::Relaxed),
        Duration::from_millis(cfg.cancel.poll_ms),
        cancel.clone(),
    );

    let timing = TimingCfg::from(&cfg.timing);
    let mut sequencer = Sequencer::new(
        Box::new(open_pumps(cfg)?),
        clock(),
        CalibrationTable::from(calibration),
        timing.tick,
    );
    let result = sequencer.actuate(ingredient, percentage, Some(&cancel));
    if let Err(e) = sequencer.stop_all() {
        tracing::warn!(error = %e, "failed to force pumps off");
    }
    result
}

/// Open every backend, force the pumps off and touch each input line.
pub fn self_check(cfg: &Config) -> eyre::Result<()> {
    let mut pumps = open_pumps(cfg)?;
    pumps.stop_all().map_err(boundary)?;

    let mut panel = open_panel(cfg, PanelSource::Idle, &clock())?;
    for line in InputLine::ALL {
        let high = panel.is_high(line).map_err(boundary)?;
        tracing::debug!(?line, high, "input line");
    }
    tracing::info!("self-check passed");
    Ok(())
}

/// Text rendering of the calibration table.
pub fn table_text(calibration: &Calibration) -> String {
    let mut out = String::from("percent  duration\n");
    for (p, d) in CalibrationTable::from(calibration).entries() {
        out.push_str(&format!("{:>7}  {} ms\n", p.to_string(), d.as_millis()));
    }
    out
}

pub fn table_json(calibration: &Calibration) -> serde_json::Value {
    let rows: Vec<_> = CalibrationTable::from(calibration)
        .entries()
        .map(|(p, d)| json!({ "percent": p.value(), "ms": d.as_millis() }))
        .collect();
    json!(rows)
}

fn actuation_json(a: &Actuation, names: &[String; 4]) -> serde_json::Value {
    json!({
        "ingredient": names[a.ingredient.index()],
        "percent": a.percentage.value(),
        "outcome": format!("{:?}", a.outcome),
        "elapsed_ms": a.elapsed.as_millis(),
    })
}

pub fn dispense_json(a: &Actuation, names: &[String; 4]) -> serde_json::Value {
    actuation_json(a, names)
}

pub fn dispense_text(a: &Actuation, names: &[String; 4]) -> String {
    format!(
        "{} {}: {:?} after {} ms",
        names[a.ingredient.index()],
        a.percentage,
        a.outcome,
        a.elapsed.as_millis()
    )
}

pub fn summary_json(summary: &RunSummary, names: &[String; 4]) -> serde_json::Value {
    let sessions: Vec<_> = summary
        .sessions
        .iter()
        .map(|s| match s {
            SessionReport::Auto {
                allocation,
                actuations,
            } => json!({
                "mode": "auto",
                "total": allocation.total(),
                "actuations": actuations
                    .iter()
                    .map(|a| actuation_json(a, names))
                    .collect::<Vec<_>>(),
            }),
            SessionReport::Manual { ingredient, outcome } => json!({
                "mode": "manual",
                "ingredient": names[ingredient.index()],
                "outcome": format!("{outcome:?}"),
            }),
        })
        .collect();
    json!({ "stopped": format!("{:?}", summary.reason), "sessions": sessions })
}

pub fn summary_text(summary: &RunSummary, names: &[String; 4]) -> String {
    let mut out = String::new();
    for (n, s) in summary.sessions.iter().enumerate() {
        let line = match s {
            SessionReport::Auto { allocation, .. } => {
                let parts: Vec<String> = allocation
                    .iter()
                    .map(|(i, p)| format!("{} {p}", names[i.index()]))
                    .collect();
                format!("auto: {} (total {}%)", parts.join(", "), allocation.total())
            }
            SessionReport::Manual { ingredient, outcome } => {
                format!("manual: {} {outcome:?}", names[ingredient.index()])
            }
        };
        out.push_str(&format!("session {}: {line}\n", n + 1));
    }
    out.push_str(&format!("stopped: {:?}\n", summary.reason));
    out
}
