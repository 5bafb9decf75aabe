#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and calibration parsing for the beverage dispenser.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - The percentage→duration table can come from `[calibration]` or from a
//!   CSV file with the exact header `percent,ms`.
use serde::Deserialize;

/// Percent steps the calibration table is indexed by.
pub const PERCENT_STEPS: [u8; 6] = [0, 20, 40, 60, 80, 100];

/// Factory calibration measured on the reference pumps (ms per step).
pub const DEFAULT_DURATIONS_MS: [u64; 6] = [0, 2180, 4110, 5730, 6970, 8110];

/// BCM pin numbers; only read by the `hardware` backend.
#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    pub auto_switch: u8,
    pub manual_switch: u8,
    pub confirm_switch: u8,
    /// May be the same line as `auto_switch` ("Push Switch 1 to stop").
    pub cancel_switch: u8,
    pub encoder_clk: u8,
    pub encoder_dt: u8,
    pub pumps: [u8; 4],
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DebounceMode {
    /// Report a press once; re-arm after the line is seen released.
    #[default]
    Edge,
    /// Sample, wait `settle_ms`, sample again; a held switch re-reports.
    Recheck,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EncoderMode {
    /// One step per clock-line transition, direction from the data line.
    #[default]
    HalfStep,
    /// Full Gray-code transition table on both lines.
    Quadrature,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputCfg {
    /// Treat low level as pressed when true
    pub active_low: bool,
    pub settle_ms: u64,
    pub debounce: DebounceMode,
    pub encoder: EncoderMode,
}

impl Default for InputCfg {
    fn default() -> Self {
        Self {
            active_low: true,
            settle_ms: 50,
            debounce: DebounceMode::Edge,
            encoder: EncoderMode::HalfStep,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimingCfg {
    /// Foreground polling period
    pub poll_ms: u64,
    /// How long fixed notices stay on screen
    pub notice_ms: u64,
    /// One sequencer increment
    pub tick_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            poll_ms: 50,
            notice_ms: 4000,
            tick_ms: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CancelCfg {
    /// Polling interval of the background cancel watcher
    pub poll_ms: u64,
}

impl Default for CancelCfg {
    fn default() -> Self {
        Self { poll_ms: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Ingredients {
    pub names: [String; 4],
}

impl Default for Ingredients {
    fn default() -> Self {
        Self {
            names: ["PINEAPPLE", "MANGO", "APPLE", "ORANGE"].map(String::from),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationCfg {
    pub durations_ms: Vec<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayCfg {
    pub cols: u8,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self { cols: 16 }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub input: InputCfg,
    #[serde(default)]
    pub timing: TimingCfg,
    #[serde(default)]
    pub cancel: CancelCfg,
    #[serde(default)]
    pub ingredients: Ingredients,
    /// Optional table override; the factory table is used when absent.
    #[serde(default)]
    pub calibration: Option<CalibrationCfg>,
    #[serde(default)]
    pub display: DisplayCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Validated calibration durations, one per entry of `PERCENT_STEPS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub durations_ms: [u64; 6],
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            durations_ms: DEFAULT_DURATIONS_MS,
        }
    }
}

impl Calibration {
    /// Build from a list of durations: exactly six, starting at 0, non-decreasing.
    pub fn from_durations(durations: &[u64]) -> eyre::Result<Self> {
        let durations_ms: [u64; 6] = durations.try_into().map_err(|_| {
            eyre::eyre!(
                "calibration requires exactly 6 durations (0..100% in steps of 20), got {}",
                durations.len()
            )
        })?;
        if durations_ms[0] != 0 {
            eyre::bail!(
                "calibration duration for 0% must be 0, got {}",
                durations_ms[0]
            );
        }
        if let Some(i) = durations_ms.windows(2).position(|w| w[1] < w[0]) {
            eyre::bail!(
                "calibration durations must be non-decreasing ({}% -> {}%)",
                PERCENT_STEPS[i],
                PERCENT_STEPS[i + 1]
            );
        }
        Ok(Self { durations_ms })
    }
}

/// Calibration CSV schema.
///
/// Expected headers:
/// percent,ms
///
/// Example:
/// percent,ms
/// 0,0
/// 20,2180
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub percent: u8,
    pub ms: u64,
}

impl TryFrom<Vec<CalibrationRow>> for Calibration {
    type Error = eyre::Report;
    fn try_from(mut rows: Vec<CalibrationRow>) -> Result<Self, Self::Error> {
        rows.sort_by_key(|r| r.percent);
        let percents: Vec<u8> = rows.iter().map(|r| r.percent).collect();
        if percents != PERCENT_STEPS {
            eyre::bail!(
                "calibration rows must cover percents 0,20,40,60,80,100 exactly once, got {:?}",
                percents
            );
        }
        let durations: Vec<u64> = rows.iter().map(|r| r.ms).collect();
        Self::from_durations(&durations)
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<Calibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["percent", "ms"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'percent,ms', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    Calibration::try_from(rows)
}

impl Config {
    /// Calibration from `[calibration]`, or the factory table when absent.
    pub fn calibration(&self) -> eyre::Result<Calibration> {
        match &self.calibration {
            Some(c) => Calibration::from_durations(&c.durations_ms),
            None => Ok(Calibration::default()),
        }
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Input
        if self.input.settle_ms > 1000 {
            eyre::bail!("input.settle_ms is unreasonably large (>1s)");
        }

        // Timing
        if self.timing.poll_ms == 0 {
            eyre::bail!("timing.poll_ms must be >= 1");
        }
        if self.timing.tick_ms == 0 {
            eyre::bail!("timing.tick_ms must be >= 1");
        }
        if self.timing.notice_ms > 60 * 1000 {
            eyre::bail!("timing.notice_ms is unreasonably large (>60s)");
        }

        // Cancel watcher
        if self.cancel.poll_ms == 0 {
            eyre::bail!("cancel.poll_ms must be >= 1");
        }

        // Display
        if self.display.cols < 8 {
            eyre::bail!("display.cols must be >= 8");
        }

        // Ingredients
        for (i, name) in self.ingredients.names.iter().enumerate() {
            if name.trim().is_empty() {
                eyre::bail!("ingredients.names[{i}] must not be blank");
            }
            if name.chars().count() > usize::from(self.display.cols) {
                eyre::bail!(
                    "ingredients.names[{i}] is wider than display.cols ({})",
                    self.display.cols
                );
            }
        }

        // Pins: pumps must be distinct from each other and from inputs
        let p = &self.pins;
        for (i, a) in p.pumps.iter().enumerate() {
            if p.pumps[i + 1..].contains(a) {
                eyre::bail!("pins.pumps contains duplicate pin {a}");
            }
            let inputs = [
                p.auto_switch,
                p.manual_switch,
                p.confirm_switch,
                p.cancel_switch,
                p.encoder_clk,
                p.encoder_dt,
            ];
            if inputs.contains(a) {
                eyre::bail!("pins.pumps pin {a} is also used as an input");
            }
        }

        // Calibration
        self.calibration()?;

        Ok(())
    }
}
