use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MixerError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("invalid percentage {0}% (must be one of 0, 20, 40, 60, 80, 100)")]
    InvalidPercentage(u8),
    #[error("invalid ingredient slot {0} (must be 0..=3)")]
    InvalidIngredient(u8),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing input pins")]
    MissingInputs,
    #[error("missing pumps")]
    MissingPumps,
    #[error("missing display")]
    MissingDisplay,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
