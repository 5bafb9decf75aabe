use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("display position ({col}, {row}) is off screen")]
    DisplayRange { col: u8, row: u8 },
    #[error("no pump in slot {0}")]
    InvalidSlot(u8),
    #[error("script line {line}: {msg}")]
    Script { line: usize, msg: String },
    #[error("simulated panel state poisoned")]
    Poisoned,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
