//! Collaborator boundary for the dispenser core.
//!
//! The core never touches GPIO or the display driver directly; it only talks
//! to these traits. Errors cross the boundary boxed so that simulated and
//! real backends can report whatever they like.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boxed error type used at every collaborator boundary.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Logical input lines of the operator panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputLine {
    /// Auto mode entry switch ("Switch 1").
    AutoSwitch,
    /// Manual mode entry switch ("Switch 2").
    ManualSwitch,
    /// Confirm switch used to commit a percentage or arm an ingredient.
    ConfirmSwitch,
    /// Dedicated cancel input watched by the background handler.
    CancelSwitch,
    /// Rotary encoder clock line.
    EncoderClk,
    /// Rotary encoder data line.
    EncoderDt,
}

impl InputLine {
    pub const ALL: [InputLine; 6] = [
        InputLine::AutoSwitch,
        InputLine::ManualSwitch,
        InputLine::ConfirmSwitch,
        InputLine::CancelSwitch,
        InputLine::EncoderClk,
        InputLine::EncoderDt,
    ];
}

/// Raw digital inputs. Implementations report the electrical level; the core
/// applies the active-low interpretation for switches.
pub trait InputPins {
    fn is_high(&mut self, line: InputLine) -> HwResult<bool>;
}

/// One actuator per ingredient slot (0..=3).
///
/// `start` energizes the pump, `stop` de-energizes it. Polarity of the
/// physical line is the implementation's business.
pub trait Pumps {
    fn start(&mut self, slot: u8) -> HwResult<()>;
    fn stop(&mut self, slot: u8) -> HwResult<()>;

    /// Force every slot off; keeps going after a failure and reports the first one.
    fn stop_all(&mut self) -> HwResult<()> {
        let mut first_err = None;
        for slot in 0..4 {
            if let Err(e) = self.stop(slot) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Write-only two-row character display.
pub trait CharDisplay {
    fn clear(&mut self) -> HwResult<()>;
    fn set_cursor(&mut self, col: u8, row: u8) -> HwResult<()>;
    fn print(&mut self, text: &str) -> HwResult<()>;

    /// Called once a full screen has been written. LCD modules render as
    /// bytes arrive and ignore it; buffered backends present the frame here.
    fn flush(&mut self) -> HwResult<()> {
        Ok(())
    }
}

impl<T: InputPins + ?Sized> InputPins for Box<T> {
    fn is_high(&mut self, line: InputLine) -> HwResult<bool> {
        (**self).is_high(line)
    }
}

impl<T: Pumps + ?Sized> Pumps for Box<T> {
    fn start(&mut self, slot: u8) -> HwResult<()> {
        (**self).start(slot)
    }
    fn stop(&mut self, slot: u8) -> HwResult<()> {
        (**self).stop(slot)
    }
    fn stop_all(&mut self) -> HwResult<()> {
        (**self).stop_all()
    }
}

impl<T: CharDisplay + ?Sized> CharDisplay for Box<T> {
    fn clear(&mut self) -> HwResult<()> {
        (**self).clear()
    }
    fn set_cursor(&mut self, col: u8, row: u8) -> HwResult<()> {
        (**self).set_cursor(col, row)
    }
    fn print(&mut self, text: &str) -> HwResult<()> {
        (**self).print(text)
    }
    fn flush(&mut self) -> HwResult<()> {
        (**self).flush()
    }
}
