//! Fixed operator-facing text and a two-row render helper.
//!
//! Strings are part of the appliance's observable behavior; keep them
//! byte-for-byte.

use mixer_traits::CharDisplay;

use crate::error::Result;
use crate::hw_error::report;

/// `(row 0, row 1)` of a fixed screen.
pub type Screen = (&'static str, &'static str);

pub const MODE_SELECT: Screen = ("1. Auto Mode", "2. Manual Mode");
pub const AUTO_PROCESSING: Screen = ("Processing", "Auto Mode...");
pub const CHOOSE_PERCENTAGES: Screen = ("Select the", "Percentages..");
pub const TOTAL_RULE: Screen = ("Total should not", "exceed 100%");
pub const EXCEEDED: Screen = ("Exceeded 100%", "Try again");
pub const ORDER_ON_THE_WAY: Screen = ("Your order is", "on the way");
pub const ENJOY: Screen = ("Enjoy", "Your drink");
pub const MANUAL_PROCESSING: Screen = ("Processing", "Manual Mode...");
pub const MANUAL_RULE: Screen = ("Select only", "One Fruit!");
pub const MANUAL_ARMED: Screen = ("Push Switch 1", "to stop");
pub const CANCELLED: Screen = ("Order stopped", "");

/// Clear the display and write two rows, each truncated to `cols` characters.
pub fn show<D: CharDisplay + ?Sized>(display: &mut D, row0: &str, row1: &str, cols: u8) -> Result<()> {
    let width = usize::from(cols);
    display.clear().map_err(report)?;
    for (row, text) in [(0u8, row0), (1u8, row1)] {
        if text.is_empty() {
            continue;
        }
        display.set_cursor(0, row).map_err(report)?;
        let clipped: String = text.chars().take(width).collect();
        display.print(&clipped).map_err(report)?;
    }
    display.flush().map_err(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::BufferDisplay;

    #[test]
    fn every_fixed_screen_fits_sixteen_columns() {
        for (a, b) in [
            MODE_SELECT,
            AUTO_PROCESSING,
            CHOOSE_PERCENTAGES,
            TOTAL_RULE,
            EXCEEDED,
            ORDER_ON_THE_WAY,
            ENJOY,
            MANUAL_PROCESSING,
            MANUAL_RULE,
            MANUAL_ARMED,
            CANCELLED,
        ] {
            assert!(a.chars().count() <= 16, "{a}");
            assert!(b.chars().count() <= 16, "{b}");
        }
    }

    #[test]
    fn show_truncates_and_skips_empty_rows() {
        let mut lcd = BufferDisplay::new();
        show(&mut lcd, "PINEAPPLE JUICE!!", "", 8).unwrap();
        assert_eq!(
            lcd.last_frame().unwrap(),
            ["PINEAPPL".to_string(), String::new()]
        );
    }
}
