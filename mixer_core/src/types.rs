//! Domain value types: ingredient slots, percentage steps, encoder direction.

use core::fmt;

use crate::error::MixerError;

/// Number of fixed ingredient slots.
pub const INGREDIENT_COUNT: usize = 4;

/// One of the four fixed dispensing slots, identified by index 0..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ingredient(u8);

impl Ingredient {
    /// All slots in traversal order.
    pub const ALL: [Ingredient; INGREDIENT_COUNT] =
        [Ingredient(0), Ingredient(1), Ingredient(2), Ingredient(3)];
    pub const FIRST: Ingredient = Ingredient(0);

    pub fn new(index: u8) -> Result<Self, MixerError> {
        if usize::from(index) < INGREDIENT_COUNT {
            Ok(Self(index))
        } else {
            Err(MixerError::InvalidIngredient(index))
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Actuator slot number passed to `Pumps`.
    #[inline]
    pub fn slot(self) -> u8 {
        self.0
    }

    /// Next slot in traversal order, `None` after the last one.
    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1).ok()
    }

    /// Next slot, wrapping 3 -> 0.
    pub fn next_wrapping(self) -> Self {
        Self((self.0 + 1) % INGREDIENT_COUNT as u8)
    }

    /// Previous slot, wrapping 0 -> 3.
    pub fn prev_wrapping(self) -> Self {
        Self((self.0 + INGREDIENT_COUNT as u8 - 1) % INGREDIENT_COUNT as u8)
    }
}

impl TryFrom<u8> for Ingredient {
    type Error = MixerError;
    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

/// Share of one ingredient, restricted to {0, 20, 40, 60, 80, 100}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percentage(u8);

impl Percentage {
    /// One encoder detent.
    pub const STEP: u8 = 20;
    pub const ZERO: Percentage = Percentage(0);
    pub const FULL: Percentage = Percentage(100);
    /// Every valid value in ascending order.
    pub const ALL: [Percentage; 6] = [
        Percentage(0),
        Percentage(20),
        Percentage(40),
        Percentage(60),
        Percentage(80),
        Percentage(100),
    ];

    pub fn try_new(value: u8) -> Result<Self, MixerError> {
        if value <= 100 && value % Self::STEP == 0 {
            Ok(Self(value))
        } else {
            Err(MixerError::InvalidPercentage(value))
        }
    }

    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Position in `ALL` (0..=5).
    #[inline]
    pub fn step_index(self) -> usize {
        usize::from(self.0 / Self::STEP)
    }

    /// One step up, saturating at 100.
    pub fn step_up(self) -> Self {
        Self((self.0 + Self::STEP).min(100))
    }

    /// One step down, saturating at 0.
    pub fn step_down(self) -> Self {
        Self(self.0.saturating_sub(Self::STEP))
    }

    pub fn stepped(self, dir: Direction) -> Self {
        match dir {
            Direction::Clockwise => self.step_up(),
            Direction::CounterClockwise => self.step_down(),
        }
    }
}

impl TryFrom<u8> for Percentage {
    type Error = MixerError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Rotation direction of one encoder step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(20)]
    #[case(100)]
    fn accepts_step_values(#[case] v: u8) {
        assert_eq!(Percentage::try_new(v).map(Percentage::value), Ok(v));
    }

    #[rstest]
    #[case(10)]
    #[case(101)]
    #[case(120)]
    #[case(255)]
    fn rejects_off_step_values(#[case] v: u8) {
        assert_eq!(Percentage::try_new(v), Err(MixerError::InvalidPercentage(v)));
    }

    #[test]
    fn steps_clamp_at_bounds() {
        assert_eq!(Percentage::FULL.step_up(), Percentage::FULL);
        assert_eq!(Percentage::ZERO.step_down(), Percentage::ZERO);
        assert_eq!(Percentage::ZERO.step_up().value(), 20);
        assert_eq!(Percentage::FULL.step_down().value(), 80);
    }

    #[test]
    fn renders_with_percent_sign() {
        assert_eq!(Percentage::ALL[3].to_string(), "60%");
    }

    #[test]
    fn ingredient_wraps_both_ways() {
        let last = Ingredient::ALL[3];
        assert_eq!(last.next_wrapping(), Ingredient::FIRST);
        assert_eq!(Ingredient::FIRST.prev_wrapping(), last);
        assert_eq!(last.next(), None);
        assert_eq!(Ingredient::FIRST.next(), Some(Ingredient::ALL[1]));
        assert_eq!(Ingredient::new(4), Err(MixerError::InvalidIngredient(4)));
    }
}
