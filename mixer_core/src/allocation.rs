//! Per-ingredient percentage allocation for Auto mode.
//!
//! Ingredients are visited strictly in order 0..=3. A working value is
//! adjusted with the encoder and committed with the confirm switch; once all
//! four are committed the total is checked. An over-100% allocation must be
//! discarded in full (`begin` again); nothing partial is ever dispensed.

use crate::error::MixerError;
use crate::types::{Direction, INGREDIENT_COUNT, Ingredient, Percentage};

/// Completed, validated allocation (total ≤ 100). Only `AllocationEngine`
/// can produce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation([Percentage; INGREDIENT_COUNT]);

impl Allocation {
    pub fn get(&self, ingredient: Ingredient) -> Percentage {
        self.0[ingredient.index()]
    }

    pub fn total(&self) -> u16 {
        self.0.iter().map(|p| u16::from(p.value())).sum()
    }

    /// `(ingredient, percentage)` in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Ingredient, Percentage)> + '_ {
        Ingredient::ALL.into_iter().zip(self.0.iter().copied())
    }
}

/// Outcome of the final total check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalCheck {
    Ok(Allocation),
    Exceeded { total: u16 },
}

#[derive(Debug, Clone, Default)]
pub struct AllocationEngine {
    committed: [Percentage; INGREDIENT_COUNT],
    /// Number of ingredients committed so far; the cursor ingredient is at this index.
    filled: usize,
    working: Percentage,
}

impl AllocationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) a session: every entry back to 0, cursor on ingredient 0.
    pub fn begin(&mut self) {
        *self = Self::default();
    }

    /// Ingredient awaiting a value, `None` once complete.
    pub fn current(&self) -> Option<Ingredient> {
        Ingredient::ALL.get(self.filled).copied()
    }

    /// Value shown for the current ingredient.
    pub fn working(&self) -> Percentage {
        self.working
    }

    /// Move the working value one step; no-op at 0 and 100.
    pub fn adjust(&mut self, dir: Direction) -> Percentage {
        self.working = self.working.stepped(dir);
        self.working
    }

    /// Commit `value` for `ingredient`, which must be the current one.
    pub fn commit(&mut self, ingredient: Ingredient, value: Percentage) -> Result<(), MixerError> {
        match self.current() {
            Some(expected) if expected == ingredient => {
                self.committed[ingredient.index()] = value;
                self.filled += 1;
                self.working = Percentage::ZERO;
                Ok(())
            }
            Some(expected) => Err(MixerError::State(format!(
                "ingredient {} committed out of order (expected {})",
                ingredient.index(),
                expected.index()
            ))),
            None => Err(MixerError::State("allocation already complete".into())),
        }
    }

    /// Commit the working value for the current ingredient and return it.
    pub fn commit_current(&mut self) -> Result<Ingredient, MixerError> {
        let ingredient = self
            .current()
            .ok_or_else(|| MixerError::State("allocation already complete".into()))?;
        self.commit(ingredient, self.working)?;
        Ok(ingredient)
    }

    pub fn is_complete(&self) -> bool {
        self.filled == INGREDIENT_COUNT
    }

    /// Committed value for `ingredient` (0 if not yet committed).
    pub fn committed(&self, ingredient: Ingredient) -> Percentage {
        self.committed[ingredient.index()]
    }

    /// Check the completed allocation against the 100% ceiling.
    pub fn validate_total(&self) -> Result<TotalCheck, MixerError> {
        if !self.is_complete() {
            return Err(MixerError::State(format!(
                "allocation incomplete ({} of {INGREDIENT_COUNT} committed)",
                self.filled
            )));
        }
        let total: u16 = self.committed.iter().map(|p| u16::from(p.value())).sum();
        if total > 100 {
            Ok(TotalCheck::Exceeded { total })
        } else {
            Ok(TotalCheck::Ok(Allocation(self.committed)))
        }
    }
}
