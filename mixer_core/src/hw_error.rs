//! Maps `Box<dyn Error>` from trait boundaries to typed `MixerError`.
//!
//! The traits in `mixer_traits` use `Box<dyn Error + Send + Sync>` so that any
//! backend can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `mixer_hardware::HwError`.

use crate::error::MixerError;

/// Map a trait-boundary error to a typed `MixerError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> MixerError {
    #[cfg(feature = "hardware-errors")]
    {
        use mixer_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::InvalidSlot(slot) => MixerError::InvalidIngredient(*slot),
                HwError::DisplayRange { .. } => MixerError::State(hw.to_string()),
                other => MixerError::HardwareFault(other.to_string()),
            };
        }
    }

    MixerError::Hardware(e.to_string())
}

/// Convenience for `.map_err(...)` on collaborator calls.
pub(crate) fn report(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    eyre::Report::new(map_hw_error(&*e))
}
