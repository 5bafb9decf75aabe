//! Human-readable error descriptions and structured JSON error formatting.

use mixer_core::error::{BuildError, MixerError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingInputs => {
                "What happened: No panel inputs were provided to the dispenser.\nLikely causes: The switch/encoder backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the panel is created successfully and passed via with_inputs(...).".to_string()
            }
            BuildError::MissingPumps => {
                "What happened: No pumps were provided to the dispenser.\nLikely causes: Pump outputs failed to initialize or were not wired into the builder.\nHow to fix: Ensure the pump bank is created successfully and passed via with_pumps(...).".to_string()
            }
            BuildError::MissingDisplay => {
                "What happened: No display was provided to the dispenser.\nLikely causes: The display backend was not wired into the builder.\nHow to fix: Pass a display via with_display(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/mixer_config.toml for a sample."
            ),
        };
    }

    if let Some(me) = err.downcast_ref::<MixerError>() {
        return match me {
            MixerError::InvalidPercentage(v) => format!(
                "What happened: {v}% is not a dispensable percentage.\nLikely causes: Only 0, 20, 40, 60, 80 and 100 have calibrated pump times.\nHow to fix: Pick one of those values (e.g., `mixer dispense --ingredient 0 --percent 40`)."
            ),
            MixerError::InvalidIngredient(slot) => format!(
                "What happened: There is no ingredient in slot {slot}.\nLikely causes: Slots are numbered 0 to 3.\nHow to fix: Pass --ingredient 0, 1, 2 or 3."
            ),
            MixerError::Hardware(_) | MixerError::HardwareFault(_) => format!(
                "What happened: {me}.\nLikely causes: Pump relay or panel wiring, GPIO permissions, or a missing backend.\nHow to fix: Check [pins] in the config and the wiring, then run `mixer self-check`."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open gpio") || lower.contains("open input pin") || lower.contains("open pump pin")
    {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("panel script") {
        let detail = err.root_cause().to_string();
        return format!(
            "What happened: Could not use the panel script ({msg}: {detail}).\nLikely causes: A missing file or a line that is not `<ms> <action>`.\nHow to fix: Use actions auto, manual, confirm, cancel, cw or ccw, one per line after a time in ms."
        );
    }

    // Calibration CSV header special-case
    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'percent,ms'.".to_string();
    }

    if lower.contains("calibration") {
        return format!(
            "What happened: The calibration table is invalid ({msg}).\nLikely causes: Not six entries, a non-zero 0% entry, or a decreasing duration.\nHow to fix: Provide durations for 0,20,40,60,80,100% starting at 0 and never decreasing."
        );
    }

    if lower.contains("config") || lower.contains("must be") {
        let detail = err.root_cause().to_string();
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}: {detail}).\nLikely causes: Missing [pins], a missing file, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable reason tag for the JSON error object.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(_) => "InvalidConfig",
            _ => "Build",
        };
    }
    match err.downcast_ref::<MixerError>() {
        Some(MixerError::InvalidPercentage(_)) => "InvalidPercentage",
        Some(MixerError::InvalidIngredient(_)) => "InvalidIngredient",
        Some(MixerError::Hardware(_) | MixerError::HardwareFault(_)) => "Hardware",
        Some(MixerError::Config(_)) => "InvalidConfig",
        Some(MixerError::State(_)) => "State",
        None if is_config_error(err) => "InvalidConfig",
        None => "Error",
    }
}

/// Exit code 2 for invalid input or configuration, 1 for everything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "InvalidConfig" | "InvalidPercentage" | "InvalidIngredient" => 2,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}

fn is_config_error(err: &eyre::Report) -> bool {
    err.chain().any(|e| {
        let s = e.to_string().to_ascii_lowercase();
        s.contains("config") || s.contains("calibration") || s.contains("panel script")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_percentage_exits_with_usage_code() {
        let err = eyre::Report::new(MixerError::InvalidPercentage(30));
        assert_eq!(exit_code_for_error(&err), 2);
        assert!(humanize(&err).contains("30%"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "InvalidPercentage");
    }

    #[test]
    fn hardware_faults_exit_with_one() {
        let err = eyre::Report::new(MixerError::HardwareFault("relay".into()));
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("self-check"));
    }

    #[test]
    fn display_range_errors_do_not_blame_wiring() {
        use mixer_core::hw_error::map_hw_error;
        use mixer_hardware::error::HwError;
        let err = eyre::Report::new(map_hw_error(&HwError::DisplayRange { col: 0, row: 2 }));
        assert_eq!(exit_code_for_error(&err), 1);
        let text = humanize(&err);
        assert!(text.contains("off screen"), "{text}");
        assert!(!text.contains("[pins]"), "{text}");
    }

    #[test]
    fn wrapped_config_errors_are_recognized() {
        use eyre::WrapErr;
        let err: eyre::Report = Err::<(), _>(eyre::eyre!("timing.poll_ms must be >= 1"))
            .wrap_err("invalid configuration")
            .unwrap_err();
        assert_eq!(exit_code_for_error(&err), 2);
        assert!(humanize(&err).contains("timing.poll_ms must be >= 1"));
    }
}
