//! Setting value validation.

use regex::Regex;
use std::sync::LazyLock;

static RE_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#([0-9A-Fa-f]{6}|[0-9A-Fa-f]{8})$").unwrap());

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "AFFIX_SPACING_HORIZONTAL" | "AFFIX_SPACING_VERTICAL" => {
            validate_int_range(value, 0, 10_000)?
        }
        "AFFIX_BG_FILL_COLOR" => {
            if !value.is_empty() && !RE_COLOR.is_match(value) {
                return Err("must be #RRGGBB or #AARRGGBB".into());
            }
        }
        "AFFIX_OUTPUT_FORMAT" => {
            if !["png", "jpeg", "jpg"].contains(&value.to_ascii_lowercase().as_str()) {
                return Err("must be 'png' or 'jpeg'".into());
            }
        }
        "AFFIX_OUTPUT_QUALITY" => validate_int_range(value, 1, 100)?,
        "AFFIX_DECODE_BUDGET_MB" => validate_int_range(value, 16, 65_536)?,
        // Boolean settings
        k if is_boolean_setting(k) => {
            if value != "true" && value != "false" {
                return Err("must be 'true' or 'false'".into());
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}

fn is_boolean_setting(key: &str) -> bool {
    matches!(key, "AFFIX_STACK_HORIZONTALLY" | "AFFIX_SCALE_PRIORITY")
}
