//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

type DefTuple = (&'static str, &'static str, &'static str);

const DEFS: &[DefTuple] = &[
    (
        "AFFIX_STACK_HORIZONTALLY",
        "true",
        "Stack images left to right (false = top to bottom)",
    ),
    (
        "AFFIX_SCALE_PRIORITY",
        "true",
        "Scale every image up to the largest one (false = down to the smallest)",
    ),
    ("AFFIX_SPACING_HORIZONTAL", "0", "Horizontal gap in pixels"),
    ("AFFIX_SPACING_VERTICAL", "0", "Vertical gap in pixels"),
    (
        "AFFIX_BG_FILL_COLOR",
        "",
        "Background fill as #RRGGBB or #AARRGGBB (empty = transparent)",
    ),
    ("AFFIX_OUTPUT_FORMAT", "png", "Output format: png or jpeg"),
    ("AFFIX_OUTPUT_QUALITY", "100", "JPEG quality, 1-100"),
    (
        "AFFIX_OUTPUT_DIR",
        "",
        "Output directory (empty = Pictures/PhotoAffix)",
    ),
    (
        "AFFIX_DECODE_BUDGET_MB",
        "512",
        "Maximum memory a single image decode may use, in MiB",
    ),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    description,
                },
            )
        })
        .collect()
});

/// Get the default value for a setting key, or `None` if not defined.
pub fn get_default(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS.get(key).map(|d| d.default)
}

/// Setting keys in declaration order.
pub fn keys() -> impl Iterator<Item = &'static str> {
    DEFS.iter().map(|&(key, _, _)| key)
}
