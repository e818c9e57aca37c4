//! Runtime configuration loaded from defaults + environment overrides.

use std::path::PathBuf;

use affix_engine::{
    AffixConfig, Color, DecodeBudget, OutputFormat, OutputSpec, ScalePolicy, Spacing, StackAxis,
};

use super::defaults::{self, get_default};
use super::validation::validate_setting;

/// Front-end settings, one field per `AFFIX_*` key.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub stack_horizontally: bool,
    pub scale_to_largest: bool,
    pub spacing: Spacing,
    pub background: Option<Color>,
    pub output_format: OutputFormat,
    pub output_quality: u32,
    /// `None` means the platform pictures directory.
    pub output_dir: Option<PathBuf>,
    pub decode_budget_mb: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stack_horizontally: true,
            scale_to_largest: true,
            spacing: Spacing::default(),
            background: None,
            output_format: OutputFormat::Png,
            output_quality: 100,
            output_dir: None,
            decode_budget_mb: 512,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source. Unset or empty keys use
    /// their defaults; every value is validated before parsing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let g = |key: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| get_default(key).unwrap_or_default().to_string())
        };

        for key in defaults::keys() {
            let value = g(key);
            if let Err(e) = validate_setting(key, &value) {
                anyhow::bail!("invalid {key}={value:?}: {e}");
            }
        }

        let background = match g("AFFIX_BG_FILL_COLOR") {
            v if v.is_empty() => None,
            v => Some(v.parse::<Color>()?),
        };
        let output_dir = match g("AFFIX_OUTPUT_DIR") {
            v if v.is_empty() => None,
            v => Some(PathBuf::from(v)),
        };

        Ok(Self {
            stack_horizontally: g("AFFIX_STACK_HORIZONTALLY") == "true",
            scale_to_largest: g("AFFIX_SCALE_PRIORITY") == "true",
            spacing: Spacing::new(
                parse_u32(&g("AFFIX_SPACING_HORIZONTAL"), 0),
                parse_u32(&g("AFFIX_SPACING_VERTICAL"), 0),
            ),
            background,
            output_format: g("AFFIX_OUTPUT_FORMAT").parse()?,
            output_quality: parse_u32(&g("AFFIX_OUTPUT_QUALITY"), 100),
            output_dir,
            decode_budget_mb: parse_u64(&g("AFFIX_DECODE_BUDGET_MB"), 512),
        })
    }

    pub fn axis(&self) -> StackAxis {
        if self.stack_horizontally {
            StackAxis::Horizontal
        } else {
            StackAxis::Vertical
        }
    }

    pub fn policy(&self) -> ScalePolicy {
        if self.scale_to_largest {
            ScalePolicy::ScaleToLargest
        } else {
            ScalePolicy::ScaleToSmallest
        }
    }

    /// Engine preferences for one session.
    pub fn affix_config(&self) -> AffixConfig {
        AffixConfig {
            axis: self.axis(),
            spacing: self.spacing,
            policy: self.policy(),
            background: self.background,
            decode_budget: DecodeBudget::from_megabytes(self.decode_budget_mb),
        }
    }

    pub fn output_spec(&self) -> OutputSpec {
        OutputSpec::new(self.output_format, self.output_quality)
    }
}

fn parse_u32(s: &str, default: u32) -> u32 {
    if s.is_empty() {
        return default;
    }
    s.parse().unwrap_or(default)
}

fn parse_u64(s: &str, default: u64) -> u64 {
    if s.is_empty() {
        return default;
    }
    s.parse().unwrap_or(default)
}
