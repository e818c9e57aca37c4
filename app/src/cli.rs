//! Command-line flags. Anything given here overrides the environment.

use std::path::PathBuf;

use affix_engine::{Color, OutputFormat, Spacing};
use clap::{Parser, ValueEnum};

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Scale every image up to the largest one
    Largest,
    /// Scale every image down to the smallest one
    Smallest,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "photo-affix",
    version,
    about = "Stack photos side by side or top to bottom into a single image"
)]
pub struct Args {
    /// Images to combine, in order (two or more)
    #[arg(required = true, value_name = "IMAGE")]
    pub images: Vec<PathBuf>,

    /// Stack top to bottom
    #[arg(long, conflicts_with = "horizontal")]
    pub vertical: bool,

    /// Stack left to right
    #[arg(long)]
    pub horizontal: bool,

    /// Which image size the others are scaled to
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Output scale between 0.1 and 1.0
    #[arg(long, default_value_t = 1.0)]
    pub scale: f64,

    /// Output format: png or jpeg
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// JPEG quality, 1-100
    #[arg(long)]
    pub quality: Option<u32>,

    /// Directory the result is written to
    #[arg(long, short = 'o')]
    pub output_dir: Option<PathBuf>,

    /// Gap in pixels as "H,V", or one value for both
    #[arg(long, value_name = "H,V", value_parser = parse_spacing)]
    pub spacing: Option<Spacing>,

    /// Background fill as #RRGGBB or #AARRGGBB
    #[arg(long)]
    pub background: Option<Color>,

    /// Print the proposed size and exit without writing anything
    #[arg(long)]
    pub plan_only: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Layer the flags on top of `config`.
    pub fn apply(&self, config: &mut AppConfig) {
        if self.vertical {
            config.stack_horizontally = false;
        } else if self.horizontal {
            config.stack_horizontally = true;
        }
        if let Some(policy) = self.policy {
            config.scale_to_largest = policy == PolicyArg::Largest;
        }
        if let Some(format) = self.format {
            config.output_format = format;
        }
        if let Some(quality) = self.quality {
            config.output_quality = quality;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if let Some(spacing) = self.spacing {
            config.spacing = spacing;
        }
        if let Some(background) = self.background {
            config.background = Some(background);
        }
    }
}

fn parse_spacing(value: &str) -> Result<Spacing, String> {
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid spacing {s:?}, expected a pixel count"))
    };
    match value.split_once(',') {
        Some((h, v)) => Ok(Spacing::new(parse(h)?, parse(v)?)),
        None => {
            let both = parse(value)?;
            Ok(Spacing::new(both, both))
        }
    }
}
