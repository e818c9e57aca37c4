//! Encoding the finished canvas to PNG or JPEG.

use std::fmt;
use std::io::{BufWriter, Write};
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::PixelBuffer;
use crate::error::EncodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    /// File extension including the leading dot.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => ".png",
            Self::Jpeg => ".jpg",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(EncodeError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        })
    }
}

/// Output format and quality. Quality only matters for JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputSpec {
    pub format: OutputFormat,
    quality: u8,
}

impl OutputSpec {
    pub const MAX_QUALITY: u8 = 100;

    /// Build an output spec, clamping `quality` into `1..=100`.
    pub fn new(format: OutputFormat, quality: u32) -> Self {
        let quality = quality.clamp(1, u32::from(Self::MAX_QUALITY)) as u8;
        Self { format, quality }
    }

    pub const fn png() -> Self {
        Self {
            format: OutputFormat::Png,
            quality: Self::MAX_QUALITY,
        }
    }

    pub fn jpeg(quality: u32) -> Self {
        Self::new(OutputFormat::Jpeg, quality)
    }

    pub const fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self::png()
    }
}

/// Serialize `buffer` into `sink`. The buffer is consumed and freed here.
pub fn encode<W: Write>(buffer: PixelBuffer, spec: OutputSpec, sink: W) -> Result<(), EncodeError> {
    let (width, height) = buffer.dimensions();
    let mut writer = BufWriter::new(sink);
    debug!(width, height, format = %spec.format, quality = spec.quality, "Encoding canvas");

    match spec.format {
        OutputFormat::Png => {
            PngEncoder::new(&mut writer).write_image(
                buffer.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgba8(buffer).into_rgb8();
            JpegEncoder::new_with_quality(&mut writer, spec.quality).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
    }

    writer.flush()?;
    Ok(())
}
