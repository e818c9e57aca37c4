//! Source images: cheap dimension probes and budgeted, downsampled decodes.
//!
//! JPEG sources are reduced inside the decoder (1/2, 1/4 or 1/8 DCT scaling)
//! so a small slot never needs the photo's full resolution in memory. Other
//! formats decode at native size under the [`DecodeBudget`] and are reduced
//! afterwards.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::error::{DecodingError, ImageFormatHint};
use image::{ImageError, ImageFormat, ImageReader, Limits};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::PixelBuffer;
use crate::error::DecodeError;
use crate::geometry::Dimensions;
use crate::resize;

/// Opaque, immutable handle to a source image (a path or URI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(Arc<str>);

impl ImageRef {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ImageRef {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&Path> for ImageRef {
    fn from(value: &Path) -> Self {
        Self::new(value.to_string_lossy())
    }
}

impl From<PathBuf> for ImageRef {
    fn from(value: PathBuf) -> Self {
        Self::from(value.as_path())
    }
}

/// Readable, seekable byte stream the decoder can sniff and rewind.
pub trait ImageStream: BufRead + Seek + Send {}

impl<T: BufRead + Seek + Send> ImageStream for T {}

/// Opens byte streams for image references.
pub trait StreamProvider: Send + Sync {
    fn open(&self, image: &ImageRef) -> io::Result<Box<dyn ImageStream>>;
}

/// Opens local files. A leading `file://` scheme is accepted and stripped.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStreamProvider;

impl FileStreamProvider {
    pub fn resolve(image: &ImageRef) -> PathBuf {
        let raw = image.as_str();
        let path = raw
            .strip_prefix("file://")
            .or_else(|| raw.strip_prefix("FILE://"))
            .unwrap_or(raw);
        PathBuf::from(path)
    }
}

impl StreamProvider for FileStreamProvider {
    fn open(&self, image: &ImageRef) -> io::Result<Box<dyn ImageStream>> {
        let file = File::open(Self::resolve(image))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Upper bound on memory a single decode may allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecodeBudget {
    pub max_alloc: u64,
}

impl DecodeBudget {
    pub const DEFAULT_MAX_ALLOC: u64 = 512 * 1024 * 1024;

    pub const fn from_megabytes(mb: u64) -> Self {
        Self {
            max_alloc: mb * 1024 * 1024,
        }
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_alloc);
        limits
    }
}

impl Default for DecodeBudget {
    fn default() -> Self {
        Self {
            max_alloc: Self::DEFAULT_MAX_ALLOC,
        }
    }
}

/// One selected image plus the capability to probe and decode it.
pub struct ImageSource {
    image: ImageRef,
    provider: Arc<dyn StreamProvider>,
    budget: DecodeBudget,
    known: Option<Dimensions>,
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSource")
            .field("image", &self.image)
            .field("budget", &self.budget)
            .field("known", &self.known)
            .finish_non_exhaustive()
    }
}

impl ImageSource {
    pub fn new(image: ImageRef, provider: Arc<dyn StreamProvider>) -> Self {
        Self {
            image,
            provider,
            budget: DecodeBudget::default(),
            known: None,
        }
    }

    pub fn with_budget(mut self, budget: DecodeBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Seed the size cache with dimensions the caller already knows.
    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.known = Some(dimensions);
        self
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Cached dimensions, if a probe already ran or the caller seeded them.
    pub fn known_dimensions(&self) -> Option<Dimensions> {
        self.known
    }

    /// Read the pixel size from the image header without decoding pixels.
    pub fn probe(&self) -> Result<Dimensions, DecodeError> {
        let stream = self.open()?;
        let reader = ImageReader::new(stream)
            .with_guessed_format()
            .map_err(DecodeError::StreamUnavailable)?;
        let (width, height) = reader.into_dimensions()?;
        let dimensions = Dimensions::new(width, height);
        debug!(image = %self.image, %dimensions, "Probed image bounds");
        Ok(dimensions)
    }

    /// Cached dimensions, probing on a cache miss.
    pub fn dimensions(&mut self) -> Result<Dimensions, DecodeError> {
        if let Some(known) = self.known {
            return Ok(known);
        }
        let probed = self.probe()?;
        self.known = Some(probed);
        Ok(probed)
    }

    /// Decode pixels downsampled towards `target`, never below it.
    ///
    /// Exceeding the [`DecodeBudget`] yields [`DecodeError::OutOfMemory`] for
    /// this image only.
    pub fn decode(&self, target: Dimensions) -> Result<PixelBuffer, DecodeError> {
        let stream = self.open()?;
        let mut reader = ImageReader::new(stream)
            .with_guessed_format()
            .map_err(DecodeError::StreamUnavailable)?;

        let rgba = if reader.format() == Some(ImageFormat::Jpeg) {
            self.decode_jpeg(reader.into_inner(), target)
        } else {
            reader.limits(self.budget.limits());
            reader
                .decode()
                .map(|decoded| decoded.into_rgba8())
                .map_err(DecodeError::from)
        }
        .map_err(|err| {
            warn!(image = %self.image, error = %err, "Image decode failed");
            err
        })?;

        let decoded = Dimensions::new(rgba.width(), rgba.height());
        let factor = sample_factor(decoded, target);
        debug!(
            image = %self.image,
            %decoded,
            %target,
            factor,
            "Decoded image"
        );

        if factor > 1 {
            let reduced = Dimensions::new(decoded.width / factor, decoded.height / factor);
            Ok(resize::subsample(&rgba, reduced))
        } else {
            Ok(rgba)
        }
    }

    fn decode_jpeg(
        &self,
        stream: Box<dyn ImageStream>,
        target: Dimensions,
    ) -> Result<PixelBuffer, DecodeError> {
        let mut decoder = jpeg_decoder::Decoder::new(stream);
        decoder.read_info().map_err(jpeg_error)?;
        let info = decoder
            .info()
            .ok_or_else(|| malformed_jpeg("missing frame header"))?;
        let native = Dimensions::new(u32::from(info.width), u32::from(info.height));

        let wanted = jpeg_scaled_size(native, target);
        let (width, height) = decoder
            .scale(
                u16::try_from(wanted.width).unwrap_or(info.width),
                u16::try_from(wanted.height).unwrap_or(info.height),
            )
            .map_err(jpeg_error)?;
        let (width, height) = (u32::from(width), u32::from(height));

        let channels = match info.pixel_format {
            jpeg_decoder::PixelFormat::L8 => 1,
            jpeg_decoder::PixelFormat::L16 => 2,
            jpeg_decoder::PixelFormat::RGB24 => 3,
            jpeg_decoder::PixelFormat::CMYK32 => 4,
        };
        // Raw decoder output plus the RGBA copy.
        let needed = u64::from(width) * u64::from(height) * (channels + 4);
        if needed > self.budget.max_alloc {
            debug!(image = %self.image, %native, needed, "JPEG decode over budget");
            return Err(DecodeError::OutOfMemory);
        }
        debug!(image = %self.image, %native, width, height, "Decoding JPEG at reduced scale");

        let raw = decoder.decode().map_err(jpeg_error)?;
        let rgba: Vec<u8> = match info.pixel_format {
            jpeg_decoder::PixelFormat::L8 => raw.iter().flat_map(|&l| [l, l, l, 255]).collect(),
            // Big-endian samples; keep the high byte.
            jpeg_decoder::PixelFormat::L16 => {
                raw.chunks_exact(2).flat_map(|l| [l[0], l[0], l[0], 255]).collect()
            }
            jpeg_decoder::PixelFormat::RGB24 => raw
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            jpeg_decoder::PixelFormat::CMYK32 => {
                raw.chunks_exact(4).flat_map(cmyk_to_rgba).collect()
            }
        };
        drop(raw);

        PixelBuffer::from_raw(width, height, rgba)
            .ok_or_else(|| malformed_jpeg("decoded buffer does not match its frame size"))
    }

    fn open(&self) -> Result<Box<dyn ImageStream>, DecodeError> {
        self.provider.open(&self.image).map_err(|e| {
            warn!(image = %self.image, error = %e, "Failed to open image stream");
            DecodeError::StreamUnavailable(e)
        })
    }
}

/// Integer downsample factor for decoding `native` to draw at `target`.
///
/// Uses the limiting axis (the one with the smaller native/target ratio) so
/// the reduced image still covers the target on both axes. Clamped to ≥ 1.
pub fn sample_factor(native: Dimensions, target: Dimensions) -> u32 {
    if target.is_degenerate() || native.is_degenerate() {
        return 1;
    }
    let horizontal = native.width / target.width;
    let vertical = native.height / target.height;
    horizontal.min(vertical).max(1)
}

/// Smallest JPEG DCT reduction of `native` that still covers `target`.
fn jpeg_scaled_size(native: Dimensions, target: Dimensions) -> Dimensions {
    [8, 4, 2]
        .into_iter()
        .map(|d| Dimensions::new(native.width.div_ceil(d), native.height.div_ceil(d)))
        .find(|reduced| reduced.width >= target.width && reduced.height >= target.height)
        .unwrap_or(native)
}

fn cmyk_to_rgba(pixel: &[u8]) -> [u8; 4] {
    let k = u16::from(pixel[3]);
    let channel = |c: u8| ((255 - u16::from(c)) * (255 - k) / 255) as u8;
    [channel(pixel[0]), channel(pixel[1]), channel(pixel[2]), 255]
}

fn jpeg_error(err: jpeg_decoder::Error) -> DecodeError {
    match err {
        jpeg_decoder::Error::Io(io) if io.kind() != io::ErrorKind::UnexpectedEof => {
            DecodeError::StreamUnavailable(io)
        }
        other => malformed_jpeg(other),
    }
}

fn malformed_jpeg(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> DecodeError {
    DecodeError::MalformedImage(ImageError::Decoding(DecodingError::new(
        ImageFormatHint::Exact(ImageFormat::Jpeg),
        err,
    )))
}
