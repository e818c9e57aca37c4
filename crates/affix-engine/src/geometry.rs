//! Basic geometry types shared by the planner and the compositor.

use serde::{Deserialize, Serialize};

/// Pixel size of an image or canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Build a size from its extents along and across `axis`.
    pub const fn from_axes(axis: StackAxis, along: u32, cross: u32) -> Self {
        match axis {
            StackAxis::Horizontal => Self::new(along, cross),
            StackAxis::Vertical => Self::new(cross, along),
        }
    }

    /// A probe that reported a zero extent cannot be scaled.
    pub const fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Extent along the stacking axis.
    pub const fn along(&self, axis: StackAxis) -> u32 {
        match axis {
            StackAxis::Horizontal => self.width,
            StackAxis::Vertical => self.height,
        }
    }

    /// Extent across the stacking axis.
    pub const fn cross(&self, axis: StackAxis) -> u32 {
        match axis {
            StackAxis::Horizontal => self.height,
            StackAxis::Vertical => self.width,
        }
    }

    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Direction along which images are concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackAxis {
    #[default]
    Horizontal,
    Vertical,
}

/// Rule for resolving cross-axis size mismatches among the selected images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalePolicy {
    /// Enlarge every image to the largest cross-axis extent.
    #[default]
    ScaleToLargest,
    /// Shrink every image to the smallest cross-axis extent.
    ScaleToSmallest,
}

/// Pixel gaps between images and around the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Spacing {
    pub horizontal: u32,
    pub vertical: u32,
}

impl Spacing {
    pub const fn new(horizontal: u32, vertical: u32) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    /// Gap between neighbours on the stacking axis.
    pub const fn along(&self, axis: StackAxis) -> u32 {
        match axis {
            StackAxis::Horizontal => self.horizontal,
            StackAxis::Vertical => self.vertical,
        }
    }

    /// Border on each side of the cross axis.
    pub const fn cross(&self, axis: StackAxis) -> u32 {
        match axis {
            StackAxis::Horizontal => self.vertical,
            StackAxis::Vertical => self.horizontal,
        }
    }

}

/// Scale value outside the accepted range.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("render scale {0} is outside {min}..={max}", min = RenderScale::MIN, max = RenderScale::MAX)]
pub struct InvalidScale(pub f64);

/// Uniform multiplier chosen by the user before compositing.
///
/// Always within `[0.1, 1.0]` and rounded to two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct RenderScale(f64);

impl RenderScale {
    pub const MIN: f64 = 0.1;
    pub const MAX: f64 = 1.0;
    pub const FULL: Self = Self(1.0);

    pub fn new(value: f64) -> Result<Self, InvalidScale> {
        // NaN fails the range check too.
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(InvalidScale(value));
        }
        Ok(Self((value * 100.0).round() / 100.0))
    }

    pub const fn get(self) -> f64 {
        self.0
    }

    /// Multiply an extent, truncating to whole pixels.
    pub fn apply(self, extent: u32) -> u32 {
        (f64::from(extent) * self.0) as u32
    }
}

impl Default for RenderScale {
    fn default() -> Self {
        Self::FULL
    }
}

impl TryFrom<f64> for RenderScale {
    type Error = InvalidScale;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for RenderScale {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}
