//! Image affixing engine: stacks several photos edge-to-edge into one image.
//!
//! The pipeline is probe → plan → composite → encode. Sources are streamed
//! one at a time so peak memory stays at one canvas plus one decoded image.

pub mod color;
pub mod compose;
pub mod config;
pub mod encode;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod resize;
pub mod session;
pub mod source;

#[cfg(test)]
mod testutil;

// Re-exports for convenience
pub use color::Color;
pub use compose::{DrawProgress, composite, composite_with};
pub use config::AffixConfig;
pub use encode::{OutputFormat, OutputSpec, encode};
pub use error::{CompositeError, DecodeError, EncodeError, PlanError, SessionError};
pub use geometry::{Dimensions, InvalidScale, RenderScale, ScalePolicy, Spacing, StackAxis};
pub use layout::{Arrangement, CanvasPlan, Slot, arrange, plan};
pub use session::{
    AffixResult, AffixSession, Collaborators, ExclusiveProcessing, MediaRegistrar, OutputSink,
    Selection, SelectionError, SelectedImage, SessionEvent, SessionHandle, SessionState,
    SinkFactory,
};
pub use source::{DecodeBudget, FileStreamProvider, ImageRef, ImageSource, ImageStream, StreamProvider};

/// Owned RGBA8 pixel buffer used for decoded sources and the composite canvas.
pub type PixelBuffer = image::RgbaImage;
