//! Error types for every stage of the affixing pipeline.

use crate::session::SessionState;

/// Failure to plan the output canvas. Always fatal, raised before any decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("image {0} reported a zero width or height")]
    DegenerateImage(usize),

    #[error("planned canvas has a zero width or height")]
    ZeroExtent,

    #[error("planned canvas does not fit in 32-bit pixel coordinates")]
    Overflow,
}

/// Per-image failure while probing or decoding a source.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("image stream unavailable: {0}")]
    StreamUnavailable(#[source] std::io::Error),

    #[error("malformed image: {0}")]
    MalformedImage(#[source] image::ImageError),

    #[error("not enough memory to decode image")]
    OutOfMemory,
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        use image::ImageError;
        use image::error::LimitErrorKind;

        match err {
            ImageError::Limits(limit) => match limit.kind() {
                LimitErrorKind::InsufficientMemory | LimitErrorKind::DimensionError => {
                    Self::OutOfMemory
                }
                _ => Self::MalformedImage(ImageError::Limits(limit)),
            },
            ImageError::IoError(io) if io.kind() != std::io::ErrorKind::UnexpectedEof => {
                Self::StreamUnavailable(io)
            }
            other => Self::MalformedImage(other),
        }
    }
}

/// Session-fatal failure while drawing the composite.
#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("image {index} could not be drawn: {cause}")]
    ImageFailed {
        index: usize,
        #[source]
        cause: DecodeError,
    },

    #[error("no images were drawn")]
    NothingDrawn,

    #[error("could not allocate a {width}x{height} canvas")]
    BufferAllocationFailed { width: u32, height: u32 },

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("composition was cancelled")]
    Cancelled,
}

/// Failure to serialize the finished canvas.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("output sink unavailable: {0}")]
    SinkUnavailable(#[source] std::io::Error),

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("failed writing output: {0}")]
    IoFailure(#[from] std::io::Error),

    #[error("encoder error: {0}")]
    Codec(#[source] image::ImageError),
}

impl From<image::ImageError> for EncodeError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => Self::IoFailure(io),
            image::ImageError::Unsupported(e) => Self::UnsupportedFormat(e.to_string()),
            other => Self::Codec(other),
        }
    }
}

/// Anything that ends an [`AffixSession`](crate::AffixSession) in `Failed`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not read size of image {index}: {cause}")]
    Probe {
        index: usize,
        #[source]
        cause: DecodeError,
    },

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Composite(#[from] CompositeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("cannot {action} while session is {from:?}")]
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },

    #[error("background worker stopped unexpectedly: {0}")]
    WorkerLost(String),
}
