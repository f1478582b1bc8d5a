//! Error types for the gate vision library

use thiserror::Error;

/// Result type alias for the gate vision library
pub type Result<T> = std::result::Result<T, VisionError>;

/// Errors that can occur while reading frames or driving the detector.
///
/// Detection ambiguity is never an error: a frame without a usable crossing
/// comes back as a result with `motion_found == false`.
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("A frame is already being processed")]
    Busy,

    #[error("No frame has been submitted")]
    NotSubmitted,

    #[error("Motion detector worker is no longer running")]
    WorkerClosed,

    #[error("Frame dimensions changed: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed timestamp entry on line {line}: {content}")]
    Timestamp { line: usize, content: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl VisionError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}
