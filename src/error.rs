use thiserror::Error;

/// Errors produced by a single pipeline invocation.
///
/// Every variant is scoped to the image being processed; callers running a
/// batch keep going with the next image.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Cannot process a {width}x{height} image: both dimensions must be non-zero")]
    Decode { width: u32, height: u32 },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Raw output shape mismatch: expected {expected}, got {actual:?}")]
    ShapeMismatch { expected: String, actual: Vec<usize> },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid class catalog: {0}")]
    Catalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DetectError>;
