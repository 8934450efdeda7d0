//! Error type shared by the rendering pipeline.

use crate::matrix::EccLevel;
use thiserror::Error;

/// Errors that can occur while producing a styled QR code.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The value does not fit any version up to `max_version` at the requested level.
    #[error("value too long to encode at ECC level {ecc} within version {max_version}")]
    CapacityExceeded {
        /// Error correction level that was requested.
        ecc: EccLevel,
        /// Highest version that was tried.
        max_version: u8,
    },

    /// The render configuration is malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An image or logo source could not be resolved to a bitmap.
    #[error("missing asset: {0}")]
    MissingAsset(String),

    /// A newer request replaced this one before it finished.
    #[error("request superseded by a newer one")]
    Superseded,

    /// The background generation task failed to complete.
    #[error("matrix generation task failed: {0}")]
    Task(String),

    /// Configuration JSON could not be parsed.
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// Image decoding or encoding failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Filesystem access failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;
