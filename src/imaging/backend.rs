//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the batch
//! processor needs: identify (read dimensions) and crop (decode, cut,
//! re-encode, persist).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the pure-Rust
//! `image` crate.

use super::params::CropParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Encode failed: {0}")]
    EncodeFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so a single backend can be shared by rayon workers.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Crop `params.source` to `params.crop_box` and write it to
    /// `params.output` in the source's own format.
    ///
    /// On error nothing is left at `params.output`.
    fn crop(&self, params: &CropParams) -> Result<(), BackendError>;
}
