//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the batch processor (which decides what to crop) and
//! the [`backend`](super::backend) (which does the pixel work). This
//! separation allows swapping backends (e.g. for testing with a mock)
//! without changing the batch logic.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1-100, default 95). Clamped on construction.
//! - [`CropParams`]: everything one crop needs (source, output path, crop box, quality).

use super::geometry::CropBox;
use std::path::PathBuf;

/// Quality used when the source's own encoding parameters cannot be reapplied.
pub const FALLBACK_JPEG_QUALITY: u8 = 95;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(FALLBACK_JPEG_QUALITY)
    }
}

/// Parameters for a single crop operation.
///
/// `output` is the final destination; backends must never leave a partial
/// file there when the operation fails.
#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub crop_box: CropBox,
    pub quality: Quality,
}
