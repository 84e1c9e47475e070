//! Image processing in pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Crop geometry** | [`compute_crop_box`] (pure) |
//! | **Crop → same format** | `crop_imm` + JPEG/PNG encoders, atomic rename |
//!
//! The module is split into:
//! - **Geometry**: Pure functions for crop-rectangle math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod geometry;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use geometry::{CropBox, CropSpec, compute_crop_box};
pub use params::{CropParams, FALLBACK_JPEG_QUALITY, Quality};
pub use rust_backend::{RustBackend, supported_input_extensions};
