//! # Batch Crop
//!
//! Crops every JPEG and PNG under a folder into a mirrored output folder,
//! using one crop rule for the whole batch.
//!
//! # Architecture
//!
//! ```text
//! scan      input/  →  Vec<ImageTask>     (walk, filter, dedupe, mirror paths)
//! process   tasks   →  BatchSummary       (identify, crop box, crop + encode)
//! progress  events  →  Reporter           (controller-side display)
//! ```
//!
//! The batch runs on a worker thread ([`process::spawn_batch`]) and reports
//! through a channel of [`progress::BatchEvent`]s, so the controlling thread
//! stays free to render progress and to request an abort.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Finds supported images, skips hidden entries, dedupes by canonical path |
//! | [`process`] | Runs a batch sequentially or on a rayon pool; per-file results and summary |
//! | [`progress`] | Events, the [`progress::Reporter`] seam, cooperative abort |
//! | [`imaging`] | Crop geometry and the pure-Rust `image` backend |
//! | [`version`] | Numeric version comparison and update feed parsing |
//! | [`config`] | Layered `config.toml` loading with a non-failing fallback |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Bad File Never Stops the Batch
//!
//! Per-file problems (corrupt data, unwritable destination, image too small
//! for the crop) become a [`process::CropResult`] for that file. Only
//! problems with the batch itself, such as a missing input folder, are
//! returned as errors, and those are detected before any file is touched.
//!
//! ## No Partial Outputs
//!
//! Each crop is encoded into a temporary file next to its destination and
//! renamed into place, so an interrupted or failed write leaves either the
//! previous file or nothing.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding and encoding use the `image` crate only. The binary has no system
//! dependencies.

pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
pub mod progress;
pub mod scan;
pub mod version;

#[cfg(test)]
pub(crate) mod test_helpers;
