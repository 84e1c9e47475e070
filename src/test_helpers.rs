//! Shared test utilities for the batch-crop test suite.
//!
//! Provides synthetic image writers and a small tree builder so tests can
//! lay out an input directory without checked-in fixtures.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let input = tmp.path().join("in");
//! create_test_jpeg(&input.join("album/a.jpg"), 100, 200);
//! write_corrupt_file(&input.join("album/broken.png"));
//! ```

use image::{ImageDecoder, ImageEncoder, RgbImage, RgbaImage};
use std::path::Path;

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
}

/// Create a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create a small valid RGBA PNG file with a varying alpha channel.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([
            (x * 3 % 256) as u8,
            (y * 5 % 256) as u8,
            ((x + y) % 256) as u8,
            (255 - (x % 128)) as u8,
        ])
    });
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Create a JPEG carrying `icc` as its embedded colour profile.
pub fn create_test_jpeg_with_icc(path: &Path, width: u32, height: u32, icc: &[u8]) {
    ensure_parent(path);
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, 64, (y % 256) as u8])
    });
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new(std::io::BufWriter::new(file));
    encoder.set_icc_profile(icc.to_vec()).unwrap();
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create an RGB PNG carrying `icc` as its embedded colour profile.
pub fn create_test_png_with_icc(path: &Path, width: u32, height: u32, icc: &[u8]) {
    ensure_parent(path);
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 200])
    });
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = image::codecs::png::PngEncoder::new(std::io::BufWriter::new(file));
    encoder.set_icc_profile(icc.to_vec()).unwrap();
    encoder
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// The ICC profile embedded in an image file, if any.
pub fn read_icc_profile(path: &Path) -> Option<Vec<u8>> {
    image::ImageReader::open(path)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .into_decoder()
        .unwrap()
        .icc_profile()
        .unwrap()
}

/// Write a file with a JPEG signature but no decodable content.
pub fn write_corrupt_file(path: &Path) {
    ensure_parent(path);
    std::fs::write(path, [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'n', b'o', b'p', b'e']).unwrap();
}

/// Relative paths (with `/` separators) of every file under `root`, sorted.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    files.sort();
    files
}
