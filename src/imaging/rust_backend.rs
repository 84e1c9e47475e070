//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG) | `image` crate (pure Rust decoders) |
//! | Colour profile | `image::ImageDecoder::icc_profile` |
//! | Crop | `image::DynamicImage::crop_imm` |
//! | Encode → JPEG | `jpeg_encoder::Encoder`, quality 95, 4:4:4, optimised Huffman tables |
//! | Encode → PNG | `image::codecs::png::PngEncoder`, best compression, adaptive filter |
//! | Atomic write | `tempfile::NamedTempFile::persist` in the destination directory |
//!
//! ## Encoding parameters
//!
//! The output keeps the source's format and embedded ICC profile. The
//! `image` crate does not expose a JPEG's original quantisation tables, so
//! JPEG output always uses the high-quality preset: quality 95, no chroma
//! subsampling, Huffman tables optimised for the image. PNG output is
//! lossless, so the pixels are reproduced exactly whatever the source's
//! compression level.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{CropParams, Quality};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageDecoder, ImageEncoder, ImageFormat, ImageReader, ImageResult};
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Extensions the batch processor picks up, compared case-insensitively.
const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Returns the set of image file extensions the backend can crop.
pub fn supported_input_extensions() -> &'static [&'static str] {
    SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Open a reader with the format sniffed from the file contents.
fn open_reader(path: &Path) -> Result<ImageReader<BufReader<File>>, BackendError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?)
}

/// Output format for a source: content sniffing first, extension second.
fn output_format(sniffed: Option<ImageFormat>, path: &Path) -> Result<ImageFormat, BackendError> {
    let format = sniffed
        .or_else(|| ImageFormat::from_path(path).ok())
        .ok_or_else(|| BackendError::UnsupportedFormat(path.display().to_string()))?;
    match format {
        ImageFormat::Jpeg | ImageFormat::Png => Ok(format),
        other => Err(BackendError::UnsupportedFormat(format!(
            "{:?} ({})",
            other,
            path.display()
        ))),
    }
}

/// Decode the pixels together with the embedded ICC profile, if any.
///
/// An unreadable profile is logged and dropped; the pixels still decode.
fn decode_with_profile(
    reader: ImageReader<BufReader<File>>,
    path: &Path,
) -> ImageResult<(DynamicImage, Option<Vec<u8>>)> {
    let mut decoder = reader.into_decoder()?;
    image::Limits::default().reserve(decoder.total_bytes())?;
    let icc_profile = match decoder.icc_profile() {
        Ok(profile) => profile.filter(|p| !p.is_empty()),
        Err(e) => {
            warn!(source = %path.display(), "ignoring unreadable ICC profile: {}", e);
            None
        }
    };
    let img = DynamicImage::from_decoder(decoder)?;
    Ok((img, icc_profile))
}

fn encode_failed(e: impl std::fmt::Display) -> BackendError {
    BackendError::EncodeFailed(e.to_string())
}

/// Encode `img` as a baseline JPEG with the high-quality preset.
fn encode_jpeg<W: Write>(
    img: &DynamicImage,
    quality: Quality,
    icc_profile: Option<&[u8]>,
    mut writer: W,
) -> Result<(), BackendError> {
    let too_large = || {
        BackendError::EncodeFailed(format!(
            "{}x{} exceeds the JPEG size limit of 65535",
            img.width(),
            img.height()
        ))
    };
    let width = u16::try_from(img.width()).map_err(|_| too_large())?;
    let height = u16::try_from(img.height()).map_err(|_| too_large())?;

    // The JPEG encoder only takes 8-bit luma or RGB.
    let (pixels, color_type): (Cow<[u8]>, ColorType) = match img {
        DynamicImage::ImageLuma8(buf) => (Cow::Borrowed(buf.as_raw().as_slice()), ColorType::Luma),
        DynamicImage::ImageRgb8(buf) => (Cow::Borrowed(buf.as_raw().as_slice()), ColorType::Rgb),
        DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => (Cow::Owned(img.to_luma8().into_raw()), ColorType::Luma),
        _ => (Cow::Owned(img.to_rgb8().into_raw()), ColorType::Rgb),
    };

    let mut jpeg = Vec::new();
    let mut encoder = Encoder::new(&mut jpeg, quality.value());
    encoder.set_sampling_factor(SamplingFactor::R_4_4_4);
    encoder.set_optimized_huffman_tables(true);
    if let Some(icc) = icc_profile {
        encoder.add_icc_profile(icc).map_err(encode_failed)?;
    }
    encoder
        .encode(&pixels, width, height, color_type)
        .map_err(encode_failed)?;

    writer.write_all(&jpeg)?;
    Ok(())
}

/// Encode `img` as `format` into `writer`.
fn encode<W: Write>(
    img: &DynamicImage,
    format: ImageFormat,
    quality: Quality,
    icc_profile: Option<&[u8]>,
    writer: W,
) -> Result<(), BackendError> {
    match format {
        ImageFormat::Jpeg => encode_jpeg(img, quality, icc_profile, writer),
        ImageFormat::Png => {
            let img: Cow<DynamicImage> = match img {
                DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                    Cow::Owned(DynamicImage::ImageRgba16(img.to_rgba16()))
                }
                _ => Cow::Borrowed(img),
            };
            let mut encoder =
                PngEncoder::new_with_quality(writer, CompressionType::Best, FilterType::Adaptive);
            if let Some(icc) = icc_profile {
                encoder.set_icc_profile(icc.to_vec()).map_err(encode_failed)?;
            }
            img.write_with_encoder(encoder).map_err(encode_failed)
        }
        other => Err(BackendError::UnsupportedFormat(format!("{other:?}"))),
    }
}

/// Write `output` through a temporary file in the same directory.
///
/// The temp file is renamed over `output` only after `write` succeeded;
/// on any error it is removed when dropped, so `output` is either the old
/// file, the complete new file, or absent.
fn write_atomically<F>(output: &Path, source: &Path, write: F) -> Result<(), BackendError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), BackendError>,
{
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".batch-crop-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }

    // Temp files are created owner-only; give the result the source's mode.
    if let Ok(meta) = std::fs::metadata(source) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }

    tmp.persist(output).map_err(|e| BackendError::Io(e.error))?;
    Ok(())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = open_reader(path)?.into_dimensions().map_err(|e| {
            BackendError::DecodeFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn crop(&self, params: &CropParams) -> Result<(), BackendError> {
        let reader = open_reader(&params.source)?;
        let format = output_format(reader.format(), &params.source)?;
        let (img, icc_profile) = decode_with_profile(reader, &params.source).map_err(|e| {
            BackendError::DecodeFailed(format!(
                "Failed to decode {}: {}",
                params.source.display(),
                e
            ))
        })?;

        let b = params.crop_box;
        if b.right > img.width() || b.bottom > img.height() {
            return Err(BackendError::DecodeFailed(format!(
                "decoded size {}x{} is smaller than crop box {:?}",
                img.width(),
                img.height(),
                b.as_tuple()
            )));
        }
        let cropped = img.crop_imm(b.left, b.top, b.width(), b.height());
        debug!(
            source = %params.source.display(),
            ?format,
            width = cropped.width(),
            height = cropped.height(),
            icc = icc_profile.is_some(),
            "encoding cropped image"
        );

        write_atomically(&params.output, &params.source, |writer| {
            encode(&cropped, format, params.quality, icc_profile.as_deref(), writer)
        })
    }
}
