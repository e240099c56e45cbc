//! JPEG / TIFF encoding.
//!
//! JPEG goes through `jpeg-encoder` so the Huffman tables can be optimised
//! for each image; TIFF goes through the `image` crate, uncompressed.

use super::backend::BackendError;
use super::params::{OutputFormat, Quality};
use image::RgbImage;
use image::codecs::tiff::TiffEncoder;
use jpeg_encoder::{ColorType, Encoder as JpegEncoder};
use std::io::{BufWriter, Seek, Write};

/// Encode `rgb` into `writer`. `quality` only applies to JPEG.
pub fn encode<W: Write + Seek>(
    rgb: &RgbImage,
    format: OutputFormat,
    quality: Quality,
    writer: W,
) -> Result<(), BackendError> {
    let mut writer = BufWriter::new(writer);
    match format {
        OutputFormat::Jpeg => write_jpeg(rgb, quality, true, &mut writer)?,
        OutputFormat::Tiff => rgb
            .write_with_encoder(TiffEncoder::new(&mut writer))
            .map_err(|e| BackendError::ProcessingFailed(format!("Tiff encode failed: {}", e)))?,
    }
    writer.flush()?;
    Ok(())
}

fn write_jpeg<W: Write>(
    rgb: &RgbImage,
    quality: Quality,
    optimize: bool,
    writer: W,
) -> Result<(), BackendError> {
    let too_large = || {
        BackendError::ProcessingFailed(format!(
            "{}x{} exceeds the JPEG size limit of 65535x65535",
            rgb.width(),
            rgb.height()
        ))
    };
    let width = u16::try_from(rgb.width()).map_err(|_| too_large())?;
    let height = u16::try_from(rgb.height()).map_err(|_| too_large())?;

    let mut encoder = JpegEncoder::new(writer, quality.value());
    encoder.set_optimized_huffman_tables(optimize);
    encoder
        .encode(rgb.as_raw(), width, height, ColorType::Rgb)
        .map_err(|e| BackendError::ProcessingFailed(format!("Jpeg encode failed: {}", e)))
}
