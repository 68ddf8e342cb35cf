//! Raster to PNG / JPEG / WebP.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use thiserror::Error;
use tile_common::ImageFormat;
use tracing::debug;

use crate::png::create_png;
use crate::RasterBuffer;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Cannot encode an image with zero width or height")]
    EmptyImage,

    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(usize),

    #[error("Pixel buffer is {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("PNG encoding failed: {0}")]
    Png(String),

    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),

    #[error("WebP encoding failed: {0}")]
    Webp(String),
}

/// Format plus its quality knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub format: ImageFormat,
    /// 1-100; ignored for PNG. `None` uses the format default.
    pub quality: Option<u8>,
}

impl EncodeOptions {
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            quality: None,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Quality actually handed to the codec.
    pub fn effective_quality(&self) -> u8 {
        self.quality
            .or_else(|| self.format.default_quality())
            .unwrap_or(100)
            .clamp(1, 100)
    }
}

/// Encode a straight-alpha raster.
pub fn encode(raster: &RasterBuffer, options: EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    encode_pixels(
        raster.as_bytes(),
        raster.width(),
        raster.height(),
        4,
        options,
    )
}

/// Encode interleaved RGB or RGBA pixels.
pub fn encode_pixels(
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: usize,
    options: EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::EmptyImage);
    }
    if channels != 3 && channels != 4 {
        return Err(EncodeError::UnsupportedChannels(channels));
    }
    let expected = width as usize * height as usize * channels;
    if pixels.len() != expected {
        return Err(EncodeError::BufferSize {
            expected,
            actual: pixels.len(),
        });
    }

    let quality = options.effective_quality();
    let encoded = match options.format {
        ImageFormat::Png => create_png(pixels, width as usize, height as usize, channels)?,
        ImageFormat::Jpeg => encode_jpeg(pixels, width, height, channels, quality)?,
        ImageFormat::Webp => encode_webp(pixels, width, height, channels, quality)?,
    };

    debug!(
        format = %options.format,
        width,
        height,
        channels,
        bytes = encoded.len(),
        "Encoded raster"
    );

    Ok(encoded)
}

/// JPEG has no alpha channel, so RGBA input is flattened onto black.
fn encode_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: usize,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    let rgb: Vec<u8> = if channels == 4 {
        flatten_onto_black(pixels)
    } else {
        pixels.to_vec()
    };

    let mut jpeg_data = Vec::new();
    let mut cursor = Cursor::new(&mut jpeg_data);
    let mut encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder.encode(&rgb, width, height, ColorType::Rgb8)?;

    Ok(jpeg_data)
}

fn flatten_onto_black(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        let alpha = px[3] as u16;
        for &c in &px[..3] {
            rgb.push(((c as u16 * alpha + 127) / 255) as u8);
        }
    }
    rgb
}

fn encode_webp(
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: usize,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    let encoder = if channels == 4 {
        webp::Encoder::from_rgba(pixels, width, height)
    } else {
        webp::Encoder::from_rgb(pixels, width, height)
    };

    let webp_data = encoder.encode(quality as f32);
    if webp_data.is_empty() {
        return Err(EncodeError::Webp("encoder produced no output".to_string()));
    }

    Ok(webp_data.to_vec())
}
