//! Raster resizing.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tile_common::{TileError, TileResult};

use crate::RasterBuffer;

/// Resample a raster to `width` x `height` with a Lanczos3 kernel.
pub fn resize(raster: RasterBuffer, width: u32, height: u32) -> TileResult<RasterBuffer> {
    if raster.width() == width && raster.height() == height {
        return Ok(raster);
    }

    let (src_w, src_h) = (raster.width(), raster.height());
    let src_len = raster.as_bytes().len();
    let image = RgbaImage::from_raw(src_w, src_h, raster.into_bytes()).ok_or(
        TileError::BufferSize {
            width: src_w,
            height: src_h,
            expected: src_w as usize * src_h as usize * 4,
            actual: src_len,
        },
    )?;

    let resized = imageops::resize(&image, width, height, FilterType::Lanczos3);
    RasterBuffer::new(width, height, resized.into_raw())
}

/// Halve both dimensions, as needed after a doubled zoom 0 render.
///
/// Pass premultiplied pixels. Resampling straight alpha lets the zeroed
/// color of transparent pixels bleed into their neighbours.
pub fn downscale_half(raster: RasterBuffer) -> TileResult<RasterBuffer> {
    let width = (raster.width() / 2).max(1);
    let height = (raster.height() / 2).max(1);
    resize(raster, width, height)
}
