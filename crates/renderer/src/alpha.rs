//! Premultiplied / straight alpha conversion.
//!
//! The rendering engine hands back premultiplied RGBA, while PNG, JPEG and
//! WebP all store straight alpha. Encoding the raw engine output leaves dark
//! semi-transparent fringes along antialiased edges, so every raster goes
//! through [`unpremultiply_in_place`] before it is encoded.

/// Convert premultiplied RGBA to straight alpha, in place.
///
/// Pixels with zero alpha have no recoverable color and are zeroed. For the
/// rest each color channel is divided by `alpha / 255` in double precision
/// and truncated back to 8 bits. Input that was never premultiplied
/// (channel > alpha) saturates at 255.
///
/// The alpha channel and the buffer length are left untouched. A trailing
/// partial pixel, if any, is ignored.
pub fn unpremultiply_in_place(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let alpha = px[3];
        if alpha == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        if alpha == 255 {
            continue;
        }

        let norm = alpha as f64 / 255.0;
        for channel in &mut px[..3] {
            // `as u8` truncates and saturates.
            *channel = (*channel as f64 / norm) as u8;
        }
    }
}

/// Convert straight RGBA to premultiplied alpha, in place.
///
/// Rounds to nearest, matching what compositing engines emit.
pub fn premultiply_in_place(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let alpha = px[3] as u16;
        for channel in &mut px[..3] {
            *channel = ((*channel as u16 * alpha + 127) / 255) as u8;
        }
    }
}
