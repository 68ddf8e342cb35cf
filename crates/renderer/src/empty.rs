//! Placeholder responses for failed resource requests.
//!
//! When a background request made by the engine fails, the engine still
//! gets a valid answer: a zero-length body for vector data, or a 1x1 image
//! of the requested format and color for raster sources. Images are
//! generated once per (format, color) and shared afterwards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use bytes::Bytes;
use once_cell::sync::Lazy;
use tile_common::{Color, ImageFormat};
use tracing::{debug, warn};

use crate::encode::{encode_pixels, EncodeOptions};

/// Color used when the caller does not name one.
pub const DEFAULT_EMPTY_COLOR: &str = "rgba(255,255,255,0)";

static GLOBAL: Lazy<EmptyResponseCache> = Lazy::new(EmptyResponseCache::new);

/// Keyed, at-most-once cache of placeholder bodies.
pub struct EmptyResponseCache {
    entries: RwLock<HashMap<(ImageFormat, String), Bytes>>,
    empty: Bytes,
    generated: AtomicU64,
}

impl Default for EmptyResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EmptyResponseCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            empty: Bytes::new(),
            generated: AtomicU64::new(0),
        }
    }

    /// Process-wide instance.
    pub fn global() -> &'static EmptyResponseCache {
        &GLOBAL
    }

    /// Placeholder body for a request of `format` (None for non-image data).
    ///
    /// An empty `color` falls back to [`DEFAULT_EMPTY_COLOR`]. If the color
    /// does not parse or the image fails to encode, an uncached zero-length
    /// body is returned.
    pub fn get(&self, format: Option<ImageFormat>, color: &str) -> Bytes {
        let Some(format) = format else {
            return self.empty.clone();
        };
        let color = if color.is_empty() {
            DEFAULT_EMPTY_COLOR
        } else {
            color
        };
        let key = (format, color.to_string());

        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(data) = entries.get(&key) {
                return data.clone();
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        // Double-check after acquiring write lock
        if let Some(data) = entries.get(&key) {
            return data.clone();
        }

        match generate(format, color) {
            Some(data) => {
                self.generated.fetch_add(1, Ordering::Relaxed);
                debug!(format = %format, color, bytes = data.len(), "Cached empty response");
                entries.insert(key, data.clone());
                data
            }
            None => self.empty.clone(),
        }
    }

    /// Number of placeholder images generated so far.
    pub fn generated_count(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn generate(format: ImageFormat, color: &str) -> Option<Bytes> {
    let parsed = match Color::parse(color) {
        Ok(c) => c,
        Err(e) => {
            warn!(color, error = %e, "Cannot build empty response");
            return None;
        }
    };

    let (r, g, b, a) = parsed.to_rgba();
    let (pixels, channels): (Vec<u8>, usize) = if parsed.has_alpha() && format.supports_alpha() {
        (vec![r, g, b, a], 4)
    } else {
        (vec![r, g, b], 3)
    };

    match encode_pixels(&pixels, 1, 1, channels, EncodeOptions::new(format)) {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            warn!(format = %format, color, error = %e, "Empty response encoding failed");
            None
        }
    }
}
