//! Interface to the map rendering engine.
//!
//! Map rendering itself is out of scope: a real engine (e.g. a native
//! MapLibre binding) plugs in behind [`RasterRenderer`]. The engine pulls
//! every resource it needs (tiles, sprites, glyphs) through a
//! [`ResourceSource`] supplied by the caller.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tile_common::{StyleDocument, TileError, Viewport};
use tracing::debug;

use crate::alpha::premultiply_in_place;
use crate::RasterBuffer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Resource request failed: {0}")]
    Resource(String),

    #[error("Rendering engine failed: {0}")]
    Engine(String),

    #[error(transparent)]
    Raster(#[from] TileError),
}

/// A resource returned to the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    pub data: Bytes,
    pub modified: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

impl Resource {
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }
}

/// Where the engine loads its resources from.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Resource, RenderError>;
}

/// A rendering engine.
///
/// Implementations return **premultiplied** RGBA sized to the viewport.
#[async_trait]
pub trait RasterRenderer: Send + Sync {
    async fn render(
        &self,
        style: &StyleDocument,
        source: &dyn ResourceSource,
        viewport: &Viewport,
    ) -> Result<RasterBuffer, RenderError>;
}

/// Engine stand-in that paints the style's background layer.
///
/// Used when no native engine is linked in. Styles without a background
/// layer render fully transparent.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackgroundRenderer;

#[async_trait]
impl RasterRenderer for BackgroundRenderer {
    async fn render(
        &self,
        style: &StyleDocument,
        _source: &dyn ResourceSource,
        viewport: &Viewport,
    ) -> Result<RasterBuffer, RenderError> {
        let Some(color) = style.background_color() else {
            debug!("Style has no background layer, rendering transparent");
            return Ok(RasterBuffer::transparent(viewport.width, viewport.height));
        };

        let (r, g, b, a) = color.to_rgba();
        let mut rgba = [r, g, b, a];
        premultiply_in_place(&mut rgba);

        Ok(RasterBuffer::filled(viewport.width, viewport.height, rgba))
    }
}
