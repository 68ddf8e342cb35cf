//! Resource source handed to the rendering engine.

use async_trait::async_trait;
use bytes::Bytes;
use renderer::{EmptyResponseCache, RenderError, Resource, ResourceSource};
use tile_common::ImageFormat;
use tracing::{debug, warn};

use crate::upstream::Upstream;

/// Serves the prefetched tile and forwards everything else upstream.
///
/// Background failures are answered with a cached empty placeholder so a
/// single missing sprite or neighbouring tile never fails the render.
pub struct TileDataSource<'a> {
    upstream: &'a dyn Upstream,
    empty: &'a EmptyResponseCache,
    primary_path: String,
    primary: Bytes,
}

impl<'a> TileDataSource<'a> {
    pub fn new(
        upstream: &'a dyn Upstream,
        empty: &'a EmptyResponseCache,
        primary_url: &str,
        primary: Bytes,
    ) -> Self {
        Self {
            upstream,
            empty,
            primary_path: url_path(primary_url),
            primary,
        }
    }
}

#[async_trait]
impl<'a> ResourceSource for TileDataSource<'a> {
    async fn fetch(&self, url: &str) -> Result<Resource, RenderError> {
        let path = url_path(url);
        if path == self.primary_path {
            debug!(path = %path, "Serving prefetched tile");
            return Ok(Resource::from_data(self.primary.clone()));
        }

        match self.upstream.fetch_resource(url).await {
            Ok(resource) => Ok(resource),
            Err(e) if e.is_recoverable() => {
                let format = ImageFormat::from_path(&path);
                warn!(error = %e, format = ?format, "Background request failed, using empty response");
                Ok(Resource::from_data(self.empty.get(format, "")))
            }
            Err(e) => Err(RenderError::Resource(e.to_string())),
        }
    }
}

/// Path component of a URL, or the input itself when it does not parse.
fn url_path(url: &str) -> String {
    reqwest::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split('?').next().unwrap_or(url).to_string())
}
