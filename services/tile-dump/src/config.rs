//! Run configuration.

use std::path::PathBuf;
use std::time::Duration;

use renderer::EncodeOptions;
use tile_common::{TileCoord, TileError, TileResult};

/// Default upstream host.
pub const DEFAULT_HOST: &str = "https://tiles.basemaps.linz.govt.nz";

/// Environment variable holding the upstream API key.
pub const API_KEY_ENV: &str = "BASEMAPS_API_KEY";

/// Output edge length in pixels. Zoom 0 renders at twice this and downscales.
pub const DEFAULT_RENDER_SIZE: u32 = 128;

/// Largest accepted output edge length.
pub const MAX_RENDER_SIZE: u32 = 4096;

/// Upstream tile service settings.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub host: String,
    /// Tileset name, e.g. "topographic"
    pub layer: String,
    /// Tile matrix CRS, e.g. "EPSG:3857"
    pub crs: String,
    /// Style name, e.g. "topographic"
    pub style: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl UpstreamConfig {
    /// Build the upstream config. A missing or blank API key is fatal.
    pub fn new(
        host: impl Into<String>,
        layer: impl Into<String>,
        crs: impl Into<String>,
        style: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> TileResult<Self> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                TileError::MissingConfig(format!("environment variable ${}", API_KEY_ENV))
            })?;

        Ok(Self {
            host: host.into().trim_end_matches('/').to_string(),
            layer: layer.into(),
            crs: crs.into(),
            style: style.into(),
            api_key,
            timeout,
        })
    }

    /// `{host}/v1/tiles/{layer}/{crs}/{z}/{x}/{y}.pbf?api={key}`
    pub fn tile_url(&self, coord: &TileCoord) -> String {
        format!(
            "{}/v1/tiles/{}/{}/{}.pbf?api={}",
            self.host,
            self.layer,
            self.crs,
            coord.path(),
            self.api_key
        )
    }

    /// `{host}/v1/tiles/{layer}/{crs}/style/{name}.json?api={key}`
    pub fn style_url(&self) -> String {
        format!(
            "{}/v1/tiles/{}/{}/style/{}.json?api={}",
            self.host, self.layer, self.crs, self.style, self.api_key
        )
    }
}

/// Everything needed for one run.
#[derive(Debug, Clone)]
pub struct DumpConfig {
    pub tile: TileCoord,
    pub output: EncodeOptions,
    pub render_size: u32,
    pub output_dir: PathBuf,
    pub upstream: UpstreamConfig,
}

impl DumpConfig {
    pub fn validate(&self) -> TileResult<()> {
        TileCoord::checked(self.tile.z, self.tile.x, self.tile.y)?;
        if self.render_size == 0 || self.render_size > MAX_RENDER_SIZE {
            return Err(TileError::RenderSize {
                size: self.render_size,
                max: MAX_RENDER_SIZE,
            });
        }
        Ok(())
    }

    /// `<output_dir>/output.<format>`
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("output.{}", self.output.format.as_str()))
    }
}
