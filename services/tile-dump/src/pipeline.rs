//! Fetch → render → (downscale) → correct → encode → write, for one tile.

use std::path::{Path, PathBuf};
use std::time::Instant;

use renderer::encode::{encode, EncodeError, EncodeOptions};
use renderer::resize::downscale_half;
use renderer::{
    unpremultiply_in_place, EmptyResponseCache, RasterBuffer, RasterRenderer, RenderError,
};
use thiserror::Error;
use tile_common::{TileCoord, TileError, Viewport};
use tracing::{error, info, instrument};

use crate::config::DumpConfig;
use crate::source::TileDataSource;
use crate::upstream::{FetchError, Upstream};

/// Failures that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Tile(#[from] TileError),
}

/// Failures while producing the output file.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A corrected raster ready for encoding.
#[derive(Debug)]
pub struct RenderedTile {
    pub coord: TileCoord,
    /// Viewport the engine was asked to render
    pub viewport: Viewport,
    /// Straight-alpha raster at output size
    pub raster: RasterBuffer,
}

/// Fetch inputs, render and post-process a tile.
///
/// Tile data and style are fetched first; if either fails the engine is
/// never invoked.
#[instrument(skip_all, fields(tile = %coord))]
pub async fn render_tile(
    upstream: &dyn Upstream,
    engine: &dyn RasterRenderer,
    empty: &EmptyResponseCache,
    coord: TileCoord,
    render_size: u32,
) -> Result<RenderedTile, PipelineError> {
    let viewport = Viewport::for_tile(&coord, render_size);

    let data = upstream.fetch_tile(&coord).await?;
    let style = upstream.fetch_style().await?;
    info!(
        tile_bytes = data.len(),
        style = style.name().unwrap_or("unnamed"),
        "Fetched tile and style"
    );

    let source = TileDataSource::new(upstream, empty, &upstream.tile_url(&coord), data);

    let started = Instant::now();
    let mut raster = engine.render(&style, &source, &viewport).await?;
    if raster.width() != viewport.width || raster.height() != viewport.height {
        return Err(RenderError::Engine(format!(
            "engine returned {}x{}, expected {}x{}",
            raster.width(),
            raster.height(),
            viewport.width,
            viewport.height
        ))
        .into());
    }
    info!(
        zoom = viewport.zoom,
        width = viewport.width,
        height = viewport.height,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Rendered raster"
    );

    // Resample while still premultiplied, then straighten.
    if coord.z == 0 {
        raster = downscale_half(raster)?;
    }

    unpremultiply_in_place(raster.as_bytes_mut());

    Ok(RenderedTile {
        coord,
        viewport,
        raster,
    })
}

/// Encode a raster and write it to `path`. Returns the number of bytes written.
pub async fn write_tile(
    raster: &RasterBuffer,
    options: EncodeOptions,
    path: &Path,
) -> Result<usize, OutputError> {
    let encoded = encode(raster, options)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| OutputError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    tokio::fs::write(path, &encoded)
        .await
        .map_err(|source| OutputError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(encoded.len())
}

/// Run the whole pipeline for `config`.
///
/// Fetch and render failures are returned. Encoding and write failures are
/// only logged: the run still completes, without an output file.
pub async fn run(
    config: &DumpConfig,
    upstream: &dyn Upstream,
    engine: &dyn RasterRenderer,
    empty: &EmptyResponseCache,
) -> Result<Option<PathBuf>, PipelineError> {
    config.validate()?;

    let rendered = render_tile(upstream, engine, empty, config.tile, config.render_size).await?;

    let path = config.output_path();
    match write_tile(&rendered.raster, config.output, &path).await {
        Ok(bytes) => {
            info!(
                path = %path.display(),
                format = %config.output.format,
                bytes,
                "Wrote tile"
            );
            Ok(Some(path))
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to write tile");
            Ok(None)
        }
    }
}
