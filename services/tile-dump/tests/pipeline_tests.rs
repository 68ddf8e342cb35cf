//! End-to-end pipeline tests against an in-memory upstream and engine.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use renderer::{
    EmptyResponseCache, EncodeOptions, RasterBuffer, RasterRenderer, RenderError, Resource,
    ResourceSource,
};
use serde_json::json;
use tile_common::{ImageFormat, StyleDocument, TileCoord, Viewport};
use tile_dump::config::{DumpConfig, UpstreamConfig};
use tile_dump::{
    render_tile, run, FetchError, FetchFailure, PipelineError, RequestKind, Upstream,
};

// ============================================================================
// Fakes
// ============================================================================

const HOST: &str = "https://tiles.test";
const TILE_BYTES: &[u8] = b"\x1a\x02mvt";

fn upstream_config() -> UpstreamConfig {
    UpstreamConfig::new(
        HOST,
        "topographic",
        "EPSG:3857",
        "topographic",
        Some("key".to_string()),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn not_found(kind: RequestKind, url: &str) -> FetchError {
    FetchError::new(
        kind,
        url,
        FetchFailure::Status {
            status: 404,
            text: "Not Found".to_string(),
        },
    )
}

/// Upstream serving a fixed tile, style and resource table.
struct FakeUpstream {
    config: UpstreamConfig,
    tile_fails: bool,
    style_fails: bool,
    resources: HashMap<String, Bytes>,
    calls: Mutex<Vec<String>>,
}

impl FakeUpstream {
    fn new() -> Self {
        Self {
            config: upstream_config(),
            tile_fails: false,
            style_fails: false,
            resources: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    fn tile_url(&self, coord: &TileCoord) -> String {
        self.config.tile_url(coord)
    }

    async fn fetch_tile(&self, coord: &TileCoord) -> Result<Bytes, FetchError> {
        self.calls.lock().unwrap().push(format!("tile {}", coord));
        if self.tile_fails {
            return Err(not_found(RequestKind::Primary, &self.tile_url(coord)));
        }
        Ok(Bytes::from_static(TILE_BYTES))
    }

    async fn fetch_style(&self) -> Result<StyleDocument, FetchError> {
        self.calls.lock().unwrap().push("style".to_string());
        if self.style_fails {
            return Err(not_found(RequestKind::Primary, &self.config.style_url()));
        }
        Ok(StyleDocument::new(json!({"version": 8, "name": "test", "layers": []})).unwrap())
    }

    async fn fetch_resource(&self, url: &str) -> Result<Resource, FetchError> {
        self.calls.lock().unwrap().push(format!("resource {}", url));
        self.resources
            .get(url)
            .map(|data| Resource::from_data(data.clone()))
            .ok_or_else(|| not_found(RequestKind::Background, url))
    }
}

/// Engine that records what it was given and paints a premultiplied color.
struct RecordingEngine {
    fill: [u8; 4],
    requests: Vec<String>,
    viewports: Mutex<Vec<Viewport>>,
    responses: Mutex<Vec<Bytes>>,
    wrong_size: bool,
}

impl RecordingEngine {
    fn new(fill: [u8; 4]) -> Self {
        Self {
            fill,
            requests: Vec::new(),
            viewports: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            wrong_size: false,
        }
    }

    fn requesting(mut self, urls: &[&str]) -> Self {
        self.requests = urls.iter().map(|u| u.to_string()).collect();
        self
    }
}

#[async_trait]
impl RasterRenderer for RecordingEngine {
    async fn render(
        &self,
        _style: &StyleDocument,
        source: &dyn ResourceSource,
        viewport: &Viewport,
    ) -> Result<RasterBuffer, RenderError> {
        self.viewports.lock().unwrap().push(*viewport);
        for url in &self.requests {
            let resource = source.fetch(url).await?;
            self.responses.lock().unwrap().push(resource.data);
        }
        let width = if self.wrong_size {
            viewport.width + 1
        } else {
            viewport.width
        };
        Ok(RasterBuffer::filled(width, viewport.height, self.fill))
    }
}

/// Engine that paints premultiplied opaque red on the left half only.
struct HalfFilledEngine;

#[async_trait]
impl RasterRenderer for HalfFilledEngine {
    async fn render(
        &self,
        _style: &StyleDocument,
        _source: &dyn ResourceSource,
        viewport: &Viewport,
    ) -> Result<RasterBuffer, RenderError> {
        let mut raster = RasterBuffer::transparent(viewport.width, viewport.height);
        let width = viewport.width as usize;
        for (i, px) in raster.as_bytes_mut().chunks_exact_mut(4).enumerate() {
            if i % width < width / 2 {
                px.copy_from_slice(&[255, 0, 0, 255]);
            }
        }
        Ok(raster)
    }
}

fn config_for(tile: TileCoord, format: ImageFormat, output_dir: PathBuf) -> DumpConfig {
    DumpConfig {
        tile,
        output: EncodeOptions::new(format),
        render_size: 128,
        output_dir,
        upstream: upstream_config(),
    }
}

// ============================================================================
// Viewport and post-processing
// ============================================================================

#[tokio::test]
async fn test_zoom_zero_renders_doubled_and_downscales() {
    let upstream = FakeUpstream::new();
    let engine = RecordingEngine::new([128, 128, 128, 128]);
    let empty = EmptyResponseCache::new();

    let rendered = render_tile(&upstream, &engine, &empty, TileCoord::new(0, 0, 0), 128)
        .await
        .unwrap();

    let viewports = engine.viewports.lock().unwrap();
    assert_eq!(viewports.len(), 1);
    assert_eq!(viewports[0].zoom, 0.0);
    assert_eq!((viewports[0].width, viewports[0].height), (256, 256));

    assert_eq!((rendered.raster.width(), rendered.raster.height()), (128, 128));
    assert_eq!(rendered.raster.as_bytes().len(), 128 * 128 * 4);
    assert_eq!(rendered.raster.pixel(64, 64), Some([255, 255, 255, 128]));
}

#[tokio::test]
async fn test_zoom_zero_downscale_keeps_edge_color() {
    let upstream = FakeUpstream::new();
    let empty = EmptyResponseCache::new();

    let rendered = render_tile(&upstream, &HalfFilledEngine, &empty, TileCoord::new(0, 0, 0), 128)
        .await
        .unwrap();

    let raster = &rendered.raster;
    assert_eq!((raster.width(), raster.height()), (128, 128));
    let mut partial = 0;
    for x in 56..72 {
        let px = raster.pixel(x, 64).unwrap();
        if px[3] == 0 {
            continue;
        }
        if px[3] < 255 {
            partial += 1;
        }
        assert!(px[0] >= 254, "x={} darkened to {:?}", x, px);
        assert_eq!(&px[1..3], &[0, 0]);
    }
    assert!(partial > 0);
}

#[tokio::test]
async fn test_run_jpeg_flattens_onto_black() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(
        TileCoord::new(13, 8071, 5128),
        ImageFormat::Jpeg,
        dir.path().to_path_buf(),
    );
    let upstream = FakeUpstream::new();
    // Fully transparent after correction.
    let engine = RecordingEngine::new([0, 0, 0, 0]);
    let empty = EmptyResponseCache::new();

    let path = run(&config, &upstream, &engine, &empty)
        .await
        .unwrap()
        .unwrap();
    let decoded = image::open(&path).unwrap().to_rgb8();
    let px = decoded.get_pixel(64, 64).0;
    assert!(px.iter().all(|&c| c <= 4), "expected black, got {:?}", px);
}

#[tokio::test]
async fn test_regular_tile_renders_one_zoom_up() {
    let upstream = FakeUpstream::new();
    let engine = RecordingEngine::new([10, 20, 30, 0]);
    let empty = EmptyResponseCache::new();

    let rendered = render_tile(&upstream, &engine, &empty, TileCoord::new(13, 8071, 5128), 128)
        .await
        .unwrap();

    let viewport = engine.viewports.lock().unwrap()[0];
    assert_eq!(viewport.zoom, 12.0);
    assert_eq!((viewport.width, viewport.height), (128, 128));
    assert!((viewport.center.0 - 174.70458984375).abs() < 1e-9);
    assert_eq!(rendered.viewport, viewport);

    // Transparent pixels lose their color.
    assert_eq!(rendered.raster.pixel(0, 0), Some([0, 0, 0, 0]));
    assert_eq!((rendered.raster.width(), rendered.raster.height()), (128, 128));

    assert_eq!(upstream.calls(), vec!["tile 13/8071/5128", "style"]);
}

#[tokio::test]
async fn test_engine_size_mismatch_is_an_error() {
    let upstream = FakeUpstream::new();
    let mut engine = RecordingEngine::new([0, 0, 0, 255]);
    engine.wrong_size = true;
    let empty = EmptyResponseCache::new();

    let result = render_tile(&upstream, &engine, &empty, TileCoord::new(3, 1, 1), 128).await;
    assert!(matches!(
        result,
        Err(PipelineError::Render(RenderError::Engine(_)))
    ));
}

// ============================================================================
// Primary vs background failures
// ============================================================================

#[tokio::test]
async fn test_tile_fetch_failure_is_fatal() {
    let mut upstream = FakeUpstream::new();
    upstream.tile_fails = true;
    let engine = RecordingEngine::new([0, 0, 0, 255]);
    let empty = EmptyResponseCache::new();

    let result = render_tile(&upstream, &engine, &empty, TileCoord::new(5, 1, 2), 128).await;

    match result {
        Err(PipelineError::Fetch(e)) => {
            assert_eq!(e.kind, RequestKind::Primary);
            assert!(e.to_string().contains("HTTP status: 404"));
            assert!(!e.url.contains("key"));
        }
        other => panic!("expected fetch error, got {:?}", other.map(|t| t.coord)),
    }
    assert!(engine.viewports.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_style_fetch_failure_is_fatal() {
    let mut upstream = FakeUpstream::new();
    upstream.style_fails = true;
    let engine = RecordingEngine::new([0, 0, 0, 255]);
    let empty = EmptyResponseCache::new();

    let result = render_tile(&upstream, &engine, &empty, TileCoord::new(5, 1, 2), 128).await;
    assert!(matches!(result, Err(PipelineError::Fetch(ref e)) if e.kind == RequestKind::Primary));
    assert!(engine.viewports.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_engine_gets_prefetched_tile() {
    let upstream = FakeUpstream::new();
    let coord = TileCoord::new(13, 8071, 5128);
    // Same path, different query string.
    let tile_url = format!(
        "{}/v1/tiles/topographic/EPSG:3857/13/8071/5128.pbf?api=other",
        HOST
    );
    let engine = RecordingEngine::new([0, 0, 0, 255]).requesting(&[&tile_url]);
    let empty = EmptyResponseCache::new();

    render_tile(&upstream, &engine, &empty, coord, 128).await.unwrap();

    assert_eq!(engine.responses.lock().unwrap()[0].as_ref(), TILE_BYTES);
    // Served from memory, not fetched again.
    assert!(!upstream.calls().iter().any(|c| c.starts_with("resource")));
}

#[tokio::test]
async fn test_background_failures_get_empty_responses() {
    let mut upstream = FakeUpstream::new();
    let sprite = format!("{}/v1/sprites/topographic/sprite.png", HOST);
    upstream
        .resources
        .insert(sprite.clone(), Bytes::from_static(b"sprite"));

    let missing_png = format!("{}/v1/tiles/aerial/EPSG:3857/12/1/1.png?api=key", HOST);
    let missing_png_again = format!("{}/v1/tiles/aerial/EPSG:3857/12/1/2.png?api=key", HOST);
    let missing_pbf = format!("{}/v1/tiles/topographic/EPSG:3857/12/9/9.pbf?api=key", HOST);

    let engine = RecordingEngine::new([0, 0, 0, 255]).requesting(&[
        &sprite,
        &missing_png,
        &missing_png_again,
        &missing_pbf,
    ]);
    let empty = EmptyResponseCache::new();

    render_tile(&upstream, &engine, &empty, TileCoord::new(13, 8071, 5128), 128)
        .await
        .unwrap();

    let responses = engine.responses.lock().unwrap();
    assert_eq!(responses[0].as_ref(), b"sprite");

    // 1x1 transparent PNG, generated once and shared.
    let decoded = image::load_from_memory(&responses[1]).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1, 1));
    assert_eq!(responses[1].as_ptr(), responses[2].as_ptr());
    assert_eq!(empty.generated_count(), 1);

    // Vector data gets a zero-length body.
    assert!(responses[3].is_empty());
}

// ============================================================================
// Full run
// ============================================================================

#[tokio::test]
async fn test_run_writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(
        TileCoord::new(13, 8071, 5128),
        ImageFormat::Png,
        dir.path().to_path_buf(),
    );
    let upstream = FakeUpstream::new();
    let engine = RecordingEngine::new([64, 32, 0, 64]);
    let empty = EmptyResponseCache::new();

    let written = run(&config, &upstream, &engine, &empty).await.unwrap();
    let path = written.unwrap();
    assert_eq!(path, dir.path().join("output.png"));

    let decoded = image::open(&path).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (128, 128));
    assert_eq!(decoded.get_pixel(5, 5).0, [255, 127, 0, 64]);
}

#[tokio::test]
async fn test_run_writes_jpeg_and_webp() {
    for format in [ImageFormat::Jpeg, ImageFormat::Webp] {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(TileCoord::new(4, 3, 3), format, dir.path().to_path_buf());
        let upstream = FakeUpstream::new();
        let engine = RecordingEngine::new([200, 100, 50, 255]);
        let empty = EmptyResponseCache::new();

        let path = run(&config, &upstream, &engine, &empty)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path, dir.path().join(format!("output.{}", format)));
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}

#[tokio::test]
async fn test_run_write_failure_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    // A file where the output directory should be.
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, b"x").unwrap();

    let config = config_for(TileCoord::new(1, 0, 0), ImageFormat::Png, blocker);
    let upstream = FakeUpstream::new();
    let engine = RecordingEngine::new([0, 0, 0, 255]);
    let empty = EmptyResponseCache::new();

    let written = run(&config, &upstream, &engine, &empty).await.unwrap();
    assert!(written.is_none());
}

#[tokio::test]
async fn test_run_rejects_invalid_tile_before_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(TileCoord::new(1, 2, 0), ImageFormat::Png, dir.path().to_path_buf());
    let upstream = FakeUpstream::new();
    let engine = RecordingEngine::new([0, 0, 0, 255]);
    let empty = EmptyResponseCache::new();

    let result = run(&config, &upstream, &engine, &empty).await;
    assert!(matches!(result, Err(PipelineError::Tile(_))));
    assert!(upstream.calls().is_empty());
}
