//! tile-dump: render one map tile to `output.<format>`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use renderer::{BackgroundRenderer, EmptyResponseCache, EncodeOptions};
use tile_common::{ImageFormat, TileCoord};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tile_dump::config::{DumpConfig, UpstreamConfig, API_KEY_ENV, DEFAULT_HOST, DEFAULT_RENDER_SIZE};
use tile_dump::HttpUpstream;

#[derive(Parser, Debug)]
#[command(name = "tile-dump")]
#[command(about = "Fetch, render and encode a single vector map tile")]
struct Args {
    /// Zoom level of the output tile
    #[arg(short, long, default_value = "13")]
    z: u32,

    /// Tile column
    #[arg(short, long, default_value = "8071")]
    x: u32,

    /// Tile row
    #[arg(short, long, default_value = "5128")]
    y: u32,

    /// Output format: png, jpeg or webp
    #[arg(short, long, default_value = "png")]
    format: ImageFormat,

    /// Encoder quality (1-100, JPEG/WebP only)
    #[arg(long)]
    quality: Option<u8>,

    /// Output edge length in pixels
    #[arg(long, default_value_t = DEFAULT_RENDER_SIZE)]
    render_size: u32,

    /// Directory for output.<format>
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Tile service base URL
    #[arg(long, env = "BASEMAPS_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Tileset name
    #[arg(long, default_value = "topographic")]
    layer: String,

    /// Tile matrix CRS
    #[arg(long, default_value = "EPSG:3857")]
    crs: String,

    /// Style name
    #[arg(long, default_value = "topographic")]
    style: String,

    /// Tile service API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let upstream_config = UpstreamConfig::new(
        args.host,
        args.layer,
        args.crs,
        args.style,
        args.api_key,
        Duration::from_secs(args.timeout_secs),
    )?;

    let mut output = EncodeOptions::new(args.format);
    if let Some(quality) = args.quality {
        output = output.with_quality(quality);
    }

    let config = DumpConfig {
        tile: TileCoord::checked(args.z, args.x, args.y)?,
        output,
        render_size: args.render_size,
        output_dir: args.output_dir,
        upstream: upstream_config.clone(),
    };
    config.validate()?;

    info!(
        tile = %config.tile,
        format = %config.output.format,
        host = %upstream_config.host,
        "Starting tile dump"
    );

    let upstream = HttpUpstream::new(upstream_config)?;
    let engine = BackgroundRenderer;

    let written = tile_dump::run(&config, &upstream, &engine, EmptyResponseCache::global())
        .await
        .with_context(|| format!("Failed to render tile {}", config.tile))?;

    if written.is_none() {
        info!("Finished without output");
    }

    Ok(())
}
