//! Single-tile map renderer.
//!
//! Fetches a vector tile and its style from the tile service, renders them
//! through a pluggable engine, converts the engine's premultiplied output to
//! straight alpha and writes `output.<format>`.

pub mod config;
pub mod pipeline;
pub mod source;
pub mod upstream;

pub use config::{DumpConfig, UpstreamConfig};
pub use pipeline::{render_tile, run, write_tile, OutputError, PipelineError, RenderedTile};
pub use source::TileDataSource;
pub use upstream::{FetchError, FetchFailure, HttpUpstream, RequestKind, Upstream};
