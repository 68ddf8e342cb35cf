//! Error types for tile-dump.

use thiserror::Error;

/// Result type alias using TileError.
pub type TileResult<T> = Result<T, TileError>;

/// Errors raised while describing or validating a tile request.
#[derive(Debug, Error)]
pub enum TileError {
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    #[error("Tile {z}/{x}/{y} is outside the tile pyramid")]
    TileOutOfRange { z: u32, x: u32, y: u32 },

    #[error("Zoom level {0} is not supported")]
    ZoomOutOfRange(u32),

    #[error("Requested format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Render size {size} must be between 1 and {max}")]
    RenderSize { size: u32, max: u32 },

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Invalid style document: {0}")]
    InvalidStyle(String),

    #[error("Raster buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

impl From<serde_json::Error> for TileError {
    fn from(err: serde_json::Error) -> Self {
        TileError::InvalidStyle(err.to_string())
    }
}
