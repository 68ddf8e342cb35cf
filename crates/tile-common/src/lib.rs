//! Common types shared by the tile-dump crates.

pub mod error;
pub mod format;
pub mod style;
pub mod tile;

pub use error::{TileError, TileResult};
pub use format::ImageFormat;
pub use style::{Color, StyleDocument};
pub use tile::{TileCoord, Viewport};
