//! Raster post-processing and encoding for rendered map tiles.
//!
//! - Alpha correction (premultiplied to straight alpha)
//! - PNG / JPEG / WebP encoding
//! - Resizing for the zoom 0 workaround
//! - Cached empty placeholder responses
//! - The pluggable rendering engine interface

pub mod alpha;
pub mod empty;
pub mod encode;
pub mod engine;
pub mod png;
pub mod raster;
pub mod resize;

pub use alpha::{premultiply_in_place, unpremultiply_in_place};
pub use empty::EmptyResponseCache;
pub use encode::{encode, EncodeError, EncodeOptions};
pub use engine::{BackgroundRenderer, RasterRenderer, RenderError, Resource, ResourceSource};
pub use raster::RasterBuffer;
