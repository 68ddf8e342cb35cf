//! Web Mercator tile addressing and the render viewport.

use crate::{TileError, TileResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Highest zoom level accepted. Keeps `1 << z` inside a u32.
pub const MAX_ZOOM: u32 = 30;

/// Pixel size of a tile in the standard web-map pyramid.
pub const TILE_SIZE: u32 = 256;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Build a coordinate, rejecting anything outside `[0, 2^z)`.
    pub fn checked(z: u32, x: u32, y: u32) -> TileResult<Self> {
        if z > MAX_ZOOM {
            return Err(TileError::ZoomOutOfRange(z));
        }
        let n = 1u32 << z;
        if x >= n || y >= n {
            return Err(TileError::TileOutOfRange { z, x, y });
        }
        Ok(Self { z, x, y })
    }

    /// Number of tiles along one axis at this zoom.
    pub fn matrix_size(&self) -> u32 {
        1u32 << self.z
    }

    /// Path fragment used by the upstream service.
    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }

    /// Geographic center of the tile as (lon, lat) in degrees.
    pub fn center_lon_lat(&self) -> (f64, f64) {
        // Pixel position of the tile center at this zoom.
        let world = (TILE_SIZE as f64) * self.matrix_size() as f64;
        let px = (self.x as f64 + 0.5) * TILE_SIZE as f64;
        let py = (self.y as f64 + 0.5) * TILE_SIZE as f64;
        pixel_to_lon_lat(px, py, world)
    }

    /// Get the parent tile (zoom - 1).
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            return None;
        }
        Some(TileCoord {
            z: self.z - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Convert a spherical mercator pixel position to (lon, lat).
fn pixel_to_lon_lat(px: f64, py: f64, world_size: f64) -> (f64, f64) {
    let lon = px / world_size * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * py / world_size)).sinh().atan().to_degrees();
    (lon, lat)
}

/// Camera handed to the rendering engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom: f64,
    /// (lon, lat) in degrees
    pub center: (f64, f64),
    pub bearing: f64,
    pub pitch: f64,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Viewport that renders `coord` as a `size`-pixel square.
    ///
    /// The engine works on 512px tiles, so the camera sits one zoom level
    /// above the output tile. At zoom 0 there is nothing above, so the
    /// viewport is doubled instead and the caller downscales afterwards.
    pub fn for_tile(coord: &TileCoord, size: u32) -> Self {
        let zoom = coord.z.saturating_sub(1) as f64;
        let size = if coord.z == 0 { size.saturating_mul(2) } else { size };
        Self {
            zoom,
            center: coord.center_lon_lat(),
            bearing: 0.0,
            pitch: 0.0,
            width: size,
            height: size,
        }
    }

    /// Byte length of an RGBA raster covering this viewport.
    pub fn raster_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}
