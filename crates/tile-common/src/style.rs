//! Colors and the opaque style document.

use crate::{TileError, TileResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Straight-alpha RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn transparent() -> Self {
        Color::rgba(0, 0, 0, 0)
    }

    /// Whether the color carries a non-opaque alpha component.
    pub fn has_alpha(&self) -> bool {
        self.a < 255
    }

    /// Convert to RGBA tuple.
    pub fn to_rgba(&self) -> (u8, u8, u8, u8) {
        (self.r, self.g, self.b, self.a)
    }

    /// Parse a CSS color: `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()` or a name.
    pub fn parse(s: &str) -> TileResult<Self> {
        let s = s.trim();
        let invalid = || TileError::InvalidColor(s.to_string());

        if s.starts_with('#') {
            return parse_hex_color(s).ok_or_else(invalid);
        }

        let lower = s.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_rgb_function(args).ok_or_else(invalid);
        }

        named_color(&lower).ok_or_else(invalid)
    }
}

impl FromStr for Color {
    type Err = TileError;

    fn from_str(s: &str) -> TileResult<Self> {
        Color::parse(s)
    }
}

fn parse_hex_color(s: &str) -> Option<Color> {
    let s = s.trim_start_matches('#');
    let channel = |i: usize| u8::from_str_radix(s.get(i..i + 2)?, 16).ok();

    match s.len() {
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in s.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(Color::rgba(out[0], out[1], out[2], 255))
        }
        6 => Some(Color::rgba(channel(0)?, channel(2)?, channel(4)?, 255)),
        8 => Some(Color::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
        _ => None,
    }
}

fn parse_rgb_function(args: &str) -> Option<Color> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let channel = |p: &str| -> Option<u8> {
        let v: f64 = p.parse().ok()?;
        Some(v.round().clamp(0.0, 255.0) as u8)
    };

    let a = match parts.get(3) {
        Some(p) => {
            let v: f64 = p.parse().ok()?;
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        None => 255,
    };

    Some(Color::rgba(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        a,
    ))
}

fn named_color(name: &str) -> Option<Color> {
    let (r, g, b, a) = match name {
        "transparent" => (0, 0, 0, 0),
        "black" => (0, 0, 0, 255),
        "white" => (255, 255, 255, 255),
        "red" => (255, 0, 0, 255),
        "green" => (0, 128, 0, 255),
        "blue" => (0, 0, 255, 255),
        "yellow" => (255, 255, 0, 255),
        "cyan" => (0, 255, 255, 255),
        "magenta" => (255, 0, 255, 255),
        "orange" => (255, 165, 0, 255),
        "purple" => (128, 0, 128, 255),
        "gray" | "grey" => (128, 128, 128, 255),
        _ => return None,
    };
    Some(Color::rgba(r, g, b, a))
}

/// A map style as served by the upstream.
///
/// The document is handed to the rendering engine as-is. Only a few
/// top-level fields are read here, for logging and the flat renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleDocument(serde_json::Value);

impl StyleDocument {
    pub fn new(value: serde_json::Value) -> TileResult<Self> {
        if !value.is_object() {
            return Err(TileError::InvalidStyle(
                "style root must be a JSON object".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn from_slice(bytes: &[u8]) -> TileResult<Self> {
        Self::new(serde_json::from_slice(bytes)?)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(|v| v.as_str())
    }

    pub fn layer_count(&self) -> usize {
        self.0
            .get("layers")
            .and_then(|v| v.as_array())
            .map_or(0, Vec::len)
    }

    /// `paint.background-color` of the first `background` layer, if it parses.
    pub fn background_color(&self) -> Option<Color> {
        self.0
            .get("layers")?
            .as_array()?
            .iter()
            .find(|layer| layer.get("type").and_then(|t| t.as_str()) == Some("background"))?
            .get("paint")?
            .get("background-color")?
            .as_str()
            .and_then(|s| Color::parse(s).ok())
    }
}
