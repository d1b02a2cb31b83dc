use std::fmt;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::engine::Rect;
use crate::error::ConfigError;

/// An RGB colour written as `#rgb` or `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const BLACK: HexColor = HexColor { r: 0, g: 0, b: 0 };
    pub const WHITE: HexColor = HexColor { r: 0xff, g: 0xff, b: 0xff };

    pub fn channels(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl FromStr for HexColor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ConfigError::InvalidColor {
            value: s.to_string(),
            reason,
        };

        if s.len() != 4 && s.len() != 7 {
            return Err(invalid("length must be 4 or 7"));
        }
        let digits = s.strip_prefix('#').ok_or_else(|| invalid("must start with '#'"))?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid("contains a non-hex digit"));
        }

        if digits.len() == 6 {
            let bytes = hex::decode(digits).map_err(|_| invalid("contains a non-hex digit"))?;
            return Ok(HexColor {
                r: bytes[0],
                g: bytes[1],
                b: bytes[2],
            });
        }

        // #rgb doubles every digit.
        let mut channels = digits.chars().filter_map(|c| c.to_digit(16)).map(|d| d as u8 * 17);
        match (channels.next(), channels.next(), channels.next()) {
            (Some(r), Some(g), Some(b)) => Ok(HexColor { r, g, b }),
            _ => Err(invalid("contains a non-hex digit")),
        }
    }
}

impl TryFrom<String> for HexColor {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", hex::encode(self.channels()))
    }
}

/// Appearance of a rendered signature field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignStyle {
    pub auto_size: bool,
    pub font: String,
    pub font_size: f64,
    pub line_height: f64,
    pub font_color: HexColor,
    pub bg_color: HexColor,
    pub border_size: f64,
    pub border_color: HexColor,
}

impl Default for SignStyle {
    fn default() -> Self {
        Self {
            auto_size: false,
            font: "Helvetica".to_string(),
            font_size: 10.0,
            line_height: 1.0,
            font_color: HexColor::BLACK,
            bg_color: HexColor::WHITE,
            border_size: 0.0,
            border_color: HexColor::BLACK,
        }
    }
}

/// A coordinate block: one rectangle rendered on each of `pages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignCoords {
    pub pages: Vec<u32>,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl SignCoords {
    pub fn rect(&self) -> Rect {
        Rect {
            x1: self.x1,
            y1: self.y1,
            x2: self.x2,
            y2: self.y2,
        }
    }
}

/// Signature properties applied to every field of a signing call.
///
/// Parsed from the same camelCase JSON document used for the process-wide
/// defaults and for per-request overrides. Colours are validated while
/// parsing, so a `SignProps` value is always usable at sign time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignProps {
    pub name: String,
    pub reason: String,
    pub location: String,
    pub annotations: Vec<IndexMap<String, String>>,
    pub style: SignStyle,
    pub coords: Vec<SignCoords>,
}

impl SignProps {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&bytes)
    }

    /// Annotation key/value pairs in document order.
    pub fn annotation_lines(&self) -> impl Iterator<Item = (&str, &str)> {
        self.annotations
            .iter()
            .flat_map(|map| map.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Total number of signature fields this props document produces.
    pub fn field_count(&self) -> usize {
        self.coords.iter().map(|c| c.pages.len()).sum()
    }
}
