//! Caption styles for rendered subtitles.

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// An RGB color, serialized as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const WHITE: RgbColor = RgbColor::new(255, 255, 255);
    pub const BLACK: RgbColor = RgbColor::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (the leading `#` is optional).
    pub fn parse_hex(s: &str) -> Result<Self, ColorParseError> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ColorParseError(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ColorParseError(s.to_string()))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for RgbColor {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_hex(&value)
    }
}

impl From<RgbColor> for String {
    fn from(color: RgbColor) -> Self {
        color.to_string()
    }
}

impl JsonSchema for RgbColor {
    fn schema_name() -> String {
        "RgbColor".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

#[derive(Debug, Error)]
#[error("Invalid color (expected #RRGGBB): {0}")]
pub struct ColorParseError(String);

/// Font settings for sentence-level captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FontStyle {
    pub name: String,
    pub size: u32,
    pub bold: bool,
}

impl Default for FontStyle {
    fn default() -> Self {
        Self {
            name: "Arial".to_string(),
            size: 36,
            bold: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CaptionColors {
    pub primary: RgbColor,
    pub outline: RgbColor,
}

impl Default for CaptionColors {
    fn default() -> Self {
        Self {
            primary: RgbColor::WHITE,
            outline: RgbColor::BLACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BorderStyle {
    /// ASS border style (1 = outline + shadow, 3/4 = opaque box)
    pub style: u8,
    pub width: u32,
}

impl Default for BorderStyle {
    fn default() -> Self {
        Self { style: 1, width: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CaptionPosition {
    /// Numpad-style ASS alignment (2 = bottom center)
    pub alignment: u8,
    pub margin_vertical: u32,
}

impl Default for CaptionPosition {
    fn default() -> Self {
        Self {
            alignment: 2,
            margin_vertical: 20,
        }
    }
}

/// Style for sentence-level captions rendered from SRT.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SegmentsStyle {
    pub font: FontStyle,
    pub colors: CaptionColors,
    pub border: BorderStyle,
    pub position: CaptionPosition,
}

/// Box drawn behind word-highlight captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CaptionBackground {
    pub color: RgbColor,
    /// 0 = transparent, 255 = opaque
    pub opacity: u8,
    pub rounded: bool,
}

impl Default for CaptionBackground {
    fn default() -> Self {
        Self {
            color: RgbColor::BLACK,
            opacity: 128,
            rounded: true,
        }
    }
}

/// Style for word-level highlight captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HighlightStyle {
    pub font_name: String,
    pub font_size: u32,
    pub text_color: RgbColor,
    pub highlight_color: RgbColor,
    pub highlight_border: u32,
    pub background: CaptionBackground,
    pub padding_horizontal: u32,
    pub padding_vertical: u32,
    pub alignment: u8,
    pub words_per_line: usize,
    pub max_lines: usize,
    pub uppercase: bool,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            font_name: "Arial Black".to_string(),
            font_size: 72,
            text_color: RgbColor::WHITE,
            highlight_color: RgbColor::new(214, 0, 0),
            highlight_border: 12,
            background: CaptionBackground::default(),
            padding_horizontal: 40,
            padding_vertical: 80,
            alignment: 2,
            words_per_line: 4,
            max_lines: 2,
            uppercase: true,
        }
    }
}
