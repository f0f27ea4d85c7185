//! Animation variants for image-to-video jobs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Camera motion applied to a still image.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ZoomVariant {
    /// Starts at 1.0x, ends zoomed in, centered
    #[default]
    ZoomIn,
    /// Starts zoomed in, ends at 1.0x, centered
    ZoomOut,
    /// Zooms in while panning from the left edge to the right edge
    ZoomPanRight,
}

impl ZoomVariant {
    /// All variants, in declaration order.
    pub const ALL: &'static [ZoomVariant] = &[
        ZoomVariant::ZoomIn,
        ZoomVariant::ZoomOut,
        ZoomVariant::ZoomPanRight,
    ];

    /// Wire name of the variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoomVariant::ZoomIn => "zoomin",
            ZoomVariant::ZoomOut => "zoomout",
            ZoomVariant::ZoomPanRight => "zoompanright",
        }
    }

    /// Position of the variant in [`ZoomVariant::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ZoomVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ZoomVariant {
    type Err = VariantParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zoomin" => Ok(ZoomVariant::ZoomIn),
            "zoomout" => Ok(ZoomVariant::ZoomOut),
            "zoompanright" => Ok(ZoomVariant::ZoomPanRight),
            _ => Err(VariantParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown zoom variant: {0}")]
pub struct VariantParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_serde_names() {
        let json = serde_json::to_string(&ZoomVariant::ZoomPanRight).unwrap();
        assert_eq!(json, "\"zoompanright\"");

        let parsed: Vec<ZoomVariant> = serde_json::from_str(r#"["zoomin","zoomout"]"#).unwrap();
        assert_eq!(parsed, vec![ZoomVariant::ZoomIn, ZoomVariant::ZoomOut]);
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!("ZoomOut".parse::<ZoomVariant>().unwrap(), ZoomVariant::ZoomOut);
        assert!("spin".parse::<ZoomVariant>().is_err());
    }

    #[test]
    fn test_index_matches_all_table() {
        for (i, variant) in ZoomVariant::ALL.iter().enumerate() {
            assert_eq!(variant.index(), i);
        }
    }
}
