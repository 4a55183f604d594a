//! Quality presets and the palette/dither profile each one maps to.

use crate::errors::GifError;
use std::fmt;
use std::str::FromStr;

/// Encoding parameters handed to `palettegen` and `paletteuse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    /// `palettegen=max_colors=`
    pub max_colors: u16,
    /// `paletteuse=dither=`
    pub dither: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub const ALL: [QualityPreset; 3] = [QualityPreset::Low, QualityPreset::Medium, QualityPreset::High];

    pub const fn profile(self) -> QualityProfile {
        match self {
            QualityPreset::Low => QualityProfile {
                max_colors: 128,
                dither: "bayer:bayer_scale=3",
            },
            QualityPreset::Medium => QualityProfile {
                max_colors: 256,
                dither: "bayer:bayer_scale=5",
            },
            QualityPreset::High => QualityProfile {
                max_colors: 256,
                dither: "none",
            },
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            QualityPreset::Low => "low",
            QualityPreset::Medium => "medium",
            QualityPreset::High => "high",
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown names are rejected rather than mapped to the default preset.
impl FromStr for QualityPreset {
    type Err = GifError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        QualityPreset::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                GifError::InvalidRequest(format!(
                    "unknown quality preset '{}' (expected one of: low, medium, high)",
                    name
                ))
            })
    }
}
