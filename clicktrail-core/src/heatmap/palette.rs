//! Colour schemes for heat map tiers

use serde::Deserialize;

use super::grid::IntensityTier;

/// An RGBA colour, alpha in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Same colour at zero alpha, the outer stop of a radial gradient
    pub fn transparent(&self) -> Self {
        Self { a: 0.0, ..*self }
    }
}

impl std::fmt::Display for Rgba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Colours for the three intensity tiers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub low: Rgba,
    pub medium: Rgba,
    pub high: Rgba,
}

impl Palette {
    pub fn color(&self, tier: IntensityTier) -> Rgba {
        match tier {
            IntensityTier::Low => self.low,
            IntensityTier::Medium => self.medium,
            IntensityTier::High => self.high,
        }
    }
}

/// Selectable colour schemes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    /// Blue, orange, red
    #[default]
    #[serde(alias = "default")]
    Classic,
    Plasma,
    Viridis,
    Grayscale,
}

impl ColorScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorScheme::Classic => "classic",
            ColorScheme::Plasma => "plasma",
            ColorScheme::Viridis => "viridis",
            ColorScheme::Grayscale => "grayscale",
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            ColorScheme::Classic => Palette {
                low: Rgba::new(0, 0, 255, 0.6),
                medium: Rgba::new(255, 165, 0, 0.7),
                high: Rgba::new(255, 0, 0, 0.8),
            },
            ColorScheme::Plasma => Palette {
                low: Rgba::new(13, 8, 135, 0.6),
                medium: Rgba::new(156, 24, 109, 0.7),
                high: Rgba::new(249, 168, 37, 0.8),
            },
            ColorScheme::Viridis => Palette {
                low: Rgba::new(68, 1, 84, 0.6),
                medium: Rgba::new(33, 145, 140, 0.7),
                high: Rgba::new(253, 231, 37, 0.8),
            },
            ColorScheme::Grayscale => Palette {
                low: Rgba::new(50, 50, 50, 0.6),
                medium: Rgba::new(120, 120, 120, 0.7),
                high: Rgba::new(200, 200, 200, 0.8),
            },
        }
    }
}

impl std::str::FromStr for ColorScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" | "default" => Ok(ColorScheme::Classic),
            "plasma" => Ok(ColorScheme::Plasma),
            "viridis" => Ok(ColorScheme::Viridis),
            "grayscale" => Ok(ColorScheme::Grayscale),
            _ => Err(format!("unknown color scheme: {}", s)),
        }
    }
}

impl std::fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
