use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::HighlighterError;

/// Color used when a concept has no configured color
pub const DEFAULT_HIGHLIGHT_COLOR: Rgb = Rgb::new(0xa8, 0xed, 0xea);

/// Background tint strength for highlight markers
pub const TINT_AMOUNT: f64 = 0.85;

/// Palette used when a concept is created without a color
pub const CONCEPT_PALETTE: [&str; 15] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7",
    "#DDA0DD", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E9",
    "#F8C471", "#82E0AA", "#F1948A", "#85C1E9", "#D7BDE2",
];

/// A 24-bit RGB color, written as `#rrggbb`.
///
/// A color parsed from upper-case hex is written back in upper case, so a
/// configured `#FF6B6B` stays `#FF6B6B`. Equality ignores the spelling.
#[derive(Debug, Clone, Copy)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    upper_case: bool,
}

impl PartialEq for Rgb {
    fn eq(&self, other: &Self) -> bool {
        (self.r, self.g, self.b) == (other.r, other.g, other.b)
    }
}

impl Eq for Rgb {}

impl Hash for Rgb {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.r, self.g, self.b).hash(state);
    }
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self {
            r,
            g,
            b,
            upper_case: false,
        }
    }

    /// Mix each channel toward white by `amount` (clamped to 0.0..=1.0).
    pub fn lighten(self, amount: f64) -> Self {
        let amount = if amount.is_nan() { 0.0 } else { amount.clamp(0.0, 1.0) };
        let mix = |c: u8| -> u8 {
            let c = c as f64;
            (c + (255.0 - c) * amount).round().min(255.0) as u8
        };
        Self::new(mix(self.r), mix(self.g), mix(self.b))
    }

    /// Deterministic palette color for a concept that was stored without one.
    pub fn palette_for(label: &str) -> Self {
        let hash = label
            .to_lowercase()
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        CONCEPT_PALETTE[hash % CONCEPT_PALETTE.len()]
            .parse()
            .unwrap_or(DEFAULT_HIGHLIGHT_COLOR)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.upper_case {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        }
    }
}

impl FromStr for Rgb {
    type Err = HighlighterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HighlighterError::invalid_input(format!("invalid color '{}'", s)));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| HighlighterError::invalid_input(format!("invalid color '{}'", s)))
        };
        let upper_case = hex.chars().any(|c| c.is_ascii_uppercase()) && !hex.chars().any(|c| c.is_ascii_lowercase());
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
            upper_case,
        })
    }
}

impl Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// `lighten(color, amount)` over hex strings; unparseable input falls back
/// to the default highlight color.
pub fn lighten(color: &str, amount: f64) -> String {
    color
        .parse::<Rgb>()
        .unwrap_or(DEFAULT_HIGHLIGHT_COLOR)
        .lighten(amount)
        .to_string()
}

/// Case-insensitive concept label → color lookup
#[derive(Debug, Clone)]
pub struct ConceptColorMap {
    colors: HashMap<String, Rgb>,
    fallback: Rgb,
}

impl Default for ConceptColorMap {
    fn default() -> Self {
        Self {
            colors: HashMap::new(),
            fallback: DEFAULT_HIGHLIGHT_COLOR,
        }
    }
}

impl ConceptColorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(mut self, fallback: Rgb) -> Self {
        self.fallback = fallback;
        self
    }

    /// First insertion of a label wins, matching the concept list order.
    pub fn insert(&mut self, label: &str, color: Rgb) {
        self.colors.entry(label.to_lowercase()).or_insert(color);
    }

    pub fn get(&self, label: &str) -> Option<Rgb> {
        self.colors.get(&label.to_lowercase()).copied()
    }

    /// Color for the first listed concept, or the fallback color.
    pub fn resolve(&self, concepts: &[String]) -> Rgb {
        concepts
            .first()
            .and_then(|label| self.get(label))
            .unwrap_or(self.fallback)
    }
}

impl<'a> FromIterator<(&'a str, Rgb)> for ConceptColorMap {
    fn from_iter<I: IntoIterator<Item = (&'a str, Rgb)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (label, color) in iter {
            map.insert(label, color);
        }
        map
    }
}
