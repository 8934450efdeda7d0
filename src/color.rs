//! Colors as they appear in render configurations.
//!
//! Any CSS color string is accepted: hex forms, `rgb()`/`rgba()`, `hsl()`/`hsla()`, the named
//! colors and `transparent`. The handful of names in [`COLOR_MAP`] resolve to their table entry
//! first.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Color names understood by [`Color::parse`].
pub const COLOR_MAP: [(&str, &str); 10] = [
    ("red", "#FF0000"),
    ("green", "#00FF00"),
    ("blue", "#0000FF"),
    ("black", "#000000"),
    ("white", "#FFFFFF"),
    ("yellow", "#FFFF00"),
    ("purple", "#800080"),
    ("orange", "#FFA500"),
    ("gray", "#808080"),
    ("pink", "#FFC0CB"),
];

/// A straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    /// Opaque color from its channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses a color string. Returns `None` for anything unrecognized.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        let lookup = COLOR_MAP
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, hex)| *hex);
        let parsed = csscolorparser::parse(lookup.unwrap_or(s)).ok()?;
        let [r, g, b, a] = parsed.to_rgba8();
        Some(Color::rgba(r, g, b, a))
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Alpha as a fraction in `0.0..=1.0`.
    pub fn alpha(&self) -> f64 {
        f64::from(self.a) / 255.0
    }

    /// `#RRGGBB`, dropping alpha. SVG carries alpha as a separate opacity attribute.
    pub fn to_hex_rgb(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Channels as straight RGBA fractions.
    pub fn to_f32(&self) -> [f32; 4] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            f32::from(self.a) / 255.0,
        ]
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s).ok_or_else(|| format!("unrecognized color: {s:?}"))
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}
