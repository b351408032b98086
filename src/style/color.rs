use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("unrecognised color `{0}`")]
pub struct ColorError(String);

/// An sRGB color as it appears in style documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// Alpha-composite `self` at `opacity` over `background`
    pub fn over(self, background: Rgb, opacity: f64) -> Rgb {
        let a = opacity.clamp(0.0, 1.0);
        let mix = |fg: u8, bg: u8| (fg as f64 * a + bg as f64 * (1.0 - a)).round() as u8;
        Rgb(
            mix(self.0, background.0),
            mix(self.1, background.1),
            mix(self.2, background.2),
        )
    }
}

impl FromStr for Rgb {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| ColorError(s.to_string()));
        }
        let named = match s.to_ascii_lowercase().as_str() {
            "white" => Rgb::WHITE,
            "black" => Rgb::BLACK,
            "red" => Rgb(255, 0, 0),
            "green" => Rgb(0, 128, 0),
            "blue" => Rgb(0, 0, 255),
            "yellow" => Rgb(255, 255, 0),
            "gray" | "grey" => Rgb(128, 128, 128),
            "lightgray" | "lightgrey" => Rgb(211, 211, 211),
            "darkgray" | "darkgrey" => Rgb(169, 169, 169),
            "orange" => Rgb(255, 165, 0),
            _ => return Err(ColorError(s.to_string())),
        };
        Ok(named)
    }
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => Some(Rgb(nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17)),
        6 => Some(Rgb(byte(0)?, byte(2)?, byte(4)?)),
        _ => None,
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl From<Rgb> for ratatui::style::Color {
    fn from(c: Rgb) -> Self {
        ratatui::style::Color::Rgb(c.0, c.1, c.2)
    }
}
