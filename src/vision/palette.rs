//! Maps an average RGB value onto a small named palette.

use crate::vision::frame::Rgb;
use serde::{Deserialize, Serialize};

/// Named colors the kiosk can talk about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Yellow,
    Green,
    Blue,
    Purple,
    White,
    Black,
    Neutral,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Purple => "purple",
            Color::White => "white",
            Color::Black => "black",
            Color::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an average color.
///
/// Only red, yellow, green, white, black and neutral come out of the
/// thresholds; the rest of the palette exists for callers that already
/// know a color by name. Rules are checked in order.
pub fn classify(rgb: Rgb) -> Color {
    let Rgb { r, g, b } = rgb;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);

    if min >= 200 {
        Color::White
    } else if max <= 60 {
        Color::Black
    } else if max - min <= 30 {
        Color::Neutral
    } else if r >= 150 && g < 100 && b < 100 {
        Color::Red
    } else if r >= 150 && g >= 150 && b < 100 {
        Color::Yellow
    } else if g as u16 >= r as u16 + 30 && g as u16 >= b as u16 + 30 {
        Color::Green
    } else {
        Color::Neutral
    }
}
