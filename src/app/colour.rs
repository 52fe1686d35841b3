// Colour - ARGB colours as the phone's settings screen writes them
//
// Accepted forms: "#RRGGBB", "#AARRGGBB", or a colour name

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColourError {
    #[error("Empty colour string")]
    Empty,

    #[error("Invalid hex colour: {0}")]
    InvalidHex(String),

    #[error("Unknown colour name: {0}")]
    UnknownName(String),
}

/// A packed 0xAARRGGBB colour
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Colour(u32);

const NAMED: &[(&str, u32)] = &[
    ("black", 0xFF000000),
    ("darkgray", 0xFF444444),
    ("gray", 0xFF888888),
    ("lightgray", 0xFFCCCCCC),
    ("white", 0xFFFFFFFF),
    ("red", 0xFFFF0000),
    ("green", 0xFF00FF00),
    ("blue", 0xFF0000FF),
    ("yellow", 0xFFFFFF00),
    ("cyan", 0xFF00FFFF),
    ("magenta", 0xFFFF00FF),
    ("aqua", 0xFF00FFFF),
    ("fuchsia", 0xFFFF00FF),
    ("darkgrey", 0xFF444444),
    ("grey", 0xFF888888),
    ("lightgrey", 0xFFCCCCCC),
    ("lime", 0xFF00FF00),
    ("maroon", 0xFF800000),
    ("navy", 0xFF000080),
    ("olive", 0xFF808000),
    ("purple", 0xFF800080),
    ("silver", 0xFFC0C0C0),
    ("teal", 0xFF008080),
];

impl Colour {
    pub const BLACK: Colour = Colour(0xFF000000);
    pub const WHITE: Colour = Colour(0xFFFFFFFF);

    pub const fn from_argb(argb: u32) -> Self {
        Self(argb)
    }

    /// Opaque colour from its channels
    pub const fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        Self(0xFF000000 | (red as u32) << 16 | (green as u32) << 8 | blue as u32)
    }

    pub fn argb(&self) -> u32 {
        self.0
    }

    pub fn alpha(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn red(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(&self) -> u8 {
        self.0 as u8
    }

    /// Look up a colour name, ignoring case
    pub fn named(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        NAMED
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, argb)| Self(*argb))
    }
}

impl FromStr for Colour {
    type Err = ColourError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ColourError::Empty);
        }

        let Some(hex) = s.strip_prefix('#') else {
            return Self::named(s).ok_or_else(|| ColourError::UnknownName(s.to_string()));
        };

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColourError::InvalidHex(s.to_string()));
        }
        let value =
            u32::from_str_radix(hex, 16).map_err(|_| ColourError::InvalidHex(s.to_string()))?;

        match hex.len() {
            6 => Ok(Self(0xFF000000 | value)),
            8 => Ok(Self(value)),
            _ => Err(ColourError::InvalidHex(s.to_string())),
        }
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}
