//! Color handling for Strata diagrams
//!
//! This module provides two color types:
//!
//! - [`Color`] wraps the `DynamicColor` type from the color crate and is used
//!   for user-facing styling such as the diagram background.
//! - [`KeyColor`] is an opaque 24-bit RGB value issued by a [`ColorSequence`].
//!   Key colors tag regions, titles, notes and edge labels in the layout
//!   request so they can be found again in the rendered response, which
//!   keeps no structural identifier for them.

use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use color::DynamicColor;

/// Wrapper around the `DynamicColor` type from the color crate
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Color {
    color: DynamicColor,
}

impl Eq for Color {}

impl Hash for Color {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl Color {
    /// Create a new `Color` from a string
    /// This will parse CSS color strings such as "#ff0000", "rgb(255, 0, 0)", "red", etc.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_core::color::Color;
    ///
    /// let red = Color::new("#ff0000").unwrap();
    /// let blue = Color::new("blue").unwrap();
    /// assert!(Color::new("not-a-color").is_err());
    /// ```
    pub fn new(color_str: &str) -> Result<Self, String> {
        match DynamicColor::from_str(color_str) {
            Ok(color) => Ok(Self { color }),
            Err(err) => Err(format!("invalid color `{color_str}`: {err}")),
        }
    }

    /// Returns the alpha (transparency) component of this color.
    pub fn alpha(&self) -> f32 {
        self.color.components[3]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::new("white").expect("'white' is a valid CSS color")
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.color)
    }
}

impl From<&Color> for svg::node::Value {
    fn from(color: &Color) -> Self {
        Self::from(color.to_string())
    }
}

/// A unique identifying color, valid for one layout pass.
///
/// Rendered as a lowercase `#rrggbb` string, which is the form the layout
/// engine writes back into its response.
///
/// ```
/// use strata_core::color::KeyColor;
///
/// let key = KeyColor::from_rgb(0x0000ff);
/// assert_eq!(key.hex(), "#0000ff");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyColor(u32);

impl KeyColor {
    /// Creates a key color from a packed `0xRRGGBB` value.
    ///
    /// Bits above the low 24 are discarded.
    pub fn from_rgb(rgb: u32) -> Self {
        Self(rgb & 0x00ff_ffff)
    }

    /// Returns the packed `0xRRGGBB` value.
    pub fn rgb(self) -> u32 {
        self.0
    }

    /// Returns the `#rrggbb` form used in requests and searched for in responses.
    pub fn hex(self) -> String {
        format!("#{:06x}", self.0)
    }
}

impl fmt::Display for KeyColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

/// Issues [`KeyColor`]s that are unique for the lifetime of the sequence.
///
/// One sequence is created per layout pass. The sequence starts in the blue
/// channel and steps by a fixed odd increment, so it never produces the pure
/// black or white values the engine uses for its own default strokes and
/// fills.
#[derive(Debug)]
pub struct ColorSequence {
    next: u32,
    issued: usize,
}

impl ColorSequence {
    const FIRST: u32 = 0x0000ff;
    const STEP: u32 = 0x7f;
    /// Number of colors available before the 24-bit space is exhausted.
    pub const CAPACITY: usize = ((0x00ff_fffe - Self::FIRST) / Self::STEP) as usize;

    pub fn new() -> Self {
        Self {
            next: Self::FIRST,
            issued: 0,
        }
    }

    /// Returns the next unused key color.
    ///
    /// # Panics
    ///
    /// Panics when more than [`ColorSequence::CAPACITY`] colors are requested,
    /// since a repeated color would make the response lookup ambiguous.
    pub fn next_color(&mut self) -> KeyColor {
        assert!(
            self.issued < Self::CAPACITY,
            "color sequence exhausted after {} colors",
            self.issued
        );
        let color = KeyColor::from_rgb(self.next);
        self.next += Self::STEP;
        self.issued += 1;
        color
    }

    /// Returns how many colors were issued so far.
    pub fn issued(&self) -> usize {
        self.issued
    }
}

impl Default for ColorSequence {
    fn default() -> Self {
        Self::new()
    }
}
