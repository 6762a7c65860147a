use serde::{Deserialize, Serialize};

use super::ColorId;

/// Entry of the fixed note color palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    id: ColorId,
    name: String,
    hex: String,
}

impl Color {
    /// The palette seeded into every database, in id order starting at 1.
    ///
    /// The first entry is the color of notes that have none assigned.
    pub const PALETTE: &'static [(&'static str, &'static str)] = &[
        ("white", "#FFFFFF"),
        ("red", "#F28B82"),
        ("orange", "#FBBC04"),
        ("yellow", "#FFF475"),
        ("green", "#CCFF90"),
        ("teal", "#A7FFEB"),
        ("blue", "#AECBFA"),
        ("purple", "#D7AEFB"),
        ("gray", "#E8EAED"),
    ];

    /// Creates a new color.
    pub fn new(id: ColorId, name: impl Into<String>, hex: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            hex: hex.into(),
        }
    }

    /// The color shown for notes without an assigned color.
    ///
    /// # Examples
    ///
    /// ```
    /// use notemaker::{Color, ColorId};
    ///
    /// let color = Color::default_color();
    /// assert_eq!(color.id(), ColorId::new(1));
    /// assert_eq!(color.hex(), "#FFFFFF");
    /// ```
    pub fn default_color() -> Self {
        let (name, hex) = Self::PALETTE[0];
        Self::new(ColorId::new(1), name, hex)
    }

    /// Returns the color's identifier.
    pub fn id(&self) -> ColorId {
        self.id
    }

    /// Returns the human-readable color name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the color as `#RRGGBB`.
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::default_color()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_entries_are_hex_triplets() {
        for (name, hex) in Color::PALETTE {
            assert_eq!(hex.len(), 7, "{name} should be #RRGGBB");
            assert!(hex.starts_with('#'));
            assert!(hex[1..].chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn default_is_first_palette_entry() {
        assert_eq!(Color::default().name(), "white");
    }
}
