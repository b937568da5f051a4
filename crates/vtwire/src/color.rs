//! The tagged 32-bit color value.
//!
//! Colors occupy disjoint ranges of a single `u32` so that a cell can carry
//! foreground, background and decoration colors in twelve bytes and the
//! renderer can compare them against the shadow buffer with plain equality:
//!
//! * `0x0000_0000` — terminal default
//! * `0x0100_0000 | r << 16 | g << 8 | b` — direct RGB
//! * `0x0210_0000 + n` for `n` in `0..=15` — named palette colors
//! * `0x0220_0000 + n` for `n` in `0..=255` — indexed palette colors
//!
//! Values outside these ranges behave as the default color.

const RGB_BASE: u32 = 0x0100_0000;
const NAMED_BASE: u32 = 0x0210_0000;
const INDEXED_BASE: u32 = 0x0220_0000;

/// A color in the tagged encoding described in the module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

/// Decoded view of a [`Color`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorKind {
    Default,
    Named(u8),
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    pub const DEFAULT: Color = Color(0);

    pub const BLACK: Color = Color::named(0);
    pub const RED: Color = Color::named(1);
    pub const GREEN: Color = Color::named(2);
    pub const YELLOW: Color = Color::named(3);
    pub const BLUE: Color = Color::named(4);
    pub const MAGENTA: Color = Color::named(5);
    pub const CYAN: Color = Color::named(6);
    pub const LIGHT_GREY: Color = Color::named(7);
    pub const DARK_GREY: Color = Color::named(8);
    pub const BRIGHT_RED: Color = Color::named(9);
    pub const BRIGHT_GREEN: Color = Color::named(10);
    pub const BRIGHT_YELLOW: Color = Color::named(11);
    pub const BRIGHT_BLUE: Color = Color::named(12);
    pub const BRIGHT_MAGENTA: Color = Color::named(13);
    pub const BRIGHT_CYAN: Color = Color::named(14);
    pub const WHITE: Color = Color::named(15);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Color {
        Color(RGB_BASE | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    #[must_use]
    pub const fn named(n: u8) -> Color {
        Color(NAMED_BASE + n as u32)
    }

    #[must_use]
    pub const fn indexed(n: u8) -> Color {
        Color(INDEXED_BASE + n as u32)
    }

    /// Decode the tagged value. Out-of-range values decode as
    /// [`ColorKind::Default`].
    #[must_use]
    pub const fn kind(self) -> ColorKind {
        let v = self.0;
        if v & 0xff00_0000 == RGB_BASE {
            ColorKind::Rgb((v >> 16) as u8, (v >> 8) as u8, v as u8)
        } else if v >= NAMED_BASE && v <= NAMED_BASE + 15 {
            ColorKind::Named((v - NAMED_BASE) as u8)
        } else if v >= INDEXED_BASE && v <= INDEXED_BASE + 255 {
            ColorKind::Indexed((v - INDEXED_BASE) as u8)
        } else {
            ColorKind::Default
        }
    }

    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self.kind(), ColorKind::Default)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::DEFAULT
    }
}

impl From<ColorKind> for Color {
    fn from(kind: ColorKind) -> Self {
        match kind {
            ColorKind::Default => Color::DEFAULT,
            ColorKind::Named(n) => Color::named(n),
            ColorKind::Indexed(n) => Color::indexed(n),
            ColorKind::Rgb(r, g, b) => Color::rgb(r, g, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ranges_are_disjoint() {
        assert_eq!(Color::DEFAULT.kind(), ColorKind::Default);
        assert_eq!(Color::rgb(1, 2, 3).kind(), ColorKind::Rgb(1, 2, 3));
        assert_eq!(Color::named(15).kind(), ColorKind::Named(15));
        assert_eq!(Color::indexed(0).kind(), ColorKind::Indexed(0));
        assert_eq!(Color::indexed(255).kind(), ColorKind::Indexed(255));
        assert_ne!(Color::named(0).0, Color::indexed(0).0);
    }

    #[test]
    fn test_out_of_range_is_default() {
        assert_eq!(Color(NAMED_BASE + 16).kind(), ColorKind::Default);
        assert_eq!(Color(INDEXED_BASE + 256).kind(), ColorKind::Default);
        assert_eq!(Color(0x7fff_ffff).kind(), ColorKind::Default);
    }

    #[test]
    fn test_rgb_black_differs_from_default() {
        assert_ne!(Color::rgb(0, 0, 0), Color::DEFAULT);
        assert_eq!(Color::rgb(0, 0, 0).kind(), ColorKind::Rgb(0, 0, 0));
    }
}
