//! Cell contents and the style bitfield.

use bitflags::bitflags;
use vtwire::Color;

use crate::overflow::OverflowId;

bitflags! {
    /// Per-cell attribute bits.
    ///
    /// The underline variant occupies two bits so the whole style compares
    /// as one value; [`Style::SOFTWRAP_MARKER`] rides in the same word but
    /// is excluded from attribute comparison via [`Style::ATTR_MASK`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Style: u16 {
        const BOLD = 1 << 0;
        const ITALIC = 1 << 1;
        const UNDERLINE_SINGLE = 1 << 2;
        const UNDERLINE_DOUBLE = 2 << 2;
        const UNDERLINE_CURLY = 3 << 2;
        const BLINK = 1 << 4;
        const OVERLINE = 1 << 5;
        const INVERSE = 1 << 6;
        const STRIKE = 1 << 7;
        const SOFTWRAP_MARKER = 1 << 15;

        const UNDERLINE_MASK = 3 << 2;
        const ATTR_MASK = !(1 << 15);
    }
}

/// The underline variant packed into [`Style::UNDERLINE_MASK`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Underline {
    #[default]
    None,
    Single,
    Double,
    Curly,
}

impl Style {
    #[must_use]
    pub fn underline(self) -> Underline {
        match self & Style::UNDERLINE_MASK {
            Style::UNDERLINE_SINGLE => Underline::Single,
            Style::UNDERLINE_DOUBLE => Underline::Double,
            Style::UNDERLINE_CURLY => Underline::Curly,
            _ => Underline::None,
        }
    }

    #[must_use]
    pub fn with_underline(self, underline: Underline) -> Style {
        let cleared = self & !Style::UNDERLINE_MASK;
        match underline {
            Underline::None => cleared,
            Underline::Single => cleared | Style::UNDERLINE_SINGLE,
            Underline::Double => cleared | Style::UNDERLINE_DOUBLE,
            Underline::Curly => cleared | Style::UNDERLINE_CURLY,
        }
    }

    /// True when the decoration color participates in output.
    #[must_use]
    pub fn has_deco(self) -> bool {
        self.intersects(Style::UNDERLINE_MASK)
    }
}

/// Maximum UTF-8 bytes stored inline in a cell.
pub const INLINE_TEXT_CAP: usize = 8;

/// Maximum UTF-8 bytes of one cluster; further combining codepoints are
/// dropped.
pub const CLUSTER_BYTE_LIMIT: usize = 40;

/// The text slot of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellText {
    /// Cleared but never written; renders as a space.
    #[default]
    Erased,
    /// Cluster text of up to [`INLINE_TEXT_CAP`] UTF-8 bytes.
    Inline { len: u8, bytes: [u8; INLINE_TEXT_CAP] },
    /// Cluster text interned in the surface overflow table.
    Overflow(OverflowId),
    /// Right half of a wide cluster; never carries text.
    WideRightPadding,
}

impl CellText {
    /// Build an inline text slot. Panics if the text exceeds the inline
    /// capacity; callers route longer clusters through the overflow table.
    #[must_use]
    pub fn inline(text: &str) -> CellText {
        assert!(text.len() <= INLINE_TEXT_CAP && !text.is_empty());
        let mut bytes = [0u8; INLINE_TEXT_CAP];
        bytes[..text.len()].copy_from_slice(text.as_bytes());
        CellText::Inline {
            len: text.len() as u8,
            bytes,
        }
    }

    #[must_use]
    pub fn inline_str(&self) -> Option<&str> {
        match self {
            CellText::Inline { len, bytes } => {
                Some(core::str::from_utf8(&bytes[..usize::from(*len)]).unwrap_or("\u{fffd}"))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn is_wide_right_padding(&self) -> bool {
        matches!(self, CellText::WideRightPadding)
    }

    #[must_use]
    pub fn is_erased(&self) -> bool {
        matches!(self, CellText::Erased)
    }
}

/// One cell of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub fg: Color,
    pub bg: Color,
    pub deco: Color,
    pub style: Style,
    /// 0 = no patch, 1..=255 = patch table slot + 1.
    pub patch_idx: u8,
    /// Number of continuation cells following the head cell.
    pub expansion: u8,
    pub text: CellText,
}

impl Cell {
    /// True when the cell starts a cluster (is not a continuation cell).
    #[must_use]
    pub fn is_cluster_head(&self) -> bool {
        !self.text.is_wide_right_padding()
    }

    /// Replace the text with a plain space, keeping attributes.
    pub fn make_space(&mut self) {
        self.text = CellText::inline(" ");
        self.expansion = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underline_packing() {
        let s = Style::BOLD.with_underline(Underline::Curly);
        assert_eq!(s.underline(), Underline::Curly);
        assert!(s.contains(Style::BOLD));
        let s = s.with_underline(Underline::Double);
        assert_eq!(s.underline(), Underline::Double);
        let s = s.with_underline(Underline::None);
        assert_eq!(s.underline(), Underline::None);
        assert!(s.contains(Style::BOLD));
    }

    #[test]
    fn test_deco_participation() {
        assert!(!Style::BOLD.has_deco());
        assert!(Style::empty().with_underline(Underline::Single).has_deco());
    }

    #[test]
    fn test_inline_text() {
        let t = CellText::inline("a\u{308}");
        assert_eq!(t.inline_str(), Some("a\u{308}"));
        assert!(!t.is_wide_right_padding());
    }
}
