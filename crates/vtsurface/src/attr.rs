//! Reusable attribute templates.
//!
//! An [`Attributes`] value is a detached bag of colors, style bits and an
//! optional patch that the application builds once and passes to many
//! writes; writes copy the values into the target cells.

use vtwire::Color;

use crate::cell::Style;

/// A detached formatting template for surface writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    fg: Color,
    bg: Color,
    deco: Color,
    style: Style,
    patch: Option<AttrPatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttrPatch {
    pub optimize: bool,
    pub setup: Vec<u8>,
    pub cleanup: Vec<u8>,
}

impl Attributes {
    #[must_use]
    pub fn new(fg: Color, bg: Color) -> Self {
        Self {
            fg,
            bg,
            deco: Color::DEFAULT,
            style: Style::empty(),
            patch: None,
        }
    }

    #[must_use]
    pub fn fg(&self) -> Color {
        self.fg
    }

    #[must_use]
    pub fn bg(&self) -> Color {
        self.bg
    }

    #[must_use]
    pub fn deco(&self) -> Color {
        self.deco
    }

    #[must_use]
    pub fn style(&self) -> Style {
        self.style
    }

    pub fn set_fg(&mut self, fg: Color) -> &mut Self {
        self.fg = fg;
        self
    }

    pub fn set_bg(&mut self, bg: Color) -> &mut Self {
        self.bg = bg;
        self
    }

    pub fn set_deco(&mut self, deco: Color) -> &mut Self {
        self.deco = deco;
        self
    }

    /// Set the given style bits (underline bits replace the current
    /// underline variant).
    pub fn set_style(&mut self, bits: Style) -> &mut Self {
        if bits.intersects(Style::UNDERLINE_MASK) {
            self.style &= !Style::UNDERLINE_MASK;
        }
        self.style |= bits & Style::ATTR_MASK;
        self
    }

    pub fn unset_style(&mut self, bits: Style) -> &mut Self {
        if bits.intersects(Style::UNDERLINE_MASK) {
            self.style &= !Style::UNDERLINE_MASK;
        }
        self.style &= !(bits & Style::ATTR_MASK);
        self
    }

    pub fn reset_style(&mut self) -> &mut Self {
        self.style = Style::empty();
        self
    }

    /// Attach a patch. Empty setup or cleanup drops the patch silently.
    pub fn set_patch(&mut self, optimize: bool, setup: &[u8], cleanup: &[u8]) -> &mut Self {
        if setup.is_empty() || cleanup.is_empty() {
            self.patch = None;
        } else {
            self.patch = Some(AttrPatch {
                optimize,
                setup: setup.to_vec(),
                cleanup: cleanup.to_vec(),
            });
        }
        self
    }

    pub fn clear_patch(&mut self) -> &mut Self {
        self.patch = None;
        self
    }

    pub(crate) fn patch(&self) -> Option<&AttrPatch> {
        self.patch.as_ref()
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Self::new(Color::DEFAULT, Color::DEFAULT)
    }
}
