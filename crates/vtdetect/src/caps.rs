//! Terminal capabilities.

use bitflags::bitflags;

/// One probe-able terminal capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `CSI ?6n` is answered and does not collide with user input parsers.
    SafePositionReport,
    /// `CSI > …` sequences are parsed instead of echoed or misparsed.
    CsiGreater,
    /// `CSI = …` sequences are parsed.
    CsiEquals,
    /// Postfix intermediates in CSI sequences are parsed.
    CsiPostfixMod,
    /// Window title can be saved and restored via the title stack.
    TitleRestore,
    /// The bar cursor shape may be requested.
    MayTryCursorShapeBar,
    /// Cursor shape must be set via `OSC 50` (konsole family).
    CursorShapeOsc50,
    /// A reasonably complete unicode glyph repertoire is available.
    ExtendedCharset,
    /// Truecolor SGR sequences might be understood; worth trying.
    TruecolorMaybeSupported,
    /// Truecolor SGR sequences are known to be understood.
    TruecolorSupported,
    /// The palette has 88 entries instead of 256 (urxvt).
    Color88,
    /// Cleared cells keep their background color (BCE with per-clear
    /// colors); enables `CSI K` line-tail optimization.
    ClearedColoring,
    /// `ESC \` is accepted as string terminator.
    SevenBitSt,
    /// Cursor shape sequences may be sent at all.
    MayTryCursorShape,
    /// Bracketed paste may be enabled.
    MayTryTaggedPaste,
    /// Cleared coloring also applies to the default background color.
    ClearedColoringDefaultColor,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct CapBits: u16 {
        const SAFE_POSITION_REPORT = 1 << 0;
        const CSI_GREATER = 1 << 1;
        const CSI_EQUALS = 1 << 2;
        const CSI_POSTFIX_MOD = 1 << 3;
        const TITLE_RESTORE = 1 << 4;
        const MAY_TRY_CURSOR_SHAPE_BAR = 1 << 5;
        const CURSOR_SHAPE_OSC50 = 1 << 6;
        const EXTENDED_CHARSET = 1 << 7;
        const TRUECOLOR_MAYBE_SUPPORTED = 1 << 8;
        const TRUECOLOR_SUPPORTED = 1 << 9;
        const COLOR_88 = 1 << 10;
        const CLEARED_COLORING = 1 << 11;
        const SEVEN_BIT_ST = 1 << 12;
        const MAY_TRY_CURSOR_SHAPE = 1 << 13;
        const MAY_TRY_TAGGED_PASTE = 1 << 14;
        const CLEARED_COLORING_DEFAULT_COLOR = 1 << 15;
    }
}

impl Capability {
    fn bit(self) -> CapBits {
        match self {
            Capability::SafePositionReport => CapBits::SAFE_POSITION_REPORT,
            Capability::CsiGreater => CapBits::CSI_GREATER,
            Capability::CsiEquals => CapBits::CSI_EQUALS,
            Capability::CsiPostfixMod => CapBits::CSI_POSTFIX_MOD,
            Capability::TitleRestore => CapBits::TITLE_RESTORE,
            Capability::MayTryCursorShapeBar => CapBits::MAY_TRY_CURSOR_SHAPE_BAR,
            Capability::CursorShapeOsc50 => CapBits::CURSOR_SHAPE_OSC50,
            Capability::ExtendedCharset => CapBits::EXTENDED_CHARSET,
            Capability::TruecolorMaybeSupported => CapBits::TRUECOLOR_MAYBE_SUPPORTED,
            Capability::TruecolorSupported => CapBits::TRUECOLOR_SUPPORTED,
            Capability::Color88 => CapBits::COLOR_88,
            Capability::ClearedColoring => CapBits::CLEARED_COLORING,
            Capability::SevenBitSt => CapBits::SEVEN_BIT_ST,
            Capability::MayTryCursorShape => CapBits::MAY_TRY_CURSOR_SHAPE,
            Capability::MayTryTaggedPaste => CapBits::MAY_TRY_TAGGED_PASTE,
            Capability::ClearedColoringDefaultColor => CapBits::CLEARED_COLORING_DEFAULT_COLOR,
        }
    }
}

/// The set of capabilities the terminal is currently believed to have,
/// with the derived `use_truecolor` cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySet {
    bits: CapBits,
    use_truecolor: bool,
}

impl CapabilitySet {
    /// Pre-detection defaults: a terminal is assumed to render unicode,
    /// accept bar cursors, possibly accept truecolor, color its cleared
    /// cells and accept 7-bit string terminators until proven otherwise.
    #[must_use]
    pub fn new() -> Self {
        let mut set = Self {
            bits: CapBits::empty(),
            use_truecolor: false,
        };
        set.promise(Capability::MayTryCursorShapeBar);
        set.promise(Capability::ExtendedCharset);
        set.promise(Capability::TruecolorMaybeSupported);
        set.promise(Capability::ClearedColoring);
        set.promise(Capability::SevenBitSt);
        set
    }

    /// Empty capability set, as detection failure falls back to.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            bits: CapBits::empty(),
            use_truecolor: false,
        }
    }

    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.bits.contains(capability.bit())
    }

    pub fn promise(&mut self, capability: Capability) {
        self.bits |= capability.bit();
        self.update_cache();
    }

    pub fn disable(&mut self, capability: Capability) {
        self.bits &= !capability.bit();
        self.update_cache();
    }

    fn update_cache(&mut self) {
        self.use_truecolor = self.bits.contains(CapBits::TRUECOLOR_MAYBE_SUPPORTED)
            || self.bits.contains(CapBits::TRUECOLOR_SUPPORTED);
    }

    /// Cached `truecolor-maybe ∨ truecolor-yes`.
    #[must_use]
    pub fn use_truecolor(&self) -> bool {
        self.use_truecolor
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::new()
    }
}
