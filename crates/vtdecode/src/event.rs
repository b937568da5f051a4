//! Event types produced by the decoder.

use bitflags::bitflags;

bitflags! {
    /// Keyboard modifier bits.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const ALT = 1 << 1;
        const CTRL = 1 << 2;
        const ALTGR = 1 << 3;
    }
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers::empty();
}

/// Key identifiers, named after the W3C uievents-code spec.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAtom {
    Enter,
    Space,
    Tab,
    Backspace,
    ContextMenu,
    Delete,
    End,
    Home,
    Insert,
    PageDown,
    PageUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    NumpadDivide,
    NumpadMultiply,
    NumpadSubtract,
    NumpadAdd,
    NumpadEnter,
    NumpadDecimal,
    Numpad0,
    Numpad1,
    Numpad2,
    Numpad3,
    Numpad4,
    Numpad5,
    Numpad6,
    Numpad7,
    Numpad8,
    Numpad9,
    Escape,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl KeyAtom {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            KeyAtom::Enter => "Enter",
            KeyAtom::Space => "Space",
            KeyAtom::Tab => "Tab",
            KeyAtom::Backspace => "Backspace",
            KeyAtom::ContextMenu => "ContextMenu",
            KeyAtom::Delete => "Delete",
            KeyAtom::End => "End",
            KeyAtom::Home => "Home",
            KeyAtom::Insert => "Insert",
            KeyAtom::PageDown => "PageDown",
            KeyAtom::PageUp => "PageUp",
            KeyAtom::ArrowDown => "ArrowDown",
            KeyAtom::ArrowLeft => "ArrowLeft",
            KeyAtom::ArrowRight => "ArrowRight",
            KeyAtom::ArrowUp => "ArrowUp",
            KeyAtom::NumpadDivide => "NumpadDivide",
            KeyAtom::NumpadMultiply => "NumpadMultiply",
            KeyAtom::NumpadSubtract => "NumpadSubtract",
            KeyAtom::NumpadAdd => "NumpadAdd",
            KeyAtom::NumpadEnter => "NumpadEnter",
            KeyAtom::NumpadDecimal => "NumpadDecimal",
            KeyAtom::Numpad0 => "Numpad0",
            KeyAtom::Numpad1 => "Numpad1",
            KeyAtom::Numpad2 => "Numpad2",
            KeyAtom::Numpad3 => "Numpad3",
            KeyAtom::Numpad4 => "Numpad4",
            KeyAtom::Numpad5 => "Numpad5",
            KeyAtom::Numpad6 => "Numpad6",
            KeyAtom::Numpad7 => "Numpad7",
            KeyAtom::Numpad8 => "Numpad8",
            KeyAtom::Numpad9 => "Numpad9",
            KeyAtom::Escape => "Escape",
            KeyAtom::F1 => "F1",
            KeyAtom::F2 => "F2",
            KeyAtom::F3 => "F3",
            KeyAtom::F4 => "F4",
            KeyAtom::F5 => "F5",
            KeyAtom::F6 => "F6",
            KeyAtom::F7 => "F7",
            KeyAtom::F8 => "F8",
            KeyAtom::F9 => "F9",
            KeyAtom::F10 => "F10",
            KeyAtom::F11 => "F11",
            KeyAtom::F12 => "F12",
        }
    }
}

/// Atoms for events that are neither keys nor characters.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiscAtom {
    FocusIn,
    FocusOut,
    PasteBegin,
    PasteEnd,
    /// Reply to the `CSI 5 n` status query; marks "all prior replies have
    /// arrived".
    Resync,
}

impl MiscAtom {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MiscAtom::FocusIn => "FocusIn",
            MiscAtom::FocusOut => "FocusOut",
            MiscAtom::PasteBegin => "PasteBegin",
            MiscAtom::PasteEnd => "PasteEnd",
            MiscAtom::Resync => "i_resync",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Press,
    Release,
    Move,
}

/// ANSI vs DEC private mode in a mode status report.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeReportKind {
    Ansi,
    Dec,
}

/// A decoded terminal event.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A printable keystroke.
    Char { ch: char, modifier: Modifiers },
    /// A keystroke identified by an atom.
    Key { atom: KeyAtom, modifier: Modifiers },
    Mouse {
        x: i32,
        y: i32,
        raw_button_and_flags: u16,
        button: u8,
        action: MouseAction,
        modifier: Modifiers,
    },
    /// One chunk of a grouped paste. The empty `initial` and `last` chunks
    /// bracket the content chunks.
    Paste {
        text: String,
        initial: bool,
        last: bool,
    },
    CursorPosition { x: i32, y: i32, safe: bool },
    /// `OSC n ; color ST` reply for a color slot (10..=14, 17, 19,
    /// 705..=708). The color is the raw specification text.
    ColorSlotReport { slot: u32, color: Vec<u8> },
    /// `OSC 4 ; index ; color ST` reply. `index` is `None` for the
    /// index-less urxvt form.
    PaletteColorReport {
        index: Option<u16>,
        color: Vec<u8>,
    },
    ModeReport {
        kind: ModeReportKind,
        number: u32,
        status: u32,
    },
    /// `CSI ? … c` reply, whole frame bytes.
    RawPrimaryDeviceAttributes(Vec<u8>),
    /// `CSI > … c` reply, whole frame bytes.
    RawSecondaryDeviceAttributes(Vec<u8>),
    /// `DCS ! | … ST` reply, hex payload only.
    RawTertiaryDeviceAttributes(Vec<u8>),
    /// `CSI … x` reply (DECREQTPARM), whole frame bytes.
    RawDecRequestTermParam(Vec<u8>),
    /// `DCS > | … ST` reply, payload only.
    RawTermName(Vec<u8>),
    /// `DCS {0|1} + r … ST` reply, payload starting at the status digit.
    RawTerminfoQueryReply(Vec<u8>),
    Misc(MiscAtom),
    /// Terminal identification finished; the event callback now receives
    /// input events.
    AutoDetectFinished,
    /// State changed behind the application's back; a full repaint is
    /// advisable.
    RepaintRequested,
    /// An input frame exceeded the tokenizer arena and was dropped.
    Overflow,
    /// Bytes that look like UTF-8 but fail validation.
    InvalidUtf8,
}

impl Event {
    #[must_use]
    pub fn key(atom: KeyAtom, modifier: Modifiers) -> Event {
        Event::Key { atom, modifier }
    }

    #[must_use]
    pub fn ch(ch: char, modifier: Modifiers) -> Event {
        Event::Char { ch, modifier }
    }

    #[must_use]
    pub fn is_resync(&self) -> bool {
        matches!(self, Event::Misc(MiscAtom::Resync))
    }
}
