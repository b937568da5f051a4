//! The static key-mapping table.
//!
//! Literal byte sequences map to a key atom or, for control characters
//! that are really modified printables, to a character. The table covers
//! the sequences xterm, urxvt, the Linux console and derived terminals
//! emit in their various keyboard modes, including the modifyOtherKeys
//! encodings.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::event::{KeyAtom, Modifiers};

/// What a matched sequence decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyKind {
    Atom(KeyAtom),
    /// A control sequence that is really a modified printable character.
    Print(char),
}

pub(crate) type KeyEntry = (KeyKind, Modifiers);

const S: u8 = 1;
const A: u8 = 2;
const C: u8 = 4;
const G: u8 = 8;

fn mods(bits: u8) -> Modifiers {
    Modifiers::from_bits_truncate(bits)
}

/// xterm modifier parameter values 2..=8 and the modifier sets they encode.
const XTERM_MOD_VALUES: [(u8, u8); 7] = [
    (2, S),
    (3, A),
    (4, A | S),
    (5, C),
    (6, C | S),
    (7, C | A),
    (8, C | A | S),
];

struct TableBuilder {
    map: HashMap<Vec<u8>, KeyEntry>,
}

impl TableBuilder {
    fn add(&mut self, seq: &str, atom: KeyAtom, bits: u8) {
        self.map
            .entry(seq.as_bytes().to_vec())
            .or_insert((KeyKind::Atom(atom), mods(bits)));
    }

    fn add_print(&mut self, seq: &str, ch: char, bits: u8) {
        self.map
            .entry(seq.as_bytes().to_vec())
            .or_insert((KeyKind::Print(ch), mods(bits)));
    }

    /// `prefix` `<mod>` `postfix` for every xterm modifier value.
    fn xterm_mods(&mut self, prefix: &str, postfix: &str, atom: KeyAtom) {
        for (value, bits) in XTERM_MOD_VALUES {
            self.add(&format!("{prefix}{value}{postfix}"), atom, bits);
        }
    }

    /// Like [`Self::xterm_mods`] with a `CSI` introducer, doubled with the
    /// `>` variant some xterm keyboard settings add.
    fn xterm_mods_gt(&mut self, mid: &str, postfix: &str, atom: KeyAtom) {
        for (value, bits) in XTERM_MOD_VALUES {
            self.add(&format!("\x1b[{mid}{value}{postfix}"), atom, bits);
            self.add(&format!("\x1b[>{mid}{value}{postfix}"), atom, bits);
        }
    }

    /// rxvt-style `~`/`$`/`^`/`@` final plus ESC-prefixed alt variants.
    fn rxvt_finals(&mut self, base: &str, atom: KeyAtom) {
        self.add(&format!("\x1b[{base}~"), atom, 0);
        self.add(&format!("\x1b[{base}$"), atom, S);
        self.add(&format!("\x1b[{base}^"), atom, C);
        self.add(&format!("\x1b[{base}@"), atom, C | S);
        self.add(&format!("\x1b\x1b[{base}~"), atom, A);
        self.add(&format!("\x1b\x1b[{base}$"), atom, A | S);
        self.add(&format!("\x1b\x1b[{base}^"), atom, C | A);
        self.add(&format!("\x1b\x1b[{base}@"), atom, C | A | S);
    }

    /// Application keypad `SS3 <mod> <final>` plus the unmodified and alt
    /// forms.
    fn ss3_keypad(&mut self, final_ch: char, atom: KeyAtom) {
        self.add(&format!("\x1bO{final_ch}"), atom, 0);
        self.add(&format!("\x1b\x1bO{final_ch}"), atom, A);
        self.xterm_mods("\x1bO", &final_ch.to_string(), atom);
    }
}

#[allow(clippy::too_many_lines)]
fn build_table() -> HashMap<Vec<u8>, KeyEntry> {
    use KeyAtom::*;

    let mut b = TableBuilder {
        map: HashMap::new(),
    };

    b.add("\x0d", Enter, 0); // also ctrl-m in traditional mode
    b.add("\x1b\x0d", Enter, A);
    b.xterm_mods("\x1b[27;", ";13~", Enter); // modifyOtherKeys mode
    b.xterm_mods("\x1b[13;", "u", Enter);

    b.add("\x09", Tab, 0); // also ctrl-i
    b.add("\x1b\x09", Tab, A);
    b.add("\x1b[Z", Tab, S);
    b.xterm_mods("\x1b[27;", ";9~", Tab);
    b.xterm_mods("\x1b[9;", "u", Tab);

    b.add(" ", Space, 0);
    b.add("\x1b ", Space, A);
    // NUL and ESC NUL are special-cased in the classifier
    b.xterm_mods("\x1b[27;", ";32~", Space);
    b.xterm_mods("\x1b[32;", "u", Space);

    b.add("\x1b[29~", ContextMenu, 0);
    b.xterm_mods("\x1b[29;", "~", ContextMenu);

    b.add("\x1b[3~", Delete, 0);
    b.xterm_mods("\x1b[3;", "~", Delete);
    b.rxvt_finals("3", Delete);
    b.add("\x1b[3;1~", Delete, G);

    b.add("\x1b[F", End, 0);
    b.xterm_mods_gt("1;", "F", End);
    b.add("\x1bOF", End, 0);
    b.add("\x1b[4~", End, 0);
    b.rxvt_finals("8", End);
    b.add("\x1b[1;1F", End, G);

    b.add("\x1b[H", Home, 0);
    b.xterm_mods_gt("1;", "H", Home);
    b.add("\x1bOH", Home, 0);
    b.add("\x1b[1~", Home, 0);
    b.rxvt_finals("7", Home);
    b.add("\x1b[1;1H", Home, G);

    b.add("\x1b[2~", Insert, 0);
    b.xterm_mods("\x1b[2;", "~", Insert);
    b.rxvt_finals("2", Insert);
    b.add("\x1b[2;1~", Insert, G);

    b.add("\x1b[6~", PageDown, 0);
    b.xterm_mods("\x1b[6;", "~", PageDown);
    b.rxvt_finals("6", PageDown);
    b.add("\x1b[6;1~", PageDown, G);

    b.add("\x1b[5~", PageUp, 0);
    b.xterm_mods("\x1b[5;", "~", PageUp);
    b.rxvt_finals("5", PageUp);
    b.add("\x1b[5;1~", PageUp, G);

    for (csi_final, ss3_final, rxvt_final, atom) in [
        ('A', 'a', 'a', ArrowUp),
        ('B', 'b', 'b', ArrowDown),
        ('C', 'c', 'c', ArrowRight),
        ('D', 'd', 'd', ArrowLeft),
    ] {
        b.add(&format!("\x1b[{csi_final}"), atom, 0);
        b.xterm_mods_gt("1;", &csi_final.to_string(), atom);
        b.add(&format!("\x1bO{csi_final}"), atom, 0);
        b.add(&format!("\x1b[{rxvt_final}"), atom, S);
        b.add(&format!("\x1bO{ss3_final}"), atom, C);
        b.add(&format!("\x1b\x1b[{csi_final}"), atom, A);
        b.add(&format!("\x1b\x1b[{rxvt_final}"), atom, A | S);
        b.add(&format!("\x1b\x1bO{ss3_final}"), atom, C | A);
        b.add(&format!("\x1b[1;1{csi_final}"), atom, G);
    }

    b.ss3_keypad('o', NumpadDivide);
    b.ss3_keypad('j', NumpadMultiply);
    b.ss3_keypad('m', NumpadSubtract);
    b.ss3_keypad('k', NumpadAdd);
    b.ss3_keypad('M', NumpadEnter);

    b.xterm_mods("\x1bO", "l", NumpadDecimal);
    b.add("\x1bOl", NumpadDecimal, A);
    b.add("\x1bOn", NumpadDecimal, 0);
    b.add("\x1b\x1bOn", NumpadDecimal, A);

    for (i, atom) in [
        Numpad0, Numpad1, Numpad2, Numpad3, Numpad4, Numpad5, Numpad6, Numpad7, Numpad8, Numpad9,
    ]
    .into_iter()
    .enumerate()
    {
        let final_ch = char::from(b'p' + i as u8);
        b.xterm_mods("\x1bO", &final_ch.to_string(), atom);
        b.add(&format!("\x1bO{final_ch}"), atom, 0);
        b.add(&format!("\x1b\x1bO{final_ch}"), atom, A);
    }
    // numpad 5 in normal mode
    b.add("\x1b[E", Numpad5, 0);
    b.xterm_mods_gt("1;", "E", Numpad5);
    b.add("\x1bOE", Numpad5, 0);
    b.add("\x1b[G", Numpad5, 0);

    // bare ESC is special-cased in the decoder
    b.xterm_mods("\x1b[27;", ";27~", Escape);
    b.xterm_mods("\x1b[27;", "u", Escape);
    b.add("\x1b\x1b", Escape, A);

    for (ss3_final, linux_final, shifted_base, legacy_base, atom) in [
        ('P', 'A', 25, 11, F1),
        ('Q', 'B', 26, 12, F2),
        ('R', 'C', 28, 13, F3),
        ('S', 'D', 29, 14, F4),
    ] {
        b.add(&format!("\x1bO{ss3_final}"), atom, 0);
        b.xterm_mods_gt("1;", &ss3_final.to_string(), atom);
        b.xterm_mods("\x1bO", &ss3_final.to_string(), atom);
        b.add(&format!("\x1b[[{linux_final}"), atom, 0);
        if atom != F4 {
            b.add(&format!("\x1b[{shifted_base}~"), atom, S);
        }
        b.add(&format!("\x1b[{shifted_base}^"), atom, C | S);
        b.add(&format!("\x1b\x1b[{shifted_base}~"), atom, A | S);
        b.add(&format!("\x1b\x1b[{shifted_base}^"), atom, C | A | S);
        b.add(&format!("\x1bO1{ss3_final}"), atom, G);
        b.add(&format!("\x1b[{legacy_base}~"), atom, 0);
        b.add(&format!("\x1b[{legacy_base}^"), atom, C);
        b.add(&format!("\x1b\x1b[{legacy_base}~"), atom, A);
        b.add(&format!("\x1b\x1b[{legacy_base}^"), atom, C | A);
    }

    for (base, shifted_base, atom) in [
        (15, Some(31), F5),
        (17, Some(32), F6),
        (18, Some(33), F7),
        (19, Some(34), F8),
        (20, None, F9),
        (21, None, F10),
        (23, None, F11),
        (24, None, F12),
    ] {
        b.add(&format!("\x1b[{base}~"), atom, 0);
        b.add(&format!("\x1b[{base}^"), atom, C);
        b.add(&format!("\x1b\x1b[{base}~"), atom, A);
        b.add(&format!("\x1b\x1b[{base}^"), atom, C | A);
        b.xterm_mods_gt(&format!("{base};"), "~", atom);
        if let Some(shifted) = shifted_base {
            b.add(&format!("\x1b[{shifted}~"), atom, S);
            b.add(&format!("\x1b[{shifted}^"), atom, C | S);
            b.add(&format!("\x1b\x1b[{shifted}~"), atom, A | S);
            b.add(&format!("\x1b\x1b[{shifted}^"), atom, C | A | S);
        } else {
            // F11/F12 use rxvt shifted finals instead
            b.add(&format!("\x1b[{base}$"), atom, S);
            b.add(&format!("\x1b[{base}@"), atom, C | S);
            b.add(&format!("\x1b\x1b[{base}$"), atom, A | S);
            b.add(&format!("\x1b\x1b[{base}@"), atom, C | A | S);
        }
        b.add(&format!("\x1b[{base};1~"), atom, G);
    }
    b.add("\x1b[[E", F5, 0);

    // control characters that are modified printables; \x08, \x09, \x0d
    // and \x1b are keys and handled above or in the decoder
    for i in 1..=0x1au8 {
        if matches!(i, 0x08 | 0x09 | 0x0d) {
            continue;
        }
        let ch = char::from(b'a' + i - 1);
        b.add_print(&String::from(char::from(i)), ch, C);
        b.add_print(&format!("\x1b{}", char::from(i)), ch, C | A);
    }
    for (byte, ch) in [(0x1cu8, '\\'), (0x1d, ']'), (0x1e, '~'), (0x1f, '?')] {
        b.add_print(&String::from(char::from(byte)), ch, C);
        b.add_print(&format!("\x1b{}", char::from(byte)), ch, C | A);
    }

    b.add("\x7f", Backspace, 0);
    b.add("\x08", Backspace, C);
    b.add("\x1b\x08", Backspace, C | A);
    b.add("\x1b\x7f", Backspace, A);
    b.xterm_mods("\x1b[27;", ";127~", Backspace);
    b.xterm_mods("\x1b[127;", "u", Backspace);
    b.xterm_mods("\x1b[27;", ";8~", Backspace);
    b.xterm_mods("\x1b[8;", "u", Backspace);

    b.map
}

pub(crate) fn key_table() -> &'static HashMap<Vec<u8>, KeyEntry> {
    static TABLE: OnceLock<HashMap<Vec<u8>, KeyEntry>> = OnceLock::new();
    TABLE.get_or_init(build_table)
}

/// Whether prepending ESC to `frame` yields a known table sequence; used
/// by the double-ESC deferral.
pub(crate) fn has_alt_variant(frame: &[u8]) -> bool {
    let mut with_esc = Vec::with_capacity(frame.len() + 1);
    with_esc.push(0x1b);
    with_esc.extend_from_slice(frame);
    key_table().contains_key(&with_esc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: &str) -> KeyEntry {
        *key_table().get(seq.as_bytes()).unwrap()
    }

    #[test]
    fn test_basic_atoms() {
        assert_eq!(entry("\x0d"), (KeyKind::Atom(KeyAtom::Enter), mods(0)));
        assert_eq!(entry("\x1b[A"), (KeyKind::Atom(KeyAtom::ArrowUp), mods(0)));
        assert_eq!(entry("\x1b[Z"), (KeyKind::Atom(KeyAtom::Tab), mods(S)));
        assert_eq!(entry("\x7f"), (KeyKind::Atom(KeyAtom::Backspace), mods(0)));
    }

    #[test]
    fn test_xterm_modifier_expansion() {
        assert_eq!(
            entry("\x1b[1;2A"),
            (KeyKind::Atom(KeyAtom::ArrowUp), mods(S))
        );
        assert_eq!(
            entry("\x1b[>1;8H"),
            (KeyKind::Atom(KeyAtom::Home), mods(C | A | S))
        );
        assert_eq!(
            entry("\x1b[27;5;13~"),
            (KeyKind::Atom(KeyAtom::Enter), mods(C))
        );
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(entry("\x1bOP"), (KeyKind::Atom(KeyAtom::F1), mods(0)));
        assert_eq!(entry("\x1b[15~"), (KeyKind::Atom(KeyAtom::F5), mods(0)));
        assert_eq!(entry("\x1b[24;1~"), (KeyKind::Atom(KeyAtom::F12), mods(G)));
        assert_eq!(entry("\x1b[23$"), (KeyKind::Atom(KeyAtom::F11), mods(S)));
    }

    #[test]
    fn test_ctrl_letters_are_print_entries() {
        assert_eq!(entry("\x01"), (KeyKind::Print('a'), mods(C)));
        assert_eq!(entry("\x1b\x1a"), (KeyKind::Print('z'), mods(C | A)));
        assert_eq!(entry("\x1d"), (KeyKind::Print(']'), mods(C)));
        assert!(key_table().get(b"\x08".as_slice()).is_some());
        // \x09 and \x0d are key atoms, not print entries
        assert_eq!(entry("\x09"), (KeyKind::Atom(KeyAtom::Tab), mods(0)));
    }

    #[test]
    fn test_alt_variant_lookup() {
        assert!(has_alt_variant(b"\x1b[3~"));
        assert!(has_alt_variant(b"\x0d"));
        assert!(!has_alt_variant(b"\x1b[0n"));
    }
}
