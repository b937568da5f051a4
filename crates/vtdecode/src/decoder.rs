//! The stateful decoder layered over tokenizer and classifier.

use crate::classify::{Classified, ClassifyCtx, classify};
use crate::event::{Event, KeyAtom, MiscAtom, Modifiers};
use crate::table::{KeyEntry, KeyKind, has_alt_variant};
use crate::tokenizer::{MAX_SEQ_LENGTH, Step, Tokenizer};

/// Coordinate encoding expected for legacy (non-SGR) mouse reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegacyMouseMode {
    #[default]
    Off,
    /// Single byte per coordinate (modes 1000/1002/1003).
    SingleByte,
    /// UTF-8 encoded coordinates (mode 1005).
    Multibyte,
}

/// Activatable input quirks for terminals with known deviations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quirk {
    /// The terminal sends 0x08 for plain backspace and 0x7f for
    /// ctrl-backspace.
    BackspaceX08AndX7fSwapped,
    /// The terminal sends C1 bytes for ctrl-shift-letter combinations.
    C1ForCtrlShift,
}

struct DecoderFlags {
    esc_pending: bool,
    expect_cursor_position_report: i32,
    in_paste: bool,
    handle_paste: bool,
    quirks: Vec<(Vec<u8>, KeyEntry)>,
}

/// Turns raw terminal input bytes into [`Event`]s.
///
/// Push bytes with [`feed_with`](Self::feed_with); events are delivered to
/// the callback in the order their terminating bytes were consumed. The
/// decoder never performs I/O and holds no timers: a trailing lone ESC
/// stays buffered until further input (or the reply to a resync query)
/// arrives.
pub struct InputDecoder {
    tokenizer: Tokenizer,
    flags: DecoderFlags,
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            flags: DecoderFlags {
                esc_pending: false,
                expect_cursor_position_report: 0,
                in_paste: false,
                handle_paste: true,
                quirks: Vec::new(),
            },
        }
    }

    /// Bytes buffered for an incomplete frame (plus a deferred ESC).
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.tokenizer.used + usize::from(self.flags.esc_pending)
    }

    /// Register one more expected cursor position report; gates the
    /// classification of `CSI … R` frames that collide with key encodings.
    pub fn expect_cursor_position_report(&mut self) {
        self.flags.expect_cursor_position_report += 1;
    }

    pub fn expect_legacy_mouse_reports(&mut self, mode: LegacyMouseMode) {
        self.tokenizer.expect_mouse_char_mode = mode == LegacyMouseMode::SingleByte;
        self.tokenizer.expect_mouse_multibyte_mode = mode == LegacyMouseMode::Multibyte;
    }

    pub fn expect_apc_sequences(&mut self, enable: bool) {
        self.tokenizer.expect_apc = enable;
    }

    /// Toggle paste grouping, which starts out enabled. While enabled,
    /// bracketed paste markers group the pasted characters into `Paste`
    /// events; when disabled the markers surface as `Misc` events.
    pub fn handle_paste(&mut self, enable: bool) {
        self.flags.handle_paste = enable;
        if !enable {
            self.flags.in_paste = false;
        }
    }

    pub fn activate_quirk(&mut self, quirk: Quirk) {
        match quirk {
            Quirk::BackspaceX08AndX7fSwapped => {
                self.flags.quirks.insert(
                    0,
                    (
                        b"\x7f".to_vec(),
                        (KeyKind::Atom(KeyAtom::Backspace), Modifiers::CTRL),
                    ),
                );
                self.flags.quirks.insert(
                    0,
                    (
                        b"\x08".to_vec(),
                        (KeyKind::Atom(KeyAtom::Backspace), Modifiers::NONE),
                    ),
                );
            }
            Quirk::C1ForCtrlShift => {
                self.flags.quirks.insert(
                    0,
                    (
                        b"\xc2\x80".to_vec(),
                        (
                            KeyKind::Atom(KeyAtom::Space),
                            Modifiers::CTRL | Modifiers::SHIFT,
                        ),
                    ),
                );
                for i in 0..26u8 {
                    let mut seq = String::new();
                    seq.push(char::from_u32(0x81 + u32::from(i)).expect("valid codepoint"));
                    self.flags.quirks.insert(
                        0,
                        (
                            seq.into_bytes(),
                            (
                                KeyKind::Print(char::from(b'A' + i)),
                                Modifiers::CTRL | Modifiers::SHIFT,
                            ),
                        ),
                    );
                }
            }
        }
    }

    /// Feed bytes, delivering events to `cb`.
    pub fn feed_with<F: FnMut(Event)>(&mut self, data: &[u8], cb: &mut F) {
        self.feed_with_filter(data, &mut |_frame: &[u8], _overflow: bool| false, cb);
    }

    /// Feed bytes with a raw-frame filter. The filter sees each complete
    /// frame before classification; returning `true` swallows the frame.
    pub fn feed_with_filter<R, F>(&mut self, data: &[u8], raw_filter: &mut R, cb: &mut F)
    where
        R: FnMut(&[u8], bool) -> bool,
        F: FnMut(Event),
    {
        for &byte in data {
            loop {
                if self.tokenizer.used == MAX_SEQ_LENGTH {
                    // frame too long: drop it, remember the overflow
                    self.tokenizer.used = 0;
                    self.tokenizer.overflow = true;
                }
                self.tokenizer.buff[self.tokenizer.used] = byte;
                self.tokenizer.used += 1;

                match self.tokenizer.step() {
                    Step::Finished => {
                        let used = self.tokenizer.used;
                        Self::process_frame(
                            &self.tokenizer.buff[..used],
                            self.tokenizer.overflow,
                            &mut self.flags,
                            raw_filter,
                            cb,
                        );
                        self.tokenizer.reset();
                        break;
                    }
                    Step::RetriggerCsi => {
                        // the last two bytes were not part of the frame and
                        // start a fresh CSI
                        let used = self.tokenizer.used;
                        let cut = used.saturating_sub(2);
                        Self::process_frame(
                            &self.tokenizer.buff[..cut],
                            self.tokenizer.overflow,
                            &mut self.flags,
                            raw_filter,
                            cb,
                        );
                        self.tokenizer.reset();
                        self.tokenizer.buff[0] = 0x1b;
                        self.tokenizer.buff[1] = b'[';
                        self.tokenizer.used = 2;
                        self.tokenizer.resume_csi();
                        break;
                    }
                    Step::Retrigger => {
                        // the current byte is not part of the frame
                        let used = self.tokenizer.used;
                        Self::process_frame(
                            &self.tokenizer.buff[..used - 1],
                            self.tokenizer.overflow,
                            &mut self.flags,
                            raw_filter,
                            cb,
                        );
                        self.tokenizer.reset();
                        // reprocess the byte in ground state
                    }
                    Step::Continue => break,
                }
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn process_frame<R, F>(
        frame: &[u8],
        overflow: bool,
        flags: &mut DecoderFlags,
        raw_filter: &mut R,
        cb: &mut F,
    ) where
        R: FnMut(&[u8], bool) -> bool,
        F: FnMut(Event),
    {
        // double ESC: defer a lone ESC one frame, then either fuse it as
        // an alt modifier or emit it as a bare Escape key
        let mut fused = [0u8; 21];
        let mut frame = frame;

        if overflow {
            flags.esc_pending = false;
        } else if !flags.esc_pending {
            if frame == [0x1b] {
                // next frame or the resync reply decides what this was
                flags.esc_pending = true;
                return;
            }
        } else {
            flags.esc_pending = false;

            if frame.len() + 1 < fused.len() && has_alt_variant(frame) {
                fused[0] = 0x1b;
                fused[1..=frame.len()].copy_from_slice(frame);
                frame = &fused[..=frame.len()];
                return Self::process_frame(frame, false, flags, raw_filter, cb);
            }
            // two separate events: the bare Escape plus the decoded frame
            if !raw_filter(b"\x1b", false) {
                cb(Event::key(KeyAtom::Escape, Modifiers::NONE));
            }
        }

        if raw_filter(frame, overflow) {
            return;
        }

        if overflow {
            if !flags.in_paste {
                cb(Event::Overflow);
            }
            return;
        }
        if frame.is_empty() {
            return;
        }

        let mut ctx = ClassifyCtx {
            quirks: &flags.quirks,
            expect_cursor_position_report: &mut flags.expect_cursor_position_report,
        };
        let event = match classify(frame, &mut ctx) {
            Classified::PasteBegin => {
                if flags.handle_paste {
                    flags.in_paste = true;
                    cb(Event::Paste {
                        text: String::new(),
                        initial: true,
                        last: false,
                    });
                    return;
                }
                Some(Event::Misc(MiscAtom::PasteBegin))
            }
            Classified::PasteEnd => {
                if flags.handle_paste {
                    flags.in_paste = false;
                    cb(Event::Paste {
                        text: String::new(),
                        initial: false,
                        last: true,
                    });
                    return;
                }
                Some(Event::Misc(MiscAtom::PasteEnd))
            }
            Classified::Event(event) => Some(event),
            Classified::None => None,
        };

        if flags.in_paste {
            // inside a paste, only plain characters pass through, recast
            // as paste chunks; terminals are not trusted to filter escape
            // sequences out of pasted content
            match event {
                Some(Event::Char { ch, modifier }) if modifier == Modifiers::NONE => {
                    cb(Event::Paste {
                        text: ch.to_string(),
                        initial: false,
                        last: false,
                    });
                }
                Some(Event::Char { ch: 'j', modifier }) if modifier == Modifiers::CTRL => {
                    // some terminals send line breaks as bare 0x0a
                    cb(Event::Paste {
                        text: "\n".to_owned(),
                        initial: false,
                        last: false,
                    });
                }
                Some(Event::Key { atom, modifier }) if modifier == Modifiers::NONE => {
                    let text = match atom {
                        KeyAtom::Space => Some(" "),
                        KeyAtom::Tab => Some("\t"),
                        KeyAtom::Enter => Some("\r"),
                        _ => None,
                    };
                    if let Some(text) = text {
                        cb(Event::Paste {
                            text: text.to_owned(),
                            initial: false,
                            last: false,
                        });
                    }
                }
                _ => {}
            }
        } else if let Some(event) = event {
            cb(event);
        }
    }
}
