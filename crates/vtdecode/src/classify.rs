//! Frame classification.
//!
//! A completed frame is matched against the key table, then against the
//! recognized CSI, OSC and DCS reply shapes. Classification is pure aside
//! from the cursor-position-report expectation counter, which gates the
//! ambiguous `CSI … R` frames.

use crate::csi::parse_csi_shape;
use crate::event::{
    Event, KeyAtom, MiscAtom, ModeReportKind, Modifiers, MouseAction,
};
use crate::table::{KeyEntry, KeyKind, key_table};

/// Classification result; paste markers are handled statefully by the
/// decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Classified {
    Event(Event),
    PasteBegin,
    PasteEnd,
    None,
}

fn key_entry_event(entry: KeyEntry) -> Event {
    match entry.0 {
        KeyKind::Atom(atom) => Event::Key {
            atom,
            modifier: entry.1,
        },
        KeyKind::Print(ch) => Event::Char {
            ch,
            modifier: entry.1,
        },
    }
}

fn xterm_modifiers(param: i32) -> Modifiers {
    let bits = (param.max(1) - 1) as u8;
    let mut mods = Modifiers::empty();
    if bits & 1 != 0 {
        mods |= Modifiers::SHIFT;
    }
    if bits & 2 != 0 {
        mods |= Modifiers::ALT;
    }
    if bits & 4 != 0 {
        mods |= Modifiers::CTRL;
    }
    mods
}

fn mouse_event(raw: i32, x: i32, y: i32, mode: MouseFinal) -> Event {
    let raw = raw as u16;
    let mut button = (raw & 0x3) as u8;
    if raw & 0x40 != 0 {
        button |= 4;
    }
    if raw & 0x80 != 0 {
        button |= 8;
    }

    let mut modifier = Modifiers::empty();
    if raw & 0x4 != 0 {
        modifier |= Modifiers::SHIFT;
    }
    if raw & 0x8 != 0 {
        modifier |= Modifiers::ALT;
    }
    if raw & 0x10 != 0 {
        modifier |= Modifiers::CTRL;
    }

    let action = if raw & 0x20 != 0 {
        MouseAction::Move
    } else {
        match mode {
            MouseFinal::Legacy => {
                if button == 3 {
                    MouseAction::Release
                } else {
                    MouseAction::Press
                }
            }
            MouseFinal::SgrRelease => MouseAction::Release,
            MouseFinal::SgrPress => MouseAction::Press,
        }
    };

    Event::Mouse {
        x,
        y,
        raw_button_and_flags: raw,
        button,
        action,
        modifier,
    }
}

#[derive(Debug, Clone, Copy)]
enum MouseFinal {
    /// Release is encoded in the button bits.
    Legacy,
    SgrRelease,
    SgrPress,
}

/// Decode one coordinate of a multibyte legacy mouse report.
fn decode_coord(bytes: &[u8]) -> Option<(i32, usize)> {
    let first = *bytes.first()?;
    let len = if first & 0x80 == 0 {
        1
    } else if first & 0xe0 == 0xc0 {
        2
    } else if first & 0xf0 == 0xe0 {
        3
    } else if first & 0xf8 == 0xf0 {
        4
    } else {
        return None;
    };
    if bytes.len() < len {
        return None;
    }
    let s = core::str::from_utf8(&bytes[..len]).ok()?;
    let cp = s.chars().next()? as i32;
    Some((cp, len))
}

fn parse_multibyte_mouse(data: &[u8]) -> Option<(i32, i32, i32)> {
    // three coordinates, no trailing garbage
    let (a, a_len) = decode_coord(data)?;
    if a_len >= data.len() {
        return None;
    }
    let (b_val, b_len) = decode_coord(&data[a_len..])?;
    if a_len + b_len >= data.len() {
        return None;
    }
    let (c_val, c_len) = decode_coord(&data[a_len + b_len..])?;
    if a_len + b_len + c_len != data.len() {
        return None;
    }
    Some((a, b_val, c_val))
}

pub(crate) struct ClassifyCtx<'a> {
    pub quirks: &'a [(Vec<u8>, KeyEntry)],
    pub expect_cursor_position_report: &'a mut i32,
}

#[allow(clippy::too_many_lines)]
pub(crate) fn classify(frame: &[u8], ctx: &mut ClassifyCtx<'_>) -> Classified {
    let len = frame.len();
    if len == 0 {
        return Classified::None;
    }

    if len == 1 && frame[0] == 0 {
        return Classified::Event(Event::key(KeyAtom::Space, Modifiers::CTRL));
    }
    if len == 2 && frame[0] == 0x1b && frame[1] == 0 {
        return Classified::Event(Event::key(
            KeyAtom::Space,
            Modifiers::CTRL | Modifiers::ALT,
        ));
    }

    let mut event: Option<Event> = None;

    for (sequence, entry) in ctx.quirks {
        if sequence.as_slice() == frame {
            event = Some(key_entry_event(*entry));
            break;
        }
    }
    if event.is_none() {
        if let Some(entry) = key_table().get(frame) {
            event = Some(key_entry_event(*entry));
        }
    }

    if frame == b"\x1b[0n" {
        return Classified::Event(Event::Misc(MiscAtom::Resync));
    }

    if event.is_none() && len >= 2 && frame[0] == 0x1b && frame[1] & 0xc0 == 0xc0 {
        // the tokenizer only aborts on malformed continuation bytes, so
        // revalidate and report bad sequences distinctly
        event = Some(match core::str::from_utf8(&frame[1..]) {
            Ok(s) => match s.chars().next() {
                Some(ch) => Event::ch(ch, Modifiers::ALT),
                None => Event::InvalidUtf8,
            },
            Err(_) => Event::InvalidUtf8,
        });
    }
    if event.is_none() && len == 2 && frame[0] == 0x1b && frame[1] > 32 && frame[1] < 127 {
        event = Some(Event::ch(char::from(frame[1]), Modifiers::ALT));
    }
    if event.is_none() && frame[0] & 0xc0 == 0xc0 {
        event = Some(match core::str::from_utf8(frame) {
            Ok(s) => match s.chars().next() {
                Some(ch) => Event::ch(ch, Modifiers::NONE),
                None => Event::InvalidUtf8,
            },
            Err(_) => Event::InvalidUtf8,
        });
    }
    if event.is_none() && len == 1 && frame[0] > 32 && frame[0] < 127 {
        event = Some(Event::ch(char::from(frame[0]), Modifiers::NONE));
    }

    if len > 2 && frame[0] == 0x1b && frame[1] == b'[' {
        let shape = parse_csi_shape(frame);

        // legacy mouse: the CSI is just a prefix, coordinates follow raw
        if event.is_none() && len >= 6 && frame[2] == b'M' {
            if len == 6 {
                if frame[3] >= 32 && frame[4] > 32 && frame[5] > 32 {
                    // only translate reports that did not overflow the
                    // single byte coordinate encoding
                    event = Some(mouse_event(
                        i32::from(frame[3]) - 32,
                        i32::from(frame[4]) - 33,
                        i32::from(frame[5]) - 33,
                        MouseFinal::Legacy,
                    ));
                }
            } else if let Some((btn, x, y)) = parse_multibyte_mouse(&frame[3..]) {
                if btn >= 32 && x > 32 && y > 32 {
                    event = Some(mouse_event(btn - 32, x - 33, y - 33, MouseFinal::Legacy));
                }
            }
        }

        if let Some(shape) = shape {
            // urxvt mouse mode 1015
            if event.is_none() && shape.is(b'M', 0, 0) && len > 7 {
                if shape.args.len() == 3 && !shape.has_sub_args {
                    let btn = shape.arg_or(0, 0);
                    let x = shape.arg_or(1, 0);
                    let y = shape.arg_or(2, 0);
                    if btn >= 32 && x > 0 && y > 0 {
                        event = Some(mouse_event(btn - 32, x - 1, y - 1, MouseFinal::Legacy));
                    }
                }
            }

            // SGR mouse mode 1006
            if event.is_none()
                && len > 8
                && (shape.is(b'M', b'<', 0) || shape.is(b'm', b'<', 0))
                && shape.args.len() == 3
                && !shape.has_sub_args
            {
                let btn = shape.arg_or(0, 0);
                let x = shape.arg_or(1, 0);
                let y = shape.arg_or(2, 0);
                if x > 0 && y > 0 {
                    let mode = if shape.final_byte == b'm' {
                        MouseFinal::SgrRelease
                    } else {
                        MouseFinal::SgrPress
                    };
                    event = Some(mouse_event(btn, x - 1, y - 1, mode));
                }
            }

            // modifyOtherKeys: CSI 27;<mod>;<char>~ and CSI <char>;<mod>u
            if event.is_none()
                && ((shape.is(b'~', 0, 0) && shape.args.len() >= 3 && shape.arg(0) == Some(27))
                    || (shape.is(b'u', 0, 0) && shape.args.len() >= 2 && !shape.has_sub_args))
            {
                let (cp, modifier) = if shape.final_byte == b'u' {
                    (shape.arg_or(0, 0), shape.arg_or(1, 0))
                } else {
                    (shape.arg_or(2, 0), shape.arg_or(1, 0))
                };
                // an absent modifier parameter defaults to 1
                let modifier = if modifier == 0 { 1 } else { modifier };
                if cp >= 32 && cp != 0x7f && !(0x80..=0xa0).contains(&cp) {
                    if let Some(ch) = u32::try_from(cp).ok().and_then(char::from_u32) {
                        event = Some(Event::ch(ch, xterm_modifiers(modifier)));
                    }
                }
            }

            // cursor position report, gated on expectation for the frames
            // that collide with modified key encodings
            if (event.is_none() || *ctx.expect_cursor_position_report > 0)
                && len > 5
                && (shape.is(b'R', 0, 0) || shape.is(b'R', b'?', 0))
                && shape.args.len() >= 2
                && !shape.has_sub_args
            {
                let y = shape.arg_or(0, 0);
                let x = shape.arg_or(1, 0);
                if x > 0 && y > 0 {
                    if shape.prefix == 0 {
                        *ctx.expect_cursor_position_report =
                            (*ctx.expect_cursor_position_report - 1).max(0);
                    }
                    event = Some(Event::CursorPosition {
                        x: x - 1,
                        y: y - 1,
                        safe: shape.prefix == b'?',
                    });
                }
            }

            if event.is_none()
                && shape.args.is_empty()
                && shape.prefix == 0
                && shape.postfix == 0
                && (shape.final_byte == b'I' || shape.final_byte == b'O')
            {
                event = Some(Event::Misc(if shape.final_byte == b'I' {
                    MiscAtom::FocusIn
                } else {
                    MiscAtom::FocusOut
                }));
            }

            if event.is_none() && shape.is(b'~', 0, 0) && !shape.has_sub_args {
                match shape.arg(0) {
                    Some(200) => return Classified::PasteBegin,
                    Some(201) => return Classified::PasteEnd,
                    _ => {}
                }
            }

            if event.is_none() {
                if len > 5
                    && (shape.is(b'y', 0, b'$') || shape.is(b'y', b'?', b'$'))
                    && shape.args.len() >= 2
                    && !shape.has_sub_args
                {
                    event = Some(Event::ModeReport {
                        kind: if shape.prefix == b'?' {
                            ModeReportKind::Dec
                        } else {
                            ModeReportKind::Ansi
                        },
                        number: shape.arg_or(0, 0).max(0) as u32,
                        status: shape.arg_or(1, 0).max(0) as u32,
                    });
                }

                if shape.is(b'c', b'>', 0) {
                    event = Some(Event::RawSecondaryDeviceAttributes(frame.to_vec()));
                }
                if shape.is(b'c', b'?', 0) {
                    event = Some(Event::RawPrimaryDeviceAttributes(frame.to_vec()));
                }
                // VTE < 0.54 answers CSI 1x with a '?' prefix
                if shape.is(b'x', 0, 0) || shape.is(b'x', b'?', 0) {
                    event = Some(Event::RawDecRequestTermParam(frame.to_vec()));
                }
            }
        }
    }

    if event.is_none() && len > 5 && frame[0] == 0x1b && frame[1] == b']' {
        event = classify_osc(frame);
    }

    if event.is_none() && len > 5 && frame[0] == 0x1b && frame[1] == b'P' {
        if frame[len - 1] == b'\\' && frame[len - 2] == 0x1b {
            if frame[2] == b'!' && frame[3] == b'|' {
                event = Some(Event::RawTertiaryDeviceAttributes(
                    frame[4..len - 2].to_vec(),
                ));
            }
            if frame[2] == b'>' && frame[3] == b'|' {
                event = Some(Event::RawTermName(frame[4..len - 2].to_vec()));
            }
            if (frame[2] == b'0' || frame[2] == b'1') && frame[3] == b'+' && frame[4] == b'r' {
                event = Some(Event::RawTerminfoQueryReply(frame[2..len - 2].to_vec()));
            }
        }
    }
    if event.is_none() && len > 3 && frame[0] == 0x90 && frame[len - 1] == 0x9c {
        if frame[1] == b'!' && frame[2] == b'|' {
            event = Some(Event::RawTertiaryDeviceAttributes(
                frame[3..len - 1].to_vec(),
            ));
        }
    }

    match event {
        Some(event) => Classified::Event(event),
        None => Classified::None,
    }
}

fn classify_osc(frame: &[u8]) -> Option<Event> {
    let len = frame.len();
    let st_offset = if frame[len - 1] == b'\\' && frame[len - 2] == 0x1b {
        len - 2
    } else if frame[len - 1] == 0x07 || frame[len - 1] == 0x9c {
        len - 1
    } else {
        return None;
    };

    // numeric OSC selector
    let num_end = 2 + frame[2..st_offset].iter().position(|&b| b == b';')?;
    let num: u32 = atoi_simd::parse(&frame[2..num_end]).ok()?;

    if num == 4 {
        // normal form: OSC 4 ; index ; color ST
        // urxvt also emits an index-less OSC 4 ; color ST
        let mut end_idx1 = num_end + 1;
        while end_idx1 < st_offset && frame[end_idx1] != b';' {
            end_idx1 += 1;
        }
        if end_idx1 + 1 < st_offset {
            let mut end_idx2 = end_idx1 + 1;
            while end_idx2 < st_offset && frame[end_idx2] != b';' {
                end_idx2 += 1;
            }
            if let Ok(index) = atoi_simd::parse::<u16>(&frame[num_end + 1..end_idx1]) {
                return Some(Event::PaletteColorReport {
                    index: Some(index),
                    color: frame[end_idx1 + 1..end_idx2].to_vec(),
                });
            }
            return None;
        }
        return Some(Event::PaletteColorReport {
            index: None,
            color: frame[num_end + 1..end_idx1].to_vec(),
        });
    }

    if (10..=14).contains(&num) || num == 17 || num == 19 || (705..=708).contains(&num) {
        let mut end_idx = num_end + 1;
        while end_idx < st_offset && frame[end_idx] != b';' {
            end_idx += 1;
        }
        return Some(Event::ColorSlotReport {
            slot: num,
            color: frame[num_end + 1..end_idx].to_vec(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classify_plain(frame: &[u8]) -> Classified {
        let mut expect = 0;
        let mut ctx = ClassifyCtx {
            quirks: &[],
            expect_cursor_position_report: &mut expect,
        };
        classify(frame, &mut ctx)
    }

    #[test]
    fn test_arrow_with_modifier() {
        assert_eq!(
            classify_plain(b"\x1b[1;2A"),
            Classified::Event(Event::key(KeyAtom::ArrowUp, Modifiers::SHIFT))
        );
    }

    #[test]
    fn test_resync_sentinel() {
        assert_eq!(
            classify_plain(b"\x1b[0n"),
            Classified::Event(Event::Misc(MiscAtom::Resync))
        );
    }

    #[test]
    fn test_plain_and_alt_chars() {
        assert_eq!(
            classify_plain(b"x"),
            Classified::Event(Event::ch('x', Modifiers::NONE))
        );
        assert_eq!(
            classify_plain(b"\x1bx"),
            Classified::Event(Event::ch('x', Modifiers::ALT))
        );
        assert_eq!(
            classify_plain("ä".as_bytes()),
            Classified::Event(Event::ch('ä', Modifiers::NONE))
        );
        assert_eq!(
            classify_plain("\x1bä".as_bytes()),
            Classified::Event(Event::ch('ä', Modifiers::ALT))
        );
    }

    #[test]
    fn test_invalid_utf8_reported() {
        assert_eq!(classify_plain(b"\xc3\x28"), Classified::Event(Event::InvalidUtf8));
    }

    #[test]
    fn test_ctrl_letter_is_char_event() {
        assert_eq!(
            classify_plain(b"\x03"),
            Classified::Event(Event::ch('c', Modifiers::CTRL))
        );
    }

    #[test]
    fn test_nul_is_ctrl_space() {
        assert_eq!(
            classify_plain(b"\x00"),
            Classified::Event(Event::key(KeyAtom::Space, Modifiers::CTRL))
        );
    }

    #[test]
    fn test_sgr_mouse() {
        let Classified::Event(Event::Mouse {
            x,
            y,
            action,
            button,
            ..
        }) = classify_plain(b"\x1b[<35;73;5M")
        else {
            panic!("expected mouse event");
        };
        assert_eq!((x, y), (72, 4));
        assert_eq!(action, MouseAction::Move);
        assert_eq!(button, 3);
    }

    #[test]
    fn test_sgr_mouse_press_release() {
        let Classified::Event(Event::Mouse { action, button, .. }) =
            classify_plain(b"\x1b[<0;10;5M")
        else {
            panic!("expected mouse event");
        };
        assert_eq!(action, MouseAction::Press);
        assert_eq!(button, 0);

        let Classified::Event(Event::Mouse { action, .. }) = classify_plain(b"\x1b[<0;10;5m")
        else {
            panic!("expected mouse event");
        };
        assert_eq!(action, MouseAction::Release);
    }

    #[test]
    fn test_urxvt_mouse() {
        let Classified::Event(Event::Mouse { x, y, action, .. }) =
            classify_plain(b"\x1b[32;11;6M")
        else {
            panic!("expected mouse event");
        };
        assert_eq!((x, y), (10, 5));
        assert_eq!(action, MouseAction::Press);
    }

    #[test]
    fn test_legacy_mouse_single_byte() {
        // btn=0 press at (1, 2): 32+0, 33+1, 33+2
        let frame = [0x1b, b'[', b'M', 32, 34, 35];
        let Classified::Event(Event::Mouse { x, y, action, .. }) = classify_plain(&frame) else {
            panic!("expected mouse event");
        };
        assert_eq!((x, y), (1, 2));
        assert_eq!(action, MouseAction::Press);
    }

    #[test]
    fn test_legacy_mouse_overflowed_coordinate_ignored() {
        let frame = [0x1b, b'[', b'M', 32, 32, 35];
        assert_eq!(classify_plain(&frame), Classified::None);
    }

    #[test]
    fn test_modify_other_keys() {
        assert_eq!(
            classify_plain(b"\x1b[27;5;65~"),
            Classified::Event(Event::ch('A', Modifiers::CTRL))
        );
        assert_eq!(
            classify_plain(b"\x1b[97;3u"),
            Classified::Event(Event::ch('a', Modifiers::ALT))
        );
    }

    #[test]
    fn test_cursor_position_report() {
        assert_eq!(
            classify_plain(b"\x1b[3;10R"),
            Classified::Event(Event::CursorPosition {
                x: 9,
                y: 2,
                safe: false
            })
        );
        assert_eq!(
            classify_plain(b"\x1b[?3;10R"),
            Classified::Event(Event::CursorPosition {
                x: 9,
                y: 2,
                safe: true
            })
        );
    }

    #[test]
    fn test_ambiguous_cursor_report_needs_expectation() {
        // CSI 1;2R is Shift-F3 unless a report is expected
        assert_eq!(
            classify_plain(b"\x1b[1;2R"),
            Classified::Event(Event::key(KeyAtom::F3, Modifiers::SHIFT))
        );

        let mut expect = 1;
        let mut ctx = ClassifyCtx {
            quirks: &[],
            expect_cursor_position_report: &mut expect,
        };
        assert_eq!(
            classify(b"\x1b[1;2R", &mut ctx),
            Classified::Event(Event::CursorPosition {
                x: 1,
                y: 0,
                safe: false
            })
        );
        assert_eq!(expect, 0);
    }

    #[test]
    fn test_focus_events() {
        assert_eq!(
            classify_plain(b"\x1b[I"),
            Classified::Event(Event::Misc(MiscAtom::FocusIn))
        );
        assert_eq!(
            classify_plain(b"\x1b[O"),
            Classified::Event(Event::Misc(MiscAtom::FocusOut))
        );
    }

    #[test]
    fn test_paste_markers() {
        assert_eq!(classify_plain(b"\x1b[200~"), Classified::PasteBegin);
        assert_eq!(classify_plain(b"\x1b[201~"), Classified::PasteEnd);
    }

    #[test]
    fn test_mode_report() {
        assert_eq!(
            classify_plain(b"\x1b[?1049;1$y"),
            Classified::Event(Event::ModeReport {
                kind: ModeReportKind::Dec,
                number: 1049,
                status: 1
            })
        );
        assert_eq!(
            classify_plain(b"\x1b[4;2$y"),
            Classified::Event(Event::ModeReport {
                kind: ModeReportKind::Ansi,
                number: 4,
                status: 2
            })
        );
    }

    #[test]
    fn test_device_attribute_replies() {
        assert_eq!(
            classify_plain(b"\x1b[>1;4000;13c"),
            Classified::Event(Event::RawSecondaryDeviceAttributes(
                b"\x1b[>1;4000;13c".to_vec()
            ))
        );
        assert_eq!(
            classify_plain(b"\x1b[?64;4c"),
            Classified::Event(Event::RawPrimaryDeviceAttributes(b"\x1b[?64;4c".to_vec()))
        );
        assert_eq!(
            classify_plain(b"\x1b[2;1;1;112;112;1;0x"),
            Classified::Event(Event::RawDecRequestTermParam(
                b"\x1b[2;1;1;112;112;1;0x".to_vec()
            ))
        );
    }

    #[test]
    fn test_dcs_replies() {
        assert_eq!(
            classify_plain(b"\x1bP!|7E565445\x1b\\"),
            Classified::Event(Event::RawTertiaryDeviceAttributes(b"7E565445".to_vec()))
        );
        assert_eq!(
            classify_plain(b"\x1bP>|kitty 0.21\x1b\\"),
            Classified::Event(Event::RawTermName(b"kitty 0.21".to_vec()))
        );
        assert_eq!(
            classify_plain(b"\x1bP1+r544e=787465726d\x1b\\"),
            Classified::Event(Event::RawTerminfoQueryReply(
                b"1+r544e=787465726d".to_vec()
            ))
        );
    }

    #[test]
    fn test_osc_color_slot_report() {
        assert_eq!(
            classify_plain(b"\x1b]11;rgb:2828/2c2c/3434\x07"),
            Classified::Event(Event::ColorSlotReport {
                slot: 11,
                color: b"rgb:2828/2c2c/3434".to_vec()
            })
        );
        assert_eq!(
            classify_plain(b"\x1b]712;rgb:0/0/0\x1b\\"),
            Classified::None
        );
        assert_eq!(
            classify_plain(b"\x1b]705;rgb:0/0/0\x1b\\"),
            Classified::Event(Event::ColorSlotReport {
                slot: 705,
                color: b"rgb:0/0/0".to_vec()
            })
        );
    }

    #[test]
    fn test_osc_palette_report() {
        assert_eq!(
            classify_plain(b"\x1b]4;255;rgb:ffff/ffff/ffff\x1b\\"),
            Classified::Event(Event::PaletteColorReport {
                index: Some(255),
                color: b"rgb:ffff/ffff/ffff".to_vec()
            })
        );
        // urxvt's index-less form
        assert_eq!(
            classify_plain(b"\x1b]4;rgb:ffff/0/0\x07"),
            Classified::Event(Event::PaletteColorReport {
                index: None,
                color: b"rgb:ffff/0/0".to_vec()
            })
        );
    }

    #[test]
    fn test_unknown_frame_is_none() {
        assert_eq!(classify_plain(b"\x1b[12p"), Classified::None);
    }
}
