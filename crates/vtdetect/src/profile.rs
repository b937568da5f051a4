//! Family → capability profiles.
//!
//! After identification, known quirks of each family are applied to the
//! capability set and a version is extracted from the secondary device
//! attributes reply or the self-reported name string.

use crate::caps::{Capability, CapabilitySet};
use crate::detector::{Detector, parse_second_parameter};
use crate::family::{Family, parse_dotted_version};

fn leading_number(data: &[u8]) -> (i32, &[u8]) {
    let mut value: i32 = 0;
    let mut idx = 0;
    while idx < data.len() && data[idx].is_ascii_digit() {
        value = value.saturating_mul(10).saturating_add(i32::from(data[idx] - b'0'));
        idx += 1;
    }
    (value, &data[idx..])
}

#[allow(clippy::too_many_lines)]
pub(crate) fn apply_family_profile(detector: &mut Detector, caps: &mut CapabilitySet) {
    if caps.has(Capability::CsiGreater) {
        // no dedicated probes exist for these; a terminal that parses
        // CSI > correctly is taken as evidence of solid parsing overall
        caps.promise(Capability::CsiPostfixMod);
        caps.promise(Capability::MayTryCursorShape);
    }

    let attrs = detector.sec_dev_attributes().to_vec();

    match detector.family() {
        Family::Misparsing | Family::TooDumb => {
            caps.disable(Capability::ExtendedCharset);
        }
        Family::Base => {
            if attrs.is_empty() {
                // without CSI > c or CSI = c support this may well be the
                // linux console with its tiny glyph repertoire
                caps.disable(Capability::ExtendedCharset);
            }
        }
        Family::Vte => {
            caps.promise(Capability::MayTryTaggedPaste);
            if attrs.len() > 11 {
                let vte_new = attrs.strip_prefix(b"\x1b[>65;");
                let vte_old = attrs.strip_prefix(b"\x1b[>1;");
                if let Some(rest) = vte_new.or(vte_old) {
                    let (version, tail) = leading_number(rest);
                    if tail.first() == Some(&b';') && (version < 5400) == vte_old.is_some() {
                        detector.set_version(version);

                        if version < 4000 {
                            caps.disable(Capability::MayTryCursorShape);
                        } else {
                            caps.promise(Capability::MayTryCursorShape);
                        }
                        if version >= 5400 {
                            caps.promise(Capability::TitleRestore);
                        } else {
                            // fragile dictionary based parsing
                            caps.disable(Capability::CsiGreater);
                            caps.disable(Capability::CsiEquals);
                            caps.disable(Capability::CsiPostfixMod);
                        }
                    }
                }
            }
            if detector.version() < 3600 {
                caps.disable(Capability::TruecolorMaybeSupported);
            } else {
                caps.promise(Capability::TruecolorSupported);
            }
        }
        Family::Xterm => {
            if let Some(version) = parse_second_parameter(&attrs) {
                detector.set_version(version);
                if version < 282 {
                    // xterm < 282 ignores the bar style; remap it
                    caps.disable(Capability::MayTryCursorShapeBar);
                }
            }
            caps.promise(Capability::TitleRestore);
            if detector.version() < 282 {
                caps.disable(Capability::TruecolorMaybeSupported);
            } else {
                caps.promise(Capability::TruecolorSupported);
            }
            caps.promise(Capability::MayTryTaggedPaste);
        }
        Family::Screen => {
            if let Some(rest) = attrs.strip_prefix(b"\x1b[>83;") {
                let (version, tail) = leading_number(rest);
                if tail.first() == Some(&b';') {
                    detector.set_version(version);
                }
            }
            caps.disable(Capability::TruecolorMaybeSupported);
            caps.disable(Capability::ClearedColoring);
        }
        Family::Tmux => {
            caps.promise(Capability::TruecolorSupported);
        }
        Family::Konsole => {
            caps.promise(Capability::MayTryTaggedPaste);
            // konsole >= 18.07.70 understands CSI SP q too, but the DA2
            // reply does not carry the konsole version
            caps.promise(Capability::CursorShapeOsc50);
            // 7-bit ST works from 19.08.2 on; same problem
            caps.disable(Capability::SevenBitSt);
            caps.promise(Capability::TruecolorSupported);
        }
        Family::Urxvt => {
            caps.disable(Capability::TruecolorMaybeSupported);
            // urxvt 9.19 crashes on bracketed paste, and up to 9.22 the
            // reply terminator for ESC \ requests is a bare ESC
            caps.disable(Capability::SevenBitSt);
        }
        Family::LinuxVc => {
            // everything has to fit an 8 or 9 bit font: what exists
            // depends on the font, so assume very little
            caps.disable(Capability::ExtendedCharset);
        }
        Family::MacOs => {
            caps.disable(Capability::TruecolorMaybeSupported);
            // does background color erase but only one color for cleared
            // cells
            caps.disable(Capability::ClearedColoring);
        }
        Family::Terminology => {
            caps.promise(Capability::MayTryTaggedPaste);
            // reaching this point needs DA3 support, so at least 1.4
            if let Some(name) = detector.self_reported_name() {
                if let Some((_, version_part)) = name.split_once(' ') {
                    detector.set_version(parse_dotted_version(version_part.as_bytes()));
                }
            }
            // terminology approximates to a 256 color palette internally
            // (since 1.2.0), which is close enough
            caps.promise(Capability::TruecolorSupported);
            if detector.version() >= 1_007_000 {
                caps.promise(Capability::TitleRestore);
            }
            // all shapes exist since 1.2
            caps.promise(Capability::MayTryCursorShapeBar);
        }
        Family::Mintty => {
            caps.promise(Capability::MayTryTaggedPaste);
            if let Some(rest) = attrs.strip_prefix(b"\x1b[>77;") {
                let (version, tail) = leading_number(rest);
                if tail.first() == Some(&b';') {
                    detector.set_version(version);
                }
            }
            caps.promise(Capability::TruecolorSupported);
            caps.promise(Capability::SafePositionReport);
            caps.promise(Capability::TitleRestore);
        }
        Family::Kitty => {
            if let Some(rest) = attrs.strip_prefix(b"\x1b[>1;") {
                let (val, tail) = leading_number(rest);
                if tail.first() == Some(&b';') && val >= 4000 {
                    let mut version = (val - 4000) * 1000;
                    let (minor, tail) = leading_number(&tail[1..]);
                    if matches!(tail.first(), Some(&b';') | Some(&b'c')) {
                        version += minor.min(999);
                        detector.set_version(version);
                    }
                }
            }
            caps.promise(Capability::TruecolorSupported);
            caps.promise(Capability::MayTryTaggedPaste);
            caps.promise(Capability::TitleRestore);
        }
        Family::Iterm2 => {
            caps.promise(Capability::TruecolorSupported);
            caps.promise(Capability::MayTryTaggedPaste);
        }
        Family::Mlterm => {
            caps.promise(Capability::MayTryTaggedPaste);
            caps.promise(Capability::TruecolorSupported);
        }
        Family::MsTerminal => {
            caps.promise(Capability::TruecolorSupported);
        }
        Family::Full => {
            // claims support for everything; safe-position-report and the
            // CSI prefix capabilities were measured directly, 88 color and
            // OSC 50 cursor shapes are family specific and stay off
            caps.promise(Capability::MayTryTaggedPaste);
            caps.promise(Capability::TitleRestore);
            caps.promise(Capability::TruecolorSupported);
        }
        Family::Incompatible | Family::Unknown => {}
    }
}
