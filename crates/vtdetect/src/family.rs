//! Terminal families and version handling.

use strum::{Display, EnumString};

/// Identified terminal family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Default)]
#[strum(serialize_all = "kebab-case")]
pub enum Family {
    /// Does not answer `CSI 5 n` (or answers it mangled); input handling
    /// cannot work.
    Incompatible,
    /// Answers basic queries but runs off the detection chart.
    TooDumb,
    /// Valid sequences leave visual traces.
    Misparsing,
    #[default]
    Unknown,
    /// Baseline feature set; nothing more specific was identified.
    Base,
    Xterm,
    Urxvt,
    Mlterm,
    Konsole,
    Vte,
    Screen,
    Tmux,
    LinuxVc,
    MacOs,
    Iterm2,
    Terminology,
    Kitty,
    Mintty,
    MsTerminal,
    /// Unknown but self-identifying as fully featured.
    Full,
}

impl Family {
    /// Whether painting output has a chance of working at all.
    #[must_use]
    pub fn might_be_supported(self) -> bool {
        self != Family::Incompatible
    }
}

/// Parse a dotted version string into `major * 1_000_000 +
/// minor * 1_000 + patch`. Parsing stops at the first byte that fits
/// neither a number nor a separating dot.
#[must_use]
pub fn parse_dotted_version(s: &[u8]) -> i32 {
    let mut res = 0;
    let mut place = 0;
    let mut tmp: i32 = 0;
    for &byte in s {
        if byte.is_ascii_digit() {
            tmp = tmp.saturating_mul(10).saturating_add(i32::from(byte - b'0'));
        } else if byte == b'.' {
            match place {
                0 => res += tmp * 1_000_000,
                1 => res += tmp * 1_000,
                _ => return res + tmp,
            }
            tmp = 0;
            place += 1;
        } else {
            break;
        }
    }
    match place {
        0 => res + tmp * 1_000_000,
        1 => res + tmp * 1_000,
        _ => res + tmp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_version_parsing() {
        assert_eq!(parse_dotted_version(b"0.5.0"), 5000);
        assert_eq!(parse_dotted_version(b"0.5.1"), 5001);
        assert_eq!(parse_dotted_version(b"1"), 1_000_000);
        assert_eq!(parse_dotted_version(b"1.0"), 1_000_000);
        assert_eq!(parse_dotted_version(b"1.0.0"), 1_000_000);
        assert_eq!(parse_dotted_version(b"1.7"), 1_007_000);
        assert_eq!(parse_dotted_version(b"1.7.0"), 1_007_000);
        assert_eq!(parse_dotted_version(b"1.7.0a"), 1_007_000);
        assert_eq!(parse_dotted_version(b"1.7a.0"), 1_007_000);
        assert_eq!(parse_dotted_version(b"1.7.0.1"), 1_007_000);
        assert_eq!(parse_dotted_version(b"1.7.1"), 1_007_001);
        assert_eq!(parse_dotted_version(b"1.7.1a"), 1_007_001);
        assert_eq!(parse_dotted_version(b"1.7a.1"), 1_007_000);
    }

    #[test]
    fn test_family_display() {
        assert_eq!(Family::Xterm.to_string(), "xterm");
        assert_eq!(Family::LinuxVc.to_string(), "linux-vc");
        assert_eq!(Family::TooDumb.to_string(), "too-dumb");
        assert_eq!(Family::MsTerminal.to_string(), "ms-terminal");
    }
}
