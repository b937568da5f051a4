//! CSI frame decomposition.
//!
//! A CSI frame is split into `{prefix?, args[], postfix?, final}` where
//! args are decimal integers separated by `;`, with `:` starting ignored
//! sub-arguments. Absent arguments are recorded as the default sentinel.

use smallvec::SmallVec;

/// Value recorded for an argument position that was left empty.
pub(crate) const DEFAULT_ARG: i32 = -1;

const MAX_ARGS: usize = 10;

/// Decomposed shape of a CSI frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CsiShape {
    pub prefix: u8,
    pub postfix: u8,
    pub final_byte: u8,
    pub args: SmallVec<[i32; MAX_ARGS]>,
    pub has_sub_args: bool,
}

impl CsiShape {
    pub fn arg(&self, i: usize) -> Option<i32> {
        self.args.get(i).copied().filter(|&v| v != DEFAULT_ARG)
    }

    pub fn arg_or(&self, i: usize, default: i32) -> i32 {
        self.arg(i).unwrap_or(default)
    }

    pub fn is(&self, final_byte: u8, prefix: u8, postfix: u8) -> bool {
        self.final_byte == final_byte && self.prefix == prefix && self.postfix == postfix
    }
}

/// Parse the body of `frame` (which starts with `ESC [`). Returns `None`
/// for frames that do not follow the CSI grammar.
pub(crate) fn parse_csi_shape(frame: &[u8]) -> Option<CsiShape> {
    debug_assert!(frame.len() > 2 && frame[0] == 0x1b && frame[1] == b'[');

    let mut shape = CsiShape {
        prefix: 0,
        postfix: 0,
        final_byte: 0,
        args: SmallVec::new(),
        has_sub_args: false,
    };

    enum State {
        Initial,
        MainParam,
        SubParam,
        Ignore,
    }
    let mut state = State::Initial;

    for (j, &byte) in frame.iter().enumerate().skip(2) {
        match byte {
            b'0'..=b'9' => {
                if matches!(state, State::Initial) {
                    if shape.args.len() >= MAX_ARGS {
                        state = State::Ignore;
                    } else {
                        state = State::MainParam;
                        shape.args.push(0);
                    }
                }
                if matches!(state, State::MainParam) {
                    let last = shape.args.last_mut().expect("argument was pushed");
                    match last
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(i32::from(byte - b'0')))
                    {
                        Some(v) => *last = v,
                        // parameter out of range
                        None => return None,
                    }
                }
            }
            b':' => {
                shape.has_sub_args = true;
                match state {
                    State::Initial => {
                        if shape.args.len() >= MAX_ARGS {
                            state = State::Ignore;
                        } else {
                            shape.args.push(DEFAULT_ARG);
                            state = State::SubParam;
                        }
                    }
                    State::MainParam => state = State::SubParam,
                    State::SubParam | State::Ignore => {}
                }
            }
            b';' => match state {
                State::Initial => {
                    if shape.args.len() >= MAX_ARGS {
                        state = State::Ignore;
                    } else {
                        shape.args.push(DEFAULT_ARG);
                    }
                }
                State::MainParam | State::SubParam => state = State::Initial,
                State::Ignore => {}
            },
            b'<'..=b'?' => {
                if j == 2 {
                    shape.prefix = byte;
                } else {
                    // prefix modifier in an unexpected place
                    return None;
                }
            }
            b' '..=b'/' => {
                if j == frame.len() - 2 {
                    shape.postfix = byte;
                } else {
                    return None;
                }
            }
            b'@'..=0x7f => {
                if j == frame.len() - 1 {
                    shape.final_byte = byte;
                } else {
                    return None;
                }
            }
            _ => return None,
        }
    }

    if matches!(state, State::Initial) && !shape.args.is_empty() && shape.args.len() < MAX_ARGS {
        shape.args.push(DEFAULT_ARG);
    }

    if shape.final_byte == 0 {
        return None;
    }
    Some(shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_args() {
        let shape = parse_csi_shape(b"\x1b[1;2A").unwrap();
        assert!(shape.is(b'A', 0, 0));
        assert_eq!(shape.arg(0), Some(1));
        assert_eq!(shape.arg(1), Some(2));
        assert!(!shape.has_sub_args);
    }

    #[test]
    fn test_prefix_and_postfix() {
        let shape = parse_csi_shape(b"\x1b[?1;2$y").unwrap();
        assert!(shape.is(b'y', b'?', b'$'));
        assert_eq!(shape.arg(0), Some(1));

        let shape = parse_csi_shape(b"\x1b[<35;73;5M").unwrap();
        assert!(shape.is(b'M', b'<', 0));
        assert_eq!(shape.args.len(), 3);
    }

    #[test]
    fn test_empty_args_are_defaults() {
        let shape = parse_csi_shape(b"\x1b[;5H").unwrap();
        assert_eq!(shape.arg(0), None);
        assert_eq!(shape.arg(1), Some(5));
        assert_eq!(shape.arg_or(0, 1), 1);
    }

    #[test]
    fn test_trailing_separator_appends_default() {
        let shape = parse_csi_shape(b"\x1b[5;m").unwrap();
        assert_eq!(shape.args.len(), 2);
        assert_eq!(shape.arg(1), None);
    }

    #[test]
    fn test_sub_args_flagged() {
        let shape = parse_csi_shape(b"\x1b[1:2;3m").unwrap();
        assert!(shape.has_sub_args);
        assert_eq!(shape.arg(0), Some(1));
        assert_eq!(shape.arg(1), Some(3));
    }

    #[test]
    fn test_misplaced_modifier_rejected() {
        assert_eq!(parse_csi_shape(b"\x1b[1?2c"), None);
        assert_eq!(parse_csi_shape(b"\x1b[1 2m"), None);
    }

    #[test]
    fn test_overlong_parameter_rejected() {
        assert_eq!(parse_csi_shape(b"\x1b[99999999999999999999m"), None);
    }
}
