//! Cursor shapes.

use num_enum::TryFromPrimitive;

/// Logical cursor shape. The integer values are stable and exposed to
/// hosts; they double as the base of the `CSI n SP q` parameter, where
/// `n + 1` selects the steady variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, Default)]
#[repr(i32)]
pub enum CursorStyle {
    #[default]
    TermDefault = 0,
    Block = 1,
    Underline = 3,
    Bar = 5,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_integer_constants() {
        assert_eq!(CursorStyle::try_from(0).unwrap(), CursorStyle::TermDefault);
        assert_eq!(CursorStyle::try_from(1).unwrap(), CursorStyle::Block);
        assert_eq!(CursorStyle::try_from(3).unwrap(), CursorStyle::Underline);
        assert_eq!(CursorStyle::try_from(5).unwrap(), CursorStyle::Bar);
        assert!(CursorStyle::try_from(2).is_err());
    }
}
