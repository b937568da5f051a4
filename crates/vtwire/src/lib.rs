//! Wire-format primitives shared by the painting and decoding crates.
//!
//! This crate frames ECMA-48 / xterm control sequences and carries the
//! tagged color value used throughout the library. Nothing here performs
//! I/O; everything writes into a caller-supplied sink.

#![warn(clippy::pedantic)]

pub mod color;
pub mod encode;
pub mod xcolor;

pub use color::Color;
pub use encode::{EncodeError, write_bytes_into, write_int, write_str_into};
pub use xcolor::ColorSpec;

/// Concatenate string literals while prepending a control sequence
/// introducer (`"\x1b["`).
///
/// All arguments must be string literals that can be concatenated at
/// compile-time using `concat!`.
#[macro_export]
macro_rules! csi {
    () => {
        "\x1B["
    };
    ($($arg:expr),+ $(,)?) => {
        concat!("\x1B[", $($arg),+)
    };
}

/// Concatenate string literals while prepending an Operating System Command
/// introducer (`"\x1b]"`) and appending the 7-bit string terminator
/// (`"\x1b\\"`).
#[macro_export]
macro_rules! osc {
    ($($arg:expr),+ $(,)?) => {
        concat!("\x1B]", $($arg),+, "\x1B\\")
    };
}

/// Concatenate string literals while prepending a Device Control String
/// introducer (`"\x1bP"`) and appending the 7-bit string terminator.
#[macro_export]
macro_rules! dcs {
    ($($arg:expr),+ $(,)?) => {
        concat!("\x1BP", $($arg),+, "\x1B\\")
    };
}
