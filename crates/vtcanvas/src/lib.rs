//! Cell-grid painting for terminals.
//!
//! The application mutates a [`Surface`]; [`Terminal::flush`] diffs it
//! against the last transmitted state and writes the minimal escape
//! sequence stream through an [`Integration`]. Bytes the terminal sends
//! back are pushed into [`Terminal::add_input_data`], which decodes them
//! into [`Event`]s — consumed internally while auto-detection runs and
//! handed to the application's event callback afterwards.
//!
//! ```no_run
//! use vtcanvas::{Color, Integration, Terminal};
//!
//! struct Stdout;
//! impl Integration for Stdout {
//!     fn write(&mut self, data: &[u8]) {
//!         use std::io::Write;
//!         std::io::stdout().write_all(data).ok();
//!     }
//!     fn flush(&mut self) {
//!         use std::io::Write;
//!         std::io::stdout().flush().ok();
//!     }
//! }
//!
//! let mut terminal = Terminal::new(Stdout, 80, 24);
//! terminal.surface_mut().clear(Color::DEFAULT, Color::DEFAULT);
//! terminal.surface_mut().write(10, 3, "Sample", Color::DEFAULT, Color::DEFAULT);
//! terminal.flush(false);
//! ```

#![warn(clippy::pedantic)]

pub mod colors;
pub mod cursor;
pub mod integration;
mod render;
mod restore;
pub mod terminal;

pub use colors::ColorSlot;
pub use cursor::CursorStyle;
pub use integration::Integration;
pub use terminal::{MouseMode, Terminal, TitleMode};

pub use vtdecode::{
    Event, InputDecoder, KeyAtom, LegacyMouseMode, MiscAtom, Modifiers, MouseAction, Quirk,
};
pub use vtdetect::{Capability, CapabilitySet, DetectionState, Family};
pub use vtmeasure::{TextMeasurement, char_width};
pub use vtsurface::{Attributes, CopyTile, ERASED, Style, Surface, Underline};
pub use vtwire::{Color, ColorSpec};
