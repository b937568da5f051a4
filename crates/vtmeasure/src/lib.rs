//! Text measurement and cluster segmentation.
//!
//! Cluster segmentation here matches the surface write path exactly, so
//! that a measured width always equals the number of columns a subsequent
//! write will occupy. Callers wrap text against a width by feeding code
//! units with a width limit and reading back the committed counts.

#![warn(clippy::pedantic)]

pub mod chars;
pub mod measurement;

pub use chars::{char_width, replace_unusable, sanitize_codepoint};
pub use measurement::{FeedOutcome, TextMeasurement};
