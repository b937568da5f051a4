//! The double-buffered cell grid.
//!
//! A [`Surface`] is a width × height array of cells carrying colors, a
//! style bitfield, a patch slot and a grapheme cluster. The primary surface
//! attached to a terminal additionally holds a shadow copy of the last
//! transmitted state, which the renderer diffs against.
//!
//! Cluster invariants maintained by every mutation:
//!
//! * all cells of a multi-cell cluster share colors, style and patch;
//! * only the head cell carries text and a non-zero expansion;
//! * each trailing cell carries the wide-right-padding marker;
//! * overwriting part of a cluster vanishes the whole cluster first.

#![warn(clippy::pedantic)]

pub mod attr;
pub mod cell;
pub mod overflow;
pub mod patch;
pub mod surface;

pub use attr::Attributes;
pub use cell::{Cell, CellText, Style, Underline};
pub use overflow::{OverflowId, OverflowTable};
pub use patch::{Patch, PatchTable};
pub use surface::{CopyTile, Surface};

pub use vtwire::Color;

/// Text returned by peeks for cells that have been erased (cleared but
/// never written).
pub const ERASED: &str = "\u{7f}";
