//! Terminal identification.
//!
//! A wave-based query protocol probes the attached terminal and records
//! its family, version and capability set. Each wave sends a bundle of
//! queries terminated by a `CSI 5 n` status query whose `CSI 0 n` reply
//! acts as a barrier: when it arrives, every reply the terminal was going
//! to give for the wave has arrived.
//!
//! The state machine consumes decoded input events and returns actions
//! (bytes to send, reports to expect) for the caller to execute; it does
//! no I/O of its own.

#![warn(clippy::pedantic)]

pub mod caps;
pub mod detector;
pub mod family;
mod profile;

pub use caps::{Capability, CapabilitySet};
pub use detector::{DetectAction, DetectionState, Detector};
pub use family::{Family, parse_dotted_version};
