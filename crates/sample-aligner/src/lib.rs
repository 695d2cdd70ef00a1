//! Sample Alignment
//!
//! Attaches the sparse positional stream of a device to its BMS samples and
//! fills the altitude column so downstream stages see a gap-free signal.

mod aligner;
mod interpolation;

pub use aligner::{align, AlignConfig, SampleAligner};
pub use interpolation::fill_linear;
