//! Trip Segmentation
//!
//! Cuts the time-ordered samples of one device into candidate trips at
//! reporting gaps and charging-cable transitions.

mod segmenter;

pub use segmenter::{cut_points, SegmenterConfig, TripCandidate, TripSegmenter};
