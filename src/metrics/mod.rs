//! Metrics for the id service.
//!
//! Counters and histograms are plain atomics, so recording from the request
//! path never blocks.

pub mod histogram;

pub use histogram::{Histogram, HistogramSnapshot};
