//! Metrics module for ride statistics.

pub mod calculator;

pub use calculator::{format_elapsed, SampleSeries};
