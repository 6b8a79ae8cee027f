//! Survey analysis: frequency distributions, key findings and dashboard panels.

pub mod aggregator;

pub use aggregator::*;
