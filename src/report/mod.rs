//! Report rendering: Markdown, JSON and CSV.

mod generator;

pub use generator::*;
