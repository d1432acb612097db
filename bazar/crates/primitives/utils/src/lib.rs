//! Helpers shared by the bazar command line and configuration layers.

pub mod parsers;
pub mod serde;
