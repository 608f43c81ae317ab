// src/analysis/mod.rs
// Indicator engine and structure/zone analyzer

pub mod indicators;
pub mod structure;
pub mod zones;

pub use indicators::{compute, required_length};
pub use zones::analyze;
