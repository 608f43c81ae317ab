// src/trading/mod.rs
// Signal decision engine: scoring, risk placement, crossover evaluation

pub mod risk;
pub mod scoring;
pub mod signals;

pub use signals::{SignalEngine, SignalInput, SignalPipeline};
