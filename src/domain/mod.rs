// src/domain/mod.rs
pub mod errors;
pub mod models;
pub mod repository;
pub mod service;

// Re-export common types for convenience
pub use errors::{
    AppError, AppResult, EngineError, EngineResult, ExchangeError, ExchangeResult, HttpError,
    NarrativeError, NarrativeResult, NotificationError, NotificationResult,
};
pub use models::{
    AnalysisReport, Candle, CandleSeries, IndicatorSnapshot, OrderBlock, OrderBlockKind,
    PriceZone, RiskLevels, Signal, SignalDirection, Timeframe, TrendDirection, TrendState,
    ZoneContext,
};
