// src/domain/repository/mod.rs
// Repository interfaces for domain entities

use async_trait::async_trait;

use crate::domain::errors::ExchangeResult;
use crate::domain::models::{CandleSeries, Timeframe};

/// Source of candle history for one trading venue
#[async_trait]
pub trait MarketDataRepository {
    /// Fetch up to `limit` of the most recent candles.
    ///
    /// May return fewer candles than requested; callers treat a short series
    /// as insufficient data instead of trimming their lookbacks.
    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> ExchangeResult<CandleSeries>;

    /// Reachability check run before each analysis pass
    async fn test_connection(&self) -> bool;
}
