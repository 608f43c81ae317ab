// src/application/usecase/analysis_usecase.rs
// Market analysis use cases

use std::sync::Arc;
use async_trait::async_trait;

use crate::domain::errors::AppError;
use crate::domain::models::{AnalysisReport, Timeframe};
use crate::domain::repository::MarketDataRepository;
use crate::trading::SignalPipeline;

/// Market analysis use case
#[async_trait]
pub trait MarketAnalysisUseCase {
    async fn analyze_symbol(&self, symbol: &str) -> Result<AnalysisReport, AppError>;
}

pub struct MarketAnalysisProcessor {
    market_data: Arc<dyn MarketDataRepository + Send + Sync>,
    pipeline: Arc<SignalPipeline>,
    primary_timeframe: Timeframe,
    higher_timeframe: Option<Timeframe>,
    candle_limit: usize,
}

impl MarketAnalysisProcessor {
    pub fn new(
        market_data: Arc<dyn MarketDataRepository + Send + Sync>,
        pipeline: Arc<SignalPipeline>,
        primary_timeframe: Timeframe,
        higher_timeframe: Option<Timeframe>,
        candle_limit: usize,
    ) -> Self {
        Self {
            market_data,
            pipeline,
            primary_timeframe,
            higher_timeframe,
            candle_limit,
        }
    }
}

#[async_trait]
impl MarketAnalysisUseCase for MarketAnalysisProcessor {
    async fn analyze_symbol(&self, symbol: &str) -> Result<AnalysisReport, AppError> {
        let primary_fetch = self
            .market_data
            .fetch(symbol, self.primary_timeframe, self.candle_limit);
        let higher_fetch = async {
            match self.higher_timeframe {
                Some(timeframe) => self
                    .market_data
                    .fetch(symbol, timeframe, self.candle_limit)
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };

        // Both timeframes are fetched together; either failure aborts this symbol
        let (primary, higher) = tokio::try_join!(primary_fetch, higher_fetch)?;

        log::debug!(
            "{}: {} {} candles, {} higher-timeframe candles",
            symbol,
            primary.len(),
            primary.timeframe(),
            higher.as_ref().map_or(0, |h| h.len())
        );

        let report = self.pipeline.run(&primary, higher.as_ref())?;

        log::info!(
            "{}: {} (confidence {:.2}), trend {} / {:?}, zone {}",
            symbol,
            report.signal.direction,
            report.signal.confidence,
            report.trend.direction,
            report.trend.structure,
            report.zone.zone
        );

        Ok(report)
    }
}
