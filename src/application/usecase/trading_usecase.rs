// src/application/usecase/trading_usecase.rs
// One analysis pass over every configured symbol

use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;

use super::analysis_usecase::MarketAnalysisUseCase;
use super::signal_processing_usecase::SignalProcessingUseCase;
use crate::domain::errors::AppError;
use crate::domain::repository::MarketDataRepository;
use crate::domain::service::NotificationService;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub pairs_analyzed: usize,
    pub signals_generated: usize,
    pub errors: Vec<String>,
    pub duration: Duration,
}

impl RunSummary {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            pairs_analyzed: 0,
            signals_generated: 0,
            errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }
}

/// Human-readable failure with the engine's machine-readable reason when there is one
pub fn error_reason(error: &AppError) -> String {
    match error {
        AppError::Engine(e) => format!("{} [{}]", e, e.code()),
        other => other.to_string(),
    }
}

pub struct TradingUseCase {
    market_data: Arc<dyn MarketDataRepository + Send + Sync>,
    notifier: Arc<dyn NotificationService + Send + Sync>,
    analysis: Arc<dyn MarketAnalysisUseCase + Send + Sync>,
    signals: Arc<dyn SignalProcessingUseCase + Send + Sync>,
    symbols: Vec<String>,
}

impl TradingUseCase {
    pub fn new(
        market_data: Arc<dyn MarketDataRepository + Send + Sync>,
        notifier: Arc<dyn NotificationService + Send + Sync>,
        analysis: Arc<dyn MarketAnalysisUseCase + Send + Sync>,
        signals: Arc<dyn SignalProcessingUseCase + Send + Sync>,
        symbols: Vec<String>,
    ) -> Self {
        Self {
            market_data,
            notifier,
            analysis,
            signals,
            symbols,
        }
    }

    async fn process_symbol(&self, symbol: &str) -> Result<bool, AppError> {
        let report = self.analysis.analyze_symbol(symbol).await?;
        self.signals.process_report(report).await
    }

    /// Analyze all symbols concurrently. A failing symbol is recorded and
    /// reported; it never stops the others.
    pub async fn run_once(&self) -> RunSummary {
        let timer = Instant::now();
        let mut summary = RunSummary::new(Utc::now());

        log::info!("Starting analysis of {} pairs", self.symbols.len());

        if !self.market_data.test_connection().await {
            let message = "Market data connection test failed".to_string();
            log::error!("{}", message);
            self.notifier.notify_error(&message).await;
            summary.errors.push(message);
            summary.duration = timer.elapsed();
            return summary;
        }
        if !self.notifier.test_connection().await {
            log::warn!("Notification connection test failed, signals may not be delivered");
        }

        let results = join_all(self.symbols.iter().map(|symbol| self.process_symbol(symbol))).await;

        for (symbol, result) in self.symbols.iter().zip(results) {
            match result {
                Ok(delivered) => {
                    summary.pairs_analyzed += 1;
                    if delivered {
                        summary.signals_generated += 1;
                    }
                }
                Err(e) => {
                    let message = format!("{}: {}", symbol, error_reason(&e));
                    log::error!("Error analyzing {}", message);
                    self.notifier
                        .notify_error(&format!("Error analyzing {}", message))
                        .await;
                    summary.errors.push(message);
                }
            }
        }

        summary.duration = timer.elapsed();
        log::info!(
            "Analysis complete: {} pairs, {} signals, {} errors in {:.2?}",
            summary.pairs_analyzed,
            summary.signals_generated,
            summary.errors.len(),
            summary.duration
        );

        summary
    }
}
