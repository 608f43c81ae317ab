// src/application/usecase/signal_processing_usecase.rs
// Signal processing use cases

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::{AppError, AppResult};
use crate::domain::models::{AnalysisReport, SignalDirection};
use crate::domain::service::{NarrativeService, NotificationService};

/// Per-symbol direction of the last delivered signal.
///
/// Kept by the caller so repeated runs on the same trend do not re-notify.
pub struct LastSignalStore {
    path: Option<PathBuf>,
    directions: Mutex<HashMap<String, SignalDirection>>,
}

impl LastSignalStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            directions: Mutex::new(HashMap::new()),
        }
    }

    /// Load markers from a JSON file; a missing file starts empty.
    pub fn load(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let directions = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(AppError::Io(e)),
        };

        Ok(Self {
            path: Some(path),
            directions: Mutex::new(directions),
        })
    }

    pub async fn last(&self, symbol: &str) -> Option<SignalDirection> {
        self.directions.lock().await.get(symbol).copied()
    }

    pub async fn is_repeat(&self, symbol: &str, direction: SignalDirection) -> bool {
        self.last(symbol).await == Some(direction)
    }

    pub async fn record(&self, symbol: &str, direction: SignalDirection) -> AppResult<()> {
        let mut directions = self.directions.lock().await;
        directions.insert(symbol.to_string(), direction);

        if let Some(path) = &self.path {
            let contents = serde_json::to_string_pretty(&*directions)?;
            tokio::fs::write(path, contents).await?;
        }
        Ok(())
    }
}

/// Plain-text digest of a report for the narrative collaborator
pub fn summarize(report: &AnalysisReport) -> String {
    let signal = &report.signal;
    let mut lines = vec![
        format!(
            "Symbol: {} ({}), close {:.4}",
            report.symbol, signal.timeframe, report.latest.close
        ),
        format!(
            "Trend: {} {:?}, structure {:?}",
            report.trend.direction, report.trend.strength, report.trend.structure
        ),
        format!(
            "Zone: {} at {:.1}% of range {:.4}-{:.4}",
            report.zone.zone,
            report.zone.position * 100.0,
            report.zone.range_low,
            report.zone.range_high
        ),
    ];
    if let Some(rsi) = report.latest.rsi {
        lines.push(format!("RSI: {:.1}", rsi));
    }
    if let Some(higher) = &report.higher_timeframe {
        lines.push(format!(
            "{} trend overlay: {}",
            higher.timeframe, higher.overlay_direction
        ));
    }
    lines.push(format!(
        "Signal: {} confidence {:.2}",
        signal.direction, signal.confidence
    ));
    if let Some(stop) = signal.stop_loss() {
        lines.push(format!(
            "Entry {:.4}, stop {:.4}, targets {:?}",
            signal.entry_price,
            stop,
            signal.take_profit()
        ));
    }
    lines.push(format!("Factors: {}", signal.supporting_factors.join("; ")));
    lines.join("\n")
}

/// Signal processing use case
#[async_trait]
pub trait SignalProcessingUseCase {
    /// Enrich, de-duplicate and deliver. Returns true when a notification went out.
    async fn process_report(&self, report: AnalysisReport) -> Result<bool, AppError>;
}

pub struct SignalProcessor {
    notifier: Arc<dyn NotificationService + Send + Sync>,
    narrative: Option<Arc<dyn NarrativeService + Send + Sync>>,
    last_signals: Arc<LastSignalStore>,
}

impl SignalProcessor {
    pub fn new(
        notifier: Arc<dyn NotificationService + Send + Sync>,
        narrative: Option<Arc<dyn NarrativeService + Send + Sync>>,
        last_signals: Arc<LastSignalStore>,
    ) -> Self {
        Self {
            notifier,
            narrative,
            last_signals,
        }
    }
}

#[async_trait]
impl SignalProcessingUseCase for SignalProcessor {
    async fn process_report(&self, report: AnalysisReport) -> Result<bool, AppError> {
        let mut signal = report.signal.clone();

        if !signal.is_actionable() {
            log::debug!(
                "Hold Position - Symbol: {}, Price: {}, Reason: {}",
                signal.symbol,
                signal.entry_price,
                signal.supporting_factors.join("; ")
            );
            return Ok(false);
        }

        if self.last_signals.is_repeat(&signal.symbol, signal.direction).await {
            log::info!(
                "{}: {} already notified, skipping",
                signal.symbol,
                signal.direction
            );
            return Ok(false);
        }

        if let Some(narrative) = &self.narrative {
            match narrative.commentary(&signal.symbol, &summarize(&report)).await {
                Ok(text) => {
                    signal.supporting_factors.push(format!("Commentary: {}", text));
                    signal.narrative = Some(text);
                }
                Err(e) => log::warn!("{}: narrative unavailable: {}", signal.symbol, e),
            }
        }

        if !self.notifier.notify(&signal).await {
            log::error!("{}: failed to deliver {} signal", signal.symbol, signal.direction);
            return Ok(false);
        }

        self.last_signals
            .record(&signal.symbol, signal.direction)
            .await?;
        log::info!("{}: {} signal delivered", signal.symbol, signal.direction);

        Ok(true)
    }
}
