// src/domain/service/mod.rs
// Domain service interfaces

use async_trait::async_trait;

use crate::domain::errors::NarrativeResult;
use crate::domain::models::Signal;

#[async_trait]
pub trait NotificationService {
    /// Deliver a trading signal. Returns false on delivery failure; never retries.
    async fn notify(&self, signal: &Signal) -> bool;

    /// Deliver a free-form error report
    async fn notify_error(&self, message: &str) -> bool;

    async fn test_connection(&self) -> bool;
}

/// Advisory commentary generator. Its output never changes a signal's
/// direction, confidence or risk levels.
#[async_trait]
pub trait NarrativeService {
    /// Produce commentary for a plain-text analysis summary
    async fn commentary(&self, symbol: &str, summary: &str) -> NarrativeResult<String>;
}
