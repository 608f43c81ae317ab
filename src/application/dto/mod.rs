// src/application/dto/mod.rs
// Exchange wire formats

pub mod parser;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Number parse error: {0}")]
    NumberParseError(#[from] std::num::ParseFloatError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// One row of the Binance `/api/v3/klines` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlineResponse {
    pub open_time: DateTime<Utc>,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub volume: f64,
    pub close_time: DateTime<Utc>,
    pub quote_asset_volume: f64,
    pub number_of_trades: u64,
    pub taker_buy_base_volume: f64,
    pub taker_buy_quote_volume: f64,
}
