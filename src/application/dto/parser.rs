// src/application/dto/parser.rs
// Parsers for DTOs

use super::{ApplicationError, KlineResponse};
use crate::domain::errors::EngineResult;
use crate::domain::models::{Candle, CandleSeries, Timeframe};

/// Parse a klines response body
pub fn parse_klines(body: &str) -> Result<Vec<KlineResponse>, ApplicationError> {
    let raw_klines: Vec<Vec<serde_json::Value>> = serde_json::from_str(body)?;

    raw_klines
        .iter()
        .map(|kline_data| KlineResponse::from_raw_data(kline_data))
        .collect()
}

/// Validate parsed klines into a candle series
pub fn klines_to_series(
    symbol: &str,
    timeframe: Timeframe,
    klines: &[KlineResponse],
) -> EngineResult<CandleSeries> {
    let candles = klines
        .iter()
        .map(KlineResponse::to_candle)
        .collect::<EngineResult<Vec<_>>>()?;
    CandleSeries::new(symbol, timeframe, candles)
}

impl KlineResponse {
    pub fn from_raw_data(data: &[serde_json::Value]) -> Result<Self, ApplicationError> {
        if data.len() < 11 {
            return Err(ApplicationError::ParseError(format!(
                "Invalid data length: expected 11 elements, got {}",
                data.len()
            )));
        }

        let parse_timestamp = |value: &serde_json::Value, field: &str| -> Result<chrono::DateTime<chrono::Utc>, ApplicationError> {
            value
                .as_i64()
                .ok_or_else(|| ApplicationError::ParseError(format!("Invalid {} format", field)))
                .and_then(|ts| {
                    chrono::DateTime::from_timestamp_millis(ts).ok_or_else(|| {
                        ApplicationError::ParseError(format!("Invalid timestamp for {}: {}", field, ts))
                    })
                })
        };

        let parse_float = |value: &serde_json::Value, field: &str| -> Result<f64, ApplicationError> {
            value
                .as_str()
                .ok_or_else(|| ApplicationError::ParseError(format!("Invalid {} format", field)))
                .and_then(|s| s.parse().map_err(ApplicationError::NumberParseError))
        };

        Ok(Self {
            open_time: parse_timestamp(&data[0], "open_time")?,
            open_price: parse_float(&data[1], "open_price")?,
            high_price: parse_float(&data[2], "high_price")?,
            low_price: parse_float(&data[3], "low_price")?,
            close_price: parse_float(&data[4], "close_price")?,
            volume: parse_float(&data[5], "volume")?,
            close_time: parse_timestamp(&data[6], "close_time")?,
            quote_asset_volume: parse_float(&data[7], "quote_asset_volume")?,
            number_of_trades: data[8]
                .as_u64()
                .ok_or_else(|| ApplicationError::ParseError("Invalid number_of_trades format".to_string()))?,
            taker_buy_base_volume: parse_float(&data[9], "taker_buy_base_volume")?,
            taker_buy_quote_volume: parse_float(&data[10], "taker_buy_quote_volume")?,
        })
    }

    /// Candle keyed by the kline's open time
    pub fn to_candle(&self) -> EngineResult<Candle> {
        Candle::new(
            self.open_time,
            self.open_price,
            self.high_price,
            self.low_price,
            self.close_price,
            self.volume,
        )
    }
}
