// Shared fixtures for the integration tests
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use trend_signal_bot::config::{EngineConfig, IndicatorConfig, SignalConfig};
use trend_signal_bot::domain::models::{Candle, CandleSeries, Timeframe};

pub fn ts(hour: usize) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + hour as i64 * 3600, 0).unwrap()
}

/// close = 100 + 0.5 i, constant 0.8 range, so ATR stays at 0.8
pub fn create_uptrend_candles(symbol: &str, timeframe: Timeframe, count: usize) -> CandleSeries {
    let candles = (0..count)
        .map(|i| {
            let close = 100.0 + 0.5 * i as f64;
            let open = close - 0.4;
            Candle::new(ts(i), open, close + 0.2, open - 0.2, close, 1000.0).unwrap()
        })
        .collect();
    CandleSeries::new(symbol, timeframe, candles).unwrap()
}

pub fn create_flat_candles(symbol: &str, timeframe: Timeframe, count: usize) -> CandleSeries {
    let candles = (0..count)
        .map(|i| Candle::new(ts(i), 100.0, 100.0, 100.0, 100.0, 1000.0).unwrap())
        .collect();
    CandleSeries::new(symbol, timeframe, candles).unwrap()
}

/// Short lookbacks so a 14-candle series is enough, ATR 10 x 3 and pivot period 2
pub fn short_indicator_config() -> IndicatorConfig {
    IndicatorConfig {
        rsi_period: 7,
        sma_lengths: vec![5],
        ema_lengths: vec![9],
        bollinger_period: 10,
        volume_short: 5,
        volume_long: 10,
        adx_period: 5,
        ..IndicatorConfig::default()
    }
}

pub fn test_engine_config() -> EngineConfig {
    EngineConfig {
        indicators: short_indicator_config(),
        signal: SignalConfig {
            min_confidence: 0.5,
            ..SignalConfig::default()
        },
        ..EngineConfig::default()
    }
}
