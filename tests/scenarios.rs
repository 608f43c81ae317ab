mod common;

use common::{create_flat_candles, create_uptrend_candles, test_engine_config};
use trend_signal_bot::analysis::indicators;
use trend_signal_bot::config::EngineConfig;
use trend_signal_bot::domain::errors::EngineError;
use trend_signal_bot::domain::models::{SignalDirection, Timeframe, TrendDirection};
use trend_signal_bot::trading::SignalPipeline;

#[test]
fn test_rising_series_flips_bullish_once() {
    let config = test_engine_config();
    let series = create_uptrend_candles("BTCUSDT", Timeframe::Hours1, 60);
    let snapshots = indicators::compute(&series, &config.indicators).unwrap();

    let flips: Vec<usize> = snapshots
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0].overlay_direction() != w[1].overlay_direction())
        .map(|(i, _)| i + 1)
        .collect();
    assert_eq!(flips, vec![13]);
    assert_eq!(
        snapshots.last().unwrap().overlay_direction(),
        Some(TrendDirection::Bullish)
    );
}

#[test]
fn test_buy_on_flip_candle() {
    let pipeline = SignalPipeline::new(test_engine_config()).unwrap();
    let series = create_uptrend_candles("BTCUSDT", Timeframe::Hours1, 14);

    let report = pipeline.run(&series, None).unwrap();
    let signal = &report.signal;

    assert_eq!(signal.direction, SignalDirection::Buy);
    assert!(signal.confidence >= 0.5);
    assert_eq!(signal.entry_price, 106.5);
    let stop = signal.stop_loss().unwrap();
    assert!((stop - 102.9).abs() < 1e-9);
    assert!(stop < signal.entry_price);
    assert!((signal.take_profit()[0] - 111.9).abs() < 1e-9);
    assert_eq!(signal.timestamp, series.last().unwrap().timestamp());
}

#[test]
fn test_no_signal_away_from_the_flip() {
    let pipeline = SignalPipeline::new(test_engine_config()).unwrap();
    let full = create_uptrend_candles("BTCUSDT", Timeframe::Hours1, 60);

    for len in 11..=60 {
        let prefix = trend_signal_bot::domain::models::CandleSeries::new(
            "BTCUSDT",
            Timeframe::Hours1,
            full.candles()[..len].to_vec(),
        )
        .unwrap();
        let report = pipeline.run(&prefix, None).unwrap();
        let expected = if len == 14 {
            SignalDirection::Buy
        } else {
            SignalDirection::Hold
        };
        assert_eq!(report.signal.direction, expected, "prefix of {} candles", len);
    }
}

#[test]
fn test_higher_timeframe_agreement_adds_confidence() {
    let pipeline = SignalPipeline::new(test_engine_config()).unwrap();
    let primary = create_uptrend_candles("BTCUSDT", Timeframe::Hours1, 14);
    let higher = create_uptrend_candles("BTCUSDT", Timeframe::Hours4, 60);

    let alone = pipeline.run(&primary, None).unwrap();
    let confirmed = pipeline.run(&primary, Some(&higher)).unwrap();

    assert_eq!(confirmed.signal.direction, SignalDirection::Buy);
    assert!((confirmed.signal.confidence - alone.signal.confidence - 0.15).abs() < 1e-9);
    assert_eq!(
        confirmed.higher_timeframe.unwrap().overlay_direction,
        TrendDirection::Bullish
    );
}

#[test]
fn test_higher_timeframe_conflict_holds() {
    let pipeline = SignalPipeline::new(test_engine_config()).unwrap();
    let primary = create_uptrend_candles("BTCUSDT", Timeframe::Hours1, 14);
    // still bearish: the higher series ends before its own flip
    let higher = create_uptrend_candles("BTCUSDT", Timeframe::Hours4, 12);

    let report = pipeline.run(&primary, Some(&higher)).unwrap();
    assert_eq!(report.signal.direction, SignalDirection::Hold);
    assert!(report
        .signal
        .supporting_factors
        .iter()
        .any(|f| f.contains("conflicts")));
}

#[test]
fn test_flat_series_holds() {
    let pipeline = SignalPipeline::new(EngineConfig::default()).unwrap();
    let series = create_flat_candles("BTCUSDT", Timeframe::Hours1, 60);

    let report = pipeline.run(&series, None).unwrap();
    assert_eq!(report.signal.direction, SignalDirection::Hold);
    assert!(report.signal.levels.is_none());
    assert_eq!(report.latest.atr, 0.0);
    assert_eq!(report.latest.rsi, Some(50.0));
    assert_eq!(report.latest.volume_trend, Some(0.0));
}

#[test]
fn test_short_series_is_insufficient_data() {
    let pipeline = SignalPipeline::new(test_engine_config()).unwrap();
    let series = create_uptrend_candles("BTCUSDT", Timeframe::Hours1, 10);

    let err = pipeline.run(&series, None).unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientData {
            required: 11,
            available: 10
        }
    );
    assert_eq!(err.code(), "insufficient_data");
}

#[test]
fn test_pipeline_is_idempotent() {
    let pipeline = SignalPipeline::new(test_engine_config()).unwrap();
    let series = create_uptrend_candles("BTCUSDT", Timeframe::Hours1, 14);
    assert_eq!(
        pipeline.run(&series, None).unwrap(),
        pipeline.run(&series, None).unwrap()
    );
}
