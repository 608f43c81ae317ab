// src/analysis/indicators.rs
use crate::config::IndicatorConfig;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    BollingerValue, CandleSeries, DirectionalMovement, IndicatorSnapshot, MovingAverageValue,
    TrendDirection, TrendOverlay,
};
use log::debug;
use ta::indicators::{BollingerBands, ExponentialMovingAverage, SimpleMovingAverage};
use ta::Next;

/// Smallest series length `compute` accepts for this configuration
pub fn required_length(config: &IndicatorConfig) -> usize {
    let enabled = &config.enabled;
    let mut lookbacks = vec![config.atr_period + 1];

    if enabled.pivots || enabled.trend_overlay {
        lookbacks.push(2 * config.pivot_period + 1);
    }
    if enabled.momentum {
        lookbacks.push(config.rsi_period + 1);
    }
    if enabled.moving_averages {
        lookbacks.extend(config.sma_lengths.iter().chain(&config.ema_lengths).copied());
    }
    if enabled.bollinger {
        lookbacks.push(config.bollinger_period);
    }
    if enabled.volume_trend {
        lookbacks.push(config.volume_long);
    }
    if enabled.directional {
        lookbacks.push(2 * config.adx_period + 1);
    }

    lookbacks.into_iter().max().unwrap_or(1)
}

/// Compute one snapshot per candle.
///
/// Entries before an indicator's warm-up are filled with its first complete
/// value, so every snapshot carries finite numbers.
pub fn compute(
    series: &CandleSeries,
    config: &IndicatorConfig,
) -> EngineResult<Vec<IndicatorSnapshot>> {
    config.validate()?;

    let required = required_length(config);
    if series.len() < required {
        return Err(EngineError::InsufficientData {
            required,
            available: series.len(),
        });
    }

    let highs = series.high_prices();
    let lows = series.low_prices();
    let closes = series.close_prices();
    let volumes = series.volume();
    let enabled = &config.enabled;

    let tr = true_range(&highs, &lows, &closes);
    let atr = wilder_average(&tr, config.atr_period);

    let pivot_window = 2 * config.pivot_period + 1;
    let pivots = if enabled.pivots || enabled.trend_overlay {
        Some((
            rolling_extreme(&highs, pivot_window, f64::max),
            rolling_extreme(&lows, pivot_window, f64::min),
        ))
    } else {
        None
    };

    let overlay = match (&pivots, enabled.trend_overlay) {
        (Some((ph, pl)), true) => Some(trend_overlay(
            &closes,
            ph,
            pl,
            &atr,
            config.atr_factor,
            config.atr_period.max(pivot_window - 1),
        )),
        _ => None,
    };

    let rsi = enabled.momentum.then(|| rsi(&closes, config.rsi_period));

    let (sma, ema) = if enabled.moving_averages {
        let sma = config
            .sma_lengths
            .iter()
            .map(|&len| Ok((len, simple_moving_average(&closes, len)?)))
            .collect::<EngineResult<Vec<_>>>()?;
        let ema = config
            .ema_lengths
            .iter()
            .map(|&len| Ok((len, exponential_moving_average(&closes, len)?)))
            .collect::<EngineResult<Vec<_>>>()?;
        (sma, ema)
    } else {
        (Vec::new(), Vec::new())
    };

    let bollinger = if enabled.bollinger {
        Some(bollinger_bands(
            &closes,
            config.bollinger_period,
            config.bollinger_std_dev,
        )?)
    } else {
        None
    };

    let volume_trend = enabled
        .volume_trend
        .then(|| volume_trend(&volumes, config.volume_short, config.volume_long));

    let directional = enabled
        .directional
        .then(|| directional_movement(&highs, &lows, &tr, config.adx_period));

    let snapshots: Vec<IndicatorSnapshot> = series
        .candles()
        .iter()
        .enumerate()
        .map(|(i, candle)| IndicatorSnapshot {
            timestamp: candle.timestamp(),
            close: candle.close(),
            atr: atr[i],
            trend_overlay: overlay.as_ref().map(|o| o[i]),
            pivot_high: pivots.as_ref().filter(|_| enabled.pivots).map(|(ph, _)| ph[i]),
            pivot_low: pivots.as_ref().filter(|_| enabled.pivots).map(|(_, pl)| pl[i]),
            rsi: rsi.as_ref().map(|r| r[i]),
            sma: sma
                .iter()
                .map(|(length, values)| MovingAverageValue {
                    length: *length,
                    value: values[i],
                })
                .collect(),
            ema: ema
                .iter()
                .map(|(length, values)| MovingAverageValue {
                    length: *length,
                    value: values[i],
                })
                .collect(),
            bollinger: bollinger.as_ref().map(|b| b[i]),
            volume_trend: volume_trend.as_ref().map(|v| v[i]),
            directional: directional.as_ref().map(|d| d[i]),
        })
        .collect();

    debug!(
        "{} {}: computed {} snapshots (warm-up {})",
        series.symbol(),
        series.timeframe(),
        snapshots.len(),
        required
    );

    Ok(snapshots)
}

fn backfill<T: Copy>(values: &mut [T], first_valid: usize) {
    if let Some(&first) = values.get(first_valid) {
        for value in values.iter_mut().take(first_valid) {
            *value = first;
        }
    }
}

fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..highs.len())
        .map(|i| {
            let range = highs[i] - lows[i];
            if i == 0 {
                range
            } else {
                range
                    .max((highs[i] - closes[i - 1]).abs())
                    .max((lows[i] - closes[i - 1]).abs())
            }
        })
        .collect()
}

/// Wilder smoothing; the first value is the mean of `values[1..=period]`
/// and lands at index `period`.
fn wilder_average(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    if values.len() <= period {
        return out;
    }

    out[period] = values[1..=period].iter().sum::<f64>() / period as f64;
    for i in (period + 1)..values.len() {
        out[i] = (out[i - 1] * (period - 1) as f64 + values[i]) / period as f64;
    }

    backfill(&mut out, period);
    out
}

/// Trailing extremum over `window` candles, confirmed at the window's last candle
fn rolling_extreme(values: &[f64], window: usize, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    if values.len() < window {
        return out;
    }

    for i in (window - 1)..values.len() {
        out[i] = values[i + 1 - window..=i]
            .iter()
            .copied()
            .fold(values[i], pick);
    }

    backfill(&mut out, window - 1);
    out
}

fn trend_overlay(
    closes: &[f64],
    pivot_high: &[f64],
    pivot_low: &[f64],
    atr: &[f64],
    factor: f64,
    start: usize,
) -> Vec<TrendOverlay> {
    let n = closes.len();
    let mut out = vec![
        TrendOverlay {
            value: 0.0,
            upper_band: 0.0,
            lower_band: 0.0,
            direction: TrendDirection::Bearish,
        };
        n
    ];
    if n <= start {
        return out;
    }

    for i in start..n {
        let mid = (pivot_high[i] + pivot_low[i]) / 2.0;
        let basic_upper = mid + factor * atr[i];
        let basic_lower = mid - factor * atr[i];

        let (upper, lower, direction) = if i == start {
            let direction = if closes[i] > basic_upper {
                TrendDirection::Bullish
            } else {
                TrendDirection::Bearish
            };
            (basic_upper, basic_lower, direction)
        } else {
            let prev = out[i - 1];
            let prev_close = closes[i - 1];

            // Bands only move toward price unless price already broke them
            let upper = if basic_upper < prev.upper_band || prev_close > prev.upper_band {
                basic_upper
            } else {
                prev.upper_band
            };
            let lower = if basic_lower > prev.lower_band || prev_close < prev.lower_band {
                basic_lower
            } else {
                prev.lower_band
            };

            let direction = if closes[i] > prev.upper_band {
                TrendDirection::Bullish
            } else if closes[i] < prev.lower_band {
                TrendDirection::Bearish
            } else {
                prev.direction
            };
            (upper, lower, direction)
        };

        out[i] = TrendOverlay {
            value: if direction == TrendDirection::Bullish {
                lower
            } else {
                upper
            },
            upper_band: upper,
            lower_band: lower,
            direction,
        };
    }

    backfill(&mut out, start);
    out
}

fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut out = vec![50.0; n];
    if n <= period {
        return out;
    }

    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            gains[i] = change;
        } else {
            losses[i] = -change;
        }
    }

    let avg_gain = wilder_average(&gains, period);
    let avg_loss = wilder_average(&losses, period);

    for i in period..n {
        out[i] = if avg_gain[i] + avg_loss[i] <= f64::EPSILON {
            50.0
        } else if avg_loss[i] <= f64::EPSILON {
            100.0
        } else {
            let rs = avg_gain[i] / avg_loss[i];
            100.0 - 100.0 / (1.0 + rs)
        };
    }

    backfill(&mut out, period);
    out
}

fn ta_error(indicator: &str, err: ta::errors::TaError) -> EngineError {
    EngineError::Configuration(format!("{} rejected its parameters: {:?}", indicator, err))
}

fn simple_moving_average(closes: &[f64], length: usize) -> EngineResult<Vec<f64>> {
    let mut sma = SimpleMovingAverage::new(length).map_err(|e| ta_error("SMA", e))?;
    let mut out: Vec<f64> = closes.iter().map(|&c| sma.next(c)).collect();
    backfill(&mut out, length - 1);
    Ok(out)
}

fn exponential_moving_average(closes: &[f64], length: usize) -> EngineResult<Vec<f64>> {
    let mut ema = ExponentialMovingAverage::new(length).map_err(|e| ta_error("EMA", e))?;
    let mut out: Vec<f64> = closes.iter().map(|&c| ema.next(c)).collect();
    backfill(&mut out, length - 1);
    Ok(out)
}

fn bollinger_bands(
    closes: &[f64],
    period: usize,
    std_dev: f64,
) -> EngineResult<Vec<BollingerValue>> {
    let mut bands = BollingerBands::new(period, std_dev).map_err(|e| ta_error("Bollinger", e))?;
    let mut out: Vec<BollingerValue> = closes
        .iter()
        .map(|&c| {
            let o = bands.next(c);
            // rounding can push the running variance below zero
            let (upper, lower) = if o.upper.is_finite() && o.lower.is_finite() {
                (o.upper, o.lower)
            } else {
                (o.average, o.average)
            };
            BollingerValue {
                upper,
                middle: o.average,
                lower,
                width: if o.average.abs() > f64::EPSILON {
                    (upper - lower) / o.average
                } else {
                    0.0
                },
            }
        })
        .collect();
    backfill(&mut out, period - 1);
    Ok(out)
}

fn volume_trend(volumes: &[f64], short: usize, long: usize) -> Vec<f64> {
    let n = volumes.len();
    let mut out = vec![0.0; n];
    if n < long {
        return out;
    }

    for i in (long - 1)..n {
        let short_avg = volumes[i + 1 - short..=i].iter().sum::<f64>() / short as f64;
        let long_avg = volumes[i + 1 - long..=i].iter().sum::<f64>() / long as f64;
        out[i] = if long_avg > 0.0 {
            (short_avg / long_avg - 1.0) * 100.0
        } else {
            0.0
        };
    }

    backfill(&mut out, long - 1);
    out
}

fn directional_movement(
    highs: &[f64],
    lows: &[f64],
    tr: &[f64],
    period: usize,
) -> Vec<DirectionalMovement> {
    let n = highs.len();
    let zero = DirectionalMovement {
        adx: 0.0,
        plus_di: 0.0,
        minus_di: 0.0,
    };
    let mut out = vec![zero; n];
    if n < 2 * period {
        return out;
    }

    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up = highs[i] - highs[i - 1];
        let down = lows[i - 1] - lows[i];
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    // Wilder averages give the same DI ratios as Wilder running sums
    let smoothed_tr = wilder_average(tr, period);
    let smoothed_plus = wilder_average(&plus_dm, period);
    let smoothed_minus = wilder_average(&minus_dm, period);

    let mut dx = vec![0.0; n];
    for i in period..n {
        let (plus_di, minus_di) = if smoothed_tr[i] > 0.0 {
            (
                100.0 * smoothed_plus[i] / smoothed_tr[i],
                100.0 * smoothed_minus[i] / smoothed_tr[i],
            )
        } else {
            (0.0, 0.0)
        };
        let di_sum = plus_di + minus_di;
        dx[i] = if di_sum > 0.0 {
            100.0 * (plus_di - minus_di).abs() / di_sum
        } else {
            0.0
        };
        out[i].plus_di = plus_di;
        out[i].minus_di = minus_di;
    }

    let adx_start = 2 * period - 1;
    out[adx_start].adx = dx[period..=adx_start].iter().sum::<f64>() / period as f64;
    for i in (adx_start + 1)..n {
        out[i].adx = (out[i - 1].adx * (period - 1) as f64 + dx[i]) / period as f64;
    }

    backfill(&mut out, adx_start);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndicatorToggles;
    use crate::domain::models::{Candle, Timeframe};
    use chrono::{TimeZone, Utc};

    fn create_candles(closes: &[f64]) -> CandleSeries {
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = close - 0.4;
                Candle::new(
                    Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                    open,
                    close + 0.2,
                    open - 0.2,
                    close,
                    1000.0 + i as f64,
                )
                .unwrap()
            })
            .collect();
        CandleSeries::new("BTCUSDT", Timeframe::Hours1, candles).unwrap()
    }

    fn create_uptrend_candles(count: usize) -> CandleSeries {
        let closes: Vec<f64> = (0..count).map(|i| 100.0 + 0.5 * i as f64).collect();
        create_candles(&closes)
    }

    fn short_config() -> IndicatorConfig {
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

    #[test]
    fn test_required_length_tracks_enabled_indicators() {
        let config = IndicatorConfig::default();
        assert_eq!(required_length(&config), 50);

        let mut config = short_config();
        assert_eq!(required_length(&config), 11);

        config.enabled = IndicatorToggles {
            trend_overlay: true,
            pivots: false,
            momentum: false,
            moving_averages: false,
            bollinger: false,
            volume_trend: false,
            directional: false,
        };
        config.atr_period = 3;
        assert_eq!(required_length(&config), 5);
    }

    #[test]
    fn test_insufficient_data() {
        let series = create_uptrend_candles(10);
        let err = compute(&series, &short_config()).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientData {
                required: 11,
                available: 10
            }
        );
    }

    #[test]
    fn test_snapshots_align_with_candles() {
        let series = create_uptrend_candles(60);
        let snapshots = compute(&series, &IndicatorConfig::default()).unwrap();
        assert_eq!(snapshots.len(), 60);
        for (snapshot, candle) in snapshots.iter().zip(series.candles()) {
            assert_eq!(snapshot.timestamp, candle.timestamp());
            assert_eq!(snapshot.sma.len(), 2);
            assert_eq!(snapshot.ema.len(), 2);
        }
    }

    #[test]
    fn test_atr_of_constant_ranges() {
        let series = create_uptrend_candles(30);
        let snapshots = compute(&series, &short_config()).unwrap();
        for snapshot in &snapshots {
            assert!((snapshot.atr - 0.8).abs() < 1e-9);
        }
    }

    #[test]
    fn test_overlay_flips_bullish_on_rising_series() {
        let series = create_uptrend_candles(60);
        let snapshots = compute(&series, &short_config()).unwrap();

        // Seeded bearish at the first computable candle
        for snapshot in &snapshots[..13] {
            assert_eq!(snapshot.overlay_direction(), Some(TrendDirection::Bearish));
        }
        let flip = snapshots[13].trend_overlay.unwrap();
        assert_eq!(flip.direction, TrendDirection::Bullish);
        assert!((flip.value - 102.9).abs() < 1e-9);

        for snapshot in &snapshots[13..] {
            assert_eq!(snapshot.overlay_direction(), Some(TrendDirection::Bullish));
            assert!(snapshot.trend_overlay.unwrap().value < snapshot.close);
        }
    }

    #[test]
    fn test_overlay_upper_band_ratchets_down_only() {
        let series = create_uptrend_candles(14);
        let snapshots = compute(&series, &short_config()).unwrap();
        let uppers: Vec<f64> = snapshots[10..13]
            .iter()
            .map(|s| s.trend_overlay.unwrap().upper_band)
            .collect();
        assert!(uppers.iter().all(|&u| (u - 106.2).abs() < 1e-9));
    }

    #[test]
    fn test_pivots_trail_the_window() {
        let series = create_uptrend_candles(20);
        let snapshots = compute(&series, &short_config()).unwrap();
        let last = snapshots.last().unwrap();
        // window of 5: highest high is the last candle, lowest low is four candles back
        assert!((last.pivot_high.unwrap() - (109.5 + 0.2)).abs() < 1e-9);
        assert!((last.pivot_low.unwrap() - (107.5 - 0.6)).abs() < 1e-9);
        // back-filled leading values
        assert_eq!(snapshots[0].pivot_high, snapshots[4].pivot_high);
    }

    #[test]
    fn test_rsi_neutral_and_saturated_values() {
        let flat = create_candles(&[100.0; 20]);
        let snapshots = compute(&flat, &short_config()).unwrap();
        assert!(snapshots.iter().all(|s| s.rsi == Some(50.0)));

        let rising = create_uptrend_candles(20);
        let snapshots = compute(&rising, &short_config()).unwrap();
        assert_eq!(snapshots.last().unwrap().rsi, Some(100.0));
    }

    #[test]
    fn test_moving_averages_are_backfilled() {
        let series = create_uptrend_candles(20);
        let snapshots = compute(&series, &short_config()).unwrap();
        // SMA(5) first complete at index 4: mean of closes 100..102
        let first = snapshots[4].sma(5).unwrap();
        assert!((first - 101.0).abs() < 1e-9);
        assert_eq!(snapshots[0].sma(5), Some(first));
        assert!(snapshots.last().unwrap().ema(9).unwrap() > first);
    }

    #[test]
    fn test_volume_trend_is_zero_without_volume() {
        let candles = (0..20)
            .map(|i| {
                Candle::new(
                    Utc.timestamp_opt(1_700_000_000 + i * 3600, 0).unwrap(),
                    100.0,
                    101.0,
                    99.0,
                    100.5,
                    0.0,
                )
                .unwrap()
            })
            .collect();
        let series = CandleSeries::new("ETHUSDT", Timeframe::Hours1, candles).unwrap();
        let snapshots = compute(&series, &short_config()).unwrap();
        assert!(snapshots.iter().all(|s| s.volume_trend == Some(0.0)));
    }

    #[test]
    fn test_directional_movement_on_uptrend() {
        let series = create_uptrend_candles(30);
        let snapshots = compute(&series, &short_config()).unwrap();
        let dm = snapshots.last().unwrap().directional.unwrap();
        assert!(dm.plus_di > dm.minus_di);
        assert!(dm.adx > 25.0);
    }

    #[test]
    fn test_disabled_indicators_are_absent() {
        let mut config = short_config();
        config.enabled.momentum = false;
        config.enabled.bollinger = false;
        config.enabled.pivots = false;
        let series = create_uptrend_candles(20);
        let snapshots = compute(&series, &config).unwrap();
        let last = snapshots.last().unwrap();
        assert!(last.rsi.is_none());
        assert!(last.bollinger.is_none());
        assert!(last.pivot_high.is_none());
        assert!(last.trend_overlay.is_some());
    }

    #[test]
    fn test_flat_series_has_no_nan() {
        let series = create_candles(&[100.0; 60]);
        let snapshots = compute(&series, &IndicatorConfig::default()).unwrap();
        for s in &snapshots {
            assert!(s.atr.is_finite());
            assert!(s.bollinger.unwrap().width.is_finite());
            assert!(s.directional.unwrap().adx.is_finite());
        }
    }
}
