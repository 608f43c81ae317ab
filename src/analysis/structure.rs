// src/analysis/structure.rs
use crate::config::StructureConfig;
use crate::domain::models::{
    Candle, IndicatorSnapshot, MarketStructure, MovingAverageValue, TrendDirection, TrendState,
    TrendStrength,
};
use chrono::{DateTime, Utc};

/// Local extreme confirmed by `window` candles on each side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingPoint {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Highs strictly above the left window and not exceeded by the right window.
/// The asymmetry keeps a flat top from producing one swing per candle.
pub fn swing_highs(candles: &[Candle], window: usize) -> Vec<SwingPoint> {
    find_swings(candles, window, |c| c.high(), |a, b| a > b, |a, b| a >= b)
}

pub fn swing_lows(candles: &[Candle], window: usize) -> Vec<SwingPoint> {
    find_swings(candles, window, |c| c.low(), |a, b| a < b, |a, b| a <= b)
}

fn find_swings(
    candles: &[Candle],
    window: usize,
    price: fn(&Candle) -> f64,
    beats_left: fn(f64, f64) -> bool,
    beats_right: fn(f64, f64) -> bool,
) -> Vec<SwingPoint> {
    if window == 0 || candles.len() < 2 * window + 1 {
        return Vec::new();
    }

    (window..candles.len() - window)
        .filter(|&i| {
            let p = price(&candles[i]);
            candles[i - window..i].iter().all(|c| beats_left(p, price(c)))
                && candles[i + 1..=i + window]
                    .iter()
                    .all(|c| beats_right(p, price(c)))
        })
        .map(|i| SwingPoint {
            index: i,
            timestamp: candles[i].timestamp(),
            price: price(&candles[i]),
        })
        .collect()
}

/// Up/downtrend needs two consecutive advances (three swings) on both sides.
pub fn market_structure(highs: &[SwingPoint], lows: &[SwingPoint]) -> MarketStructure {
    if highs.len() < 3 || lows.len() < 3 {
        return MarketStructure::Sideways;
    }

    let last_highs = &highs[highs.len() - 3..];
    let last_lows = &lows[lows.len() - 3..];
    let rising = |points: &[SwingPoint]| points.windows(2).all(|w| w[1].price > w[0].price);
    let falling = |points: &[SwingPoint]| points.windows(2).all(|w| w[1].price < w[0].price);

    if rising(last_highs) && rising(last_lows) {
        MarketStructure::Uptrend
    } else if falling(last_highs) && falling(last_lows) {
        MarketStructure::Downtrend
    } else {
        MarketStructure::Sideways
    }
}

/// Shortest and longest configured averages, EMAs preferred.
fn fast_slow(averages: &[MovingAverageValue]) -> Option<(usize, usize)> {
    let fast = averages.iter().map(|m| m.length).min()?;
    let slow = averages.iter().map(|m| m.length).max()?;
    Some((fast, slow))
}

fn sign(a: f64, b: f64) -> i32 {
    if a > b {
        1
    } else if a < b {
        -1
    } else {
        0
    }
}

/// Direction and strength from moving-average ordering, slope and ADX;
/// structure from swing points.
pub fn trend_state(
    candles: &[Candle],
    snapshots: &[IndicatorSnapshot],
    config: &StructureConfig,
) -> TrendState {
    let structure = market_structure(
        &swing_highs(candles, config.swing_window),
        &swing_lows(candles, config.swing_window),
    );

    let Some(latest) = snapshots.last() else {
        return TrendState {
            direction: TrendDirection::Neutral,
            strength: TrendStrength::Weak,
            structure,
        };
    };

    let use_ema = latest.ema.len() >= latest.sma.len() && !latest.ema.is_empty();
    let pick = |s: &IndicatorSnapshot, length: usize| {
        if use_ema {
            s.ema(length)
        } else {
            s.sma(length)
        }
    };
    let lengths = fast_slow(if use_ema { &latest.ema } else { &latest.sma });

    let mut votes = 0;
    let mut spread = None;
    if let Some((fast_len, slow_len)) = lengths {
        if let (Some(fast), Some(slow)) = (pick(latest, fast_len), pick(latest, slow_len)) {
            if fast_len != slow_len {
                votes += sign(fast, slow);
                if slow > 0.0 {
                    spread = Some((fast - slow).abs() / slow * 100.0);
                }
            }
            votes += sign(latest.close, fast);

            let back = snapshots.len().saturating_sub(config.trend_slope_lookback + 1);
            if let Some(earlier) = pick(&snapshots[back], slow_len) {
                votes += sign(slow, earlier);
            }
        }
    }
    if let Some(dm) = latest.directional {
        votes += sign(dm.plus_di, dm.minus_di);
    }

    let direction = if votes >= 2 {
        TrendDirection::Bullish
    } else if votes <= -2 {
        TrendDirection::Bearish
    } else {
        TrendDirection::Neutral
    };

    let strength = match (latest.directional, spread) {
        (Some(dm), _) if dm.adx >= 40.0 => TrendStrength::Strong,
        (Some(dm), _) if dm.adx >= 20.0 => TrendStrength::Moderate,
        (Some(_), _) => TrendStrength::Weak,
        (None, Some(s)) if s >= 1.5 => TrendStrength::Strong,
        (None, Some(s)) if s >= 0.5 => TrendStrength::Moderate,
        _ => TrendStrength::Weak,
    };

    TrendState {
        direction,
        strength,
        structure,
    }
}
