// src/analysis/zones.rs
use crate::analysis::structure::{self, swing_highs, swing_lows};
use crate::config::StructureConfig;
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    Candle, CandleSeries, FibonacciLevel, IndicatorSnapshot, MarketStructure, OrderBlock,
    OrderBlockKind, PriceZone, TrendDirection, TrendState, TrendStrength, ZoneContext,
};
use log::debug;
use std::cmp::Ordering;

pub const FIBONACCI_RATIOS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

const MAX_ORDER_BLOCKS: usize = 3;
const STRONG_BLOCK_CONFIDENCE: f64 = 0.7;

/// Classify a 0..1 range position
pub fn classify_position(position: f64) -> PriceZone {
    if position < 0.236 {
        PriceZone::DeepDiscount
    } else if position < 0.382 {
        PriceZone::Discount
    } else if position <= 0.618 {
        PriceZone::Equilibrium
    } else if position <= 0.764 {
        PriceZone::Premium
    } else {
        PriceZone::DeepPremium
    }
}

/// Retracement levels measured down from the range high
pub fn fibonacci_levels(high: f64, low: f64) -> Vec<FibonacciLevel> {
    let range = high - low;
    FIBONACCI_RATIOS
        .iter()
        .map(|&ratio| FibonacciLevel {
            ratio,
            price: high - ratio * range,
        })
        .collect()
}

/// Nearest pivot (or swing, when pivots are disabled) on each side of `price`.
pub fn support_resistance(
    candles: &[Candle],
    snapshots: &[IndicatorSnapshot],
    price: f64,
    config: &StructureConfig,
) -> (Option<f64>, Option<f64>) {
    let recent = &snapshots[snapshots.len().saturating_sub(config.sr_lookback)..];

    let (highs, lows): (Vec<f64>, Vec<f64>) = if recent.iter().any(|s| s.pivot_high.is_some()) {
        (
            recent.iter().filter_map(|s| s.pivot_high).collect(),
            recent.iter().filter_map(|s| s.pivot_low).collect(),
        )
    } else {
        let window = &candles[candles.len().saturating_sub(config.sr_lookback)..];
        (
            swing_highs(window, config.swing_window)
                .iter()
                .map(|s| s.price)
                .collect(),
            swing_lows(window, config.swing_window)
                .iter()
                .map(|s| s.price)
                .collect(),
        )
    };

    let resistance = highs
        .into_iter()
        .filter(|&h| h > price)
        .fold(None, |best: Option<f64>, h| Some(best.map_or(h, |b| b.min(h))));
    let support = lows
        .into_iter()
        .filter(|&l| l < price)
        .fold(None, |best: Option<f64>, l| Some(best.map_or(l, |b| b.max(l))));

    (support, resistance)
}

fn strength_weight(strength: TrendStrength) -> f64 {
    match strength {
        TrendStrength::Strong => 1.0,
        TrendStrength::Moderate => 0.7,
        TrendStrength::Weak => 0.4,
    }
}

/// Strong-bodied, high-volume candles in the trend direction that were
/// followed by a move of at least `order_block_min_extension` past their extreme.
/// Returns at most three, best first.
pub fn order_blocks(
    candles: &[Candle],
    latest: &IndicatorSnapshot,
    trend: &TrendState,
    config: &StructureConfig,
) -> Vec<OrderBlock> {
    let kind = match trend.direction {
        TrendDirection::Bullish => OrderBlockKind::Bullish,
        TrendDirection::Bearish => OrderBlockKind::Bearish,
        TrendDirection::Neutral => return Vec::new(),
    };

    let n = candles.len();
    let start = n.saturating_sub(config.order_block_lookback).max(1);
    let mut blocks = Vec::new();

    for i in start..n.saturating_sub(1) {
        let candle = &candles[i];
        let range = candle.range();
        if range <= 0.0 {
            continue;
        }
        let aligned = match kind {
            OrderBlockKind::Bullish => candle.is_bullish(),
            OrderBlockKind::Bearish => candle.is_bearish(),
        };
        if !aligned {
            continue;
        }

        let body_ratio = candle.body() / range;
        if body_ratio < config.order_block_min_body_ratio {
            continue;
        }

        let history = &candles[i.saturating_sub(config.volume_average_window)..i];
        let avg_volume = history.iter().map(|c| c.volume()).sum::<f64>() / history.len() as f64;
        if avg_volume <= 0.0 {
            continue;
        }
        let volume_ratio = candle.volume() / avg_volume;
        if volume_ratio < config.order_block_min_volume_ratio {
            continue;
        }

        let future = &candles[i + 1..(i + 1 + config.order_block_extension_window).min(n)];
        let extended = match kind {
            OrderBlockKind::Bullish => {
                let target = candle.high() * (1.0 + config.order_block_min_extension);
                future.iter().any(|c| c.high() >= target)
            }
            OrderBlockKind::Bearish => {
                let target = candle.low() * (1.0 - config.order_block_min_extension);
                future.iter().any(|c| c.low() <= target)
            }
        };
        if !extended {
            continue;
        }

        let mut confidence = if volume_ratio >= 2.5 {
            0.35
        } else if volume_ratio >= 2.0 {
            0.28
        } else {
            0.2
        };
        confidence += 0.25 * body_ratio;
        confidence += 0.2 * strength_weight(trend.strength);
        if let Some(rsi) = latest.rsi {
            let not_exhausted = match kind {
                OrderBlockKind::Bullish => rsi < 70.0,
                OrderBlockKind::Bearish => rsi > 30.0,
            };
            if not_exhausted {
                confidence += 0.1;
            }
        }
        if latest.volume_trend.map_or(false, |v| v > 0.0) {
            confidence += 0.1;
        }

        blocks.push(OrderBlock {
            kind,
            price_high: candle.high(),
            price_low: candle.low(),
            origin_timestamp: candle.timestamp(),
            confidence: confidence.clamp(0.0, 1.0),
            volume_ratio,
            body_ratio,
        });
    }

    blocks.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then(b.origin_timestamp.cmp(&a.origin_timestamp))
    });
    blocks.truncate(MAX_ORDER_BLOCKS);
    blocks
}

/// Range-bound touch-and-reject behaviour: both edges of the recent range
/// touched twice, confirmed by volume spikes or by an aligned strong trend
/// with a high-confidence order block.
pub fn manipulation_phase(
    candles: &[Candle],
    atr: f64,
    trend: &TrendState,
    best_block_confidence: f64,
    config: &StructureConfig,
) -> bool {
    let window = &candles[candles.len().saturating_sub(config.manipulation_lookback)..];
    if window.len() < 2 {
        return false;
    }

    let high = window.iter().map(|c| c.high()).fold(f64::MIN, f64::max);
    let low = window.iter().map(|c| c.low()).fold(f64::MAX, f64::min);
    if high - low <= 0.0 {
        return false;
    }

    let tolerance = config.manipulation_tolerance * atr.max(0.0);
    let touches_high = window.iter().filter(|c| c.high() >= high - tolerance).count();
    let touches_low = window.iter().filter(|c| c.low() <= low + tolerance).count();
    if touches_high < 2 || touches_low < 2 {
        return false;
    }

    let avg_volume = window.iter().map(|c| c.volume()).sum::<f64>() / window.len() as f64;
    let spikes = if avg_volume > 0.0 {
        window
            .iter()
            .filter(|c| c.volume() > config.volume_spike_ratio * avg_volume)
            .count()
    } else {
        0
    };

    let structural = trend.strength == TrendStrength::Strong
        && matches!(
            (trend.direction, trend.structure),
            (TrendDirection::Bullish, MarketStructure::Uptrend)
                | (TrendDirection::Bearish, MarketStructure::Downtrend)
        )
        && best_block_confidence >= STRONG_BLOCK_CONFIDENCE;

    spikes >= 2 || structural
}

/// Trend and zone context for the latest candle of `series`.
pub fn analyze(
    series: &CandleSeries,
    snapshots: &[IndicatorSnapshot],
    config: &StructureConfig,
) -> EngineResult<(TrendState, ZoneContext)> {
    let candles = series.candles();
    let (Some(last), Some(latest)) = (candles.last(), snapshots.last()) else {
        return Err(EngineError::InsufficientData {
            required: 1,
            available: 0,
        });
    };
    if snapshots.len() != candles.len() {
        return Err(EngineError::InsufficientData {
            required: candles.len(),
            available: snapshots.len(),
        });
    }

    let trend = structure::trend_state(candles, snapshots, config);

    let recent = &candles[candles.len().saturating_sub(config.zone_lookback)..];
    let range_high = recent.iter().map(|c| c.high()).fold(f64::MIN, f64::max);
    let range_low = recent.iter().map(|c| c.low()).fold(f64::MAX, f64::min);
    let range = range_high - range_low;
    let close = last.close();

    let position = if range > 0.0 {
        ((close - range_low) / range).clamp(0.0, 1.0)
    } else {
        0.5
    };
    let zone = if range > 0.0 {
        classify_position(position)
    } else {
        PriceZone::Equilibrium
    };

    let (support, resistance) = support_resistance(candles, snapshots, close, config);
    let blocks = order_blocks(candles, latest, &trend, config);
    let best = blocks.first().map_or(0.0, |b| b.confidence);
    let manipulation = manipulation_phase(candles, latest.atr, &trend, best, config);

    debug!(
        "{}: trend {:?}/{:?}/{:?}, zone {} ({:.3}), {} order blocks, manipulation {}",
        series.symbol(),
        trend.direction,
        trend.strength,
        trend.structure,
        zone,
        position,
        blocks.len(),
        manipulation
    );

    Ok((
        trend,
        ZoneContext {
            range_high,
            range_low,
            equilibrium: (range_high + range_low) / 2.0,
            position,
            zone,
            fibonacci_levels: fibonacci_levels(range_high, range_low),
            support,
            resistance,
            order_blocks: blocks,
            manipulation_phase: manipulation,
        },
    ))
}
