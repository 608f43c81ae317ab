// src/trading/signals.rs
use crate::analysis::{indicators, zones};
use crate::config::{EngineConfig, SignalConfig, SignalStrategy};
use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{
    AnalysisReport, CandleSeries, HigherTimeframeTrend, IndicatorSnapshot, OrderBlock,
    OrderBlockKind, Signal, SignalDirection, Timeframe, TrendDirection, TrendState, ZoneContext,
};
use crate::trading::risk;
use crate::trading::scoring::{self, ConfidenceScore};
use chrono::Duration;
use log::{debug, info};

/// Everything the decision engine reads for one evaluation
#[derive(Debug, Clone, Copy)]
pub struct SignalInput<'a> {
    pub symbol: &'a str,
    pub timeframe: Timeframe,
    pub snapshots: &'a [IndicatorSnapshot],
    pub trend: &'a TrendState,
    pub zone: &'a ZoneContext,
    pub higher: Option<&'a HigherTimeframeTrend>,
    pub quote_volume_24h: f64,
}

/// Turns the latest two snapshots plus context into a Signal.
/// Holds no state between calls.
#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: SignalConfig,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    /// BUY on a bearish-to-bullish overlay flip, SELL on the opposite flip
    pub fn detect_crossover(
        previous: &IndicatorSnapshot,
        current: &IndicatorSnapshot,
    ) -> SignalDirection {
        match (previous.overlay_direction(), current.overlay_direction()) {
            (Some(TrendDirection::Bearish), Some(TrendDirection::Bullish)) => SignalDirection::Buy,
            (Some(TrendDirection::Bullish), Some(TrendDirection::Bearish)) => SignalDirection::Sell,
            _ => SignalDirection::Hold,
        }
    }

    pub fn evaluate(&self, input: SignalInput<'_>) -> EngineResult<Signal> {
        let [.., previous, current] = input.snapshots else {
            return Err(EngineError::InsufficientData {
                required: 2,
                available: input.snapshots.len(),
            });
        };

        let hold = |confidence: f64, factors: Vec<String>| {
            Signal::hold(
                input.symbol,
                input.timeframe,
                current.timestamp,
                current.close,
                confidence,
                factors,
            )
        };

        if !(current.atr > 0.0) || !(input.zone.range_width() > 0.0) {
            return Ok(hold(
                0.0,
                vec![format!(
                    "degenerate market: ATR {:.6}, range width {:.6}",
                    current.atr,
                    input.zone.range_width()
                )],
            ));
        }

        let direction = Self::detect_crossover(previous, current);
        let Some(expected) = scoring::expected_trend(direction) else {
            return Ok(hold(0.0, vec!["no trend overlay flip".to_string()]));
        };

        if let Some(higher) = input.higher {
            if higher.overlay_direction != expected {
                info!(
                    "{}: {} crossover ignored, {} trend is {}",
                    input.symbol, direction, higher.timeframe, higher.overlay_direction
                );
                return Ok(hold(
                    0.0,
                    vec![format!(
                        "{} {} conflicts with {} trend overlay {}",
                        input.timeframe, direction, higher.timeframe, higher.overlay_direction
                    )],
                ));
            }
        }

        let block = match self.config.strategy {
            SignalStrategy::SuperTrend => None,
            SignalStrategy::OrderBlock => {
                let Some(block) = aligned_block(&input.zone.order_blocks, direction) else {
                    return Ok(hold(
                        0.0,
                        vec![format!("no order block aligned with {}", direction)],
                    ));
                };
                if self.config.require_manipulation_phase && !input.zone.manipulation_phase {
                    return Ok(hold(
                        0.0,
                        vec!["range not resolved: no manipulation phase detected".to_string()],
                    ));
                }
                Some(block)
            }
        };

        let mut score = ConfidenceScore::default();
        score.add(scoring::timeframe_alignment(input.higher, direction));
        score.add(scoring::primary_trend(input.trend, direction));
        score.add(scoring::momentum(current.rsi, direction));
        score.add(scoring::volatility_expansion(current.atr, previous.atr));
        score.add(scoring::zone(
            input.zone,
            input.trend,
            current.volume_trend,
            direction,
        ));
        score.add(scoring::liquidity(
            input.quote_volume_24h,
            self.config.min_quote_volume_24h,
        ));

        let confidence = score.total();
        let mut factors = vec![format!("trend overlay flipped {}", expected)];
        factors.extend(score.descriptions());

        if confidence < self.config.min_confidence {
            debug!(
                "{}: {} scored {:.2}, below {:.2}",
                input.symbol, direction, confidence, self.config.min_confidence
            );
            factors.push(format!(
                "confidence {:.2} below threshold {:.2}",
                confidence, self.config.min_confidence
            ));
            return Ok(hold(confidence, factors));
        }

        let levels = match block {
            Some(block) => {
                factors.push(format!(
                    "order block {:.4}-{:.4} ({:.2})",
                    block.price_low, block.price_high, block.confidence
                ));
                risk::order_block_levels(
                    direction,
                    current.close,
                    block,
                    current.atr,
                    input.zone,
                    &self.config,
                )
            }
            None => {
                let overlay = current.trend_overlay.map_or(f64::NAN, |o| o.value);
                risk::overlay_levels(direction, current.close, overlay, input.zone, &self.config)
            }
        };
        let levels = match levels {
            Ok(levels) => levels,
            Err(e) => {
                factors.push(format!("{} ({})", e, e.code()));
                return Ok(hold(confidence, factors));
            }
        };

        let signal = Signal::directional(
            input.symbol,
            input.timeframe,
            direction,
            current.timestamp,
            current.close,
            levels,
            confidence,
            factors,
        )?;

        info!(
            "{}: {} @ {:.4}, SL {:.4}, TP {:?}, confidence {:.2}",
            signal.symbol,
            signal.direction,
            signal.entry_price,
            signal.stop_loss().unwrap_or_default(),
            signal.take_profit(),
            signal.confidence
        );

        Ok(signal)
    }
}

fn aligned_block(blocks: &[OrderBlock], direction: SignalDirection) -> Option<&OrderBlock> {
    let kind = match direction {
        SignalDirection::Buy => OrderBlockKind::Bullish,
        SignalDirection::Sell => OrderBlockKind::Bearish,
        SignalDirection::Hold => return None,
    };
    // blocks arrive best first
    blocks.iter().find(|b| b.kind == kind)
}

/// Candle series in, AnalysisReport out.
#[derive(Debug, Clone)]
pub struct SignalPipeline {
    config: EngineConfig,
    engine: SignalEngine,
}

impl SignalPipeline {
    /// Validates the configuration once; analysis never starts on a bad one.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let engine = SignalEngine::new(config.signal.clone());
        Ok(Self { config, engine })
    }

    /// Trend read of a confirmation timeframe
    pub fn higher_timeframe_trend(&self, series: &CandleSeries) -> EngineResult<HigherTimeframeTrend> {
        let snapshots = indicators::compute(series, &self.config.indicators)?;
        let (trend, _) = zones::analyze(series, &snapshots, &self.config.structure)?;
        let overlay_direction = snapshots
            .last()
            .and_then(IndicatorSnapshot::overlay_direction)
            .unwrap_or(TrendDirection::Neutral);

        Ok(HigherTimeframeTrend {
            timeframe: series.timeframe(),
            overlay_direction,
            trend,
        })
    }

    pub fn run(
        &self,
        primary: &CandleSeries,
        higher: Option<&CandleSeries>,
    ) -> EngineResult<AnalysisReport> {
        let snapshots = indicators::compute(primary, &self.config.indicators)?;
        let (trend, zone) = zones::analyze(primary, &snapshots, &self.config.structure)?;
        let higher_timeframe = higher
            .map(|series| self.higher_timeframe_trend(series))
            .transpose()?;

        let signal = self.engine.evaluate(SignalInput {
            symbol: primary.symbol(),
            timeframe: primary.timeframe(),
            snapshots: &snapshots,
            trend: &trend,
            zone: &zone,
            higher: higher_timeframe.as_ref(),
            quote_volume_24h: primary.quote_volume_within(Duration::hours(24)),
        })?;

        let latest = snapshots
            .last()
            .cloned()
            .ok_or(EngineError::InsufficientData {
                required: 1,
                available: 0,
            })?;

        Ok(AnalysisReport {
            symbol: primary.symbol().to_string(),
            latest,
            trend,
            zone,
            higher_timeframe,
            signal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::zones::fibonacci_levels;
    use crate::domain::models::{MarketStructure, PriceZone, TrendOverlay, TrendStrength};
    use chrono::{TimeZone, Utc};

    fn snapshot(hour: i64, close: f64, atr: f64, direction: TrendDirection, band: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            timestamp: Utc.timestamp_opt(1_700_000_000 + hour * 3600, 0).unwrap(),
            close,
            atr,
            trend_overlay: Some(TrendOverlay {
                value: band,
                upper_band: band.max(close + 1.0),
                lower_band: band.min(close - 1.0),
                direction,
            }),
            pivot_high: None,
            pivot_low: None,
            rsi: Some(55.0),
            sma: vec![],
            ema: vec![],
            bollinger: None,
            volume_trend: Some(10.0),
            directional: None,
        }
    }

    fn buy_flip() -> Vec<IndicatorSnapshot> {
        vec![
            snapshot(0, 99.0, 1.0, TrendDirection::Bearish, 101.0),
            snapshot(1, 102.0, 1.2, TrendDirection::Bullish, 99.0),
        ]
    }

    fn bullish_trend() -> TrendState {
        TrendState {
            direction: TrendDirection::Bullish,
            strength: TrendStrength::Strong,
            structure: MarketStructure::Uptrend,
        }
    }

    fn zone_context(high: f64, low: f64) -> ZoneContext {
        ZoneContext {
            range_high: high,
            range_low: low,
            equilibrium: (high + low) / 2.0,
            position: 0.5,
            zone: PriceZone::Equilibrium,
            fibonacci_levels: fibonacci_levels(high, low),
            support: None,
            resistance: None,
            order_blocks: vec![],
            manipulation_phase: false,
        }
    }

    fn input<'a>(
        snapshots: &'a [IndicatorSnapshot],
        trend: &'a TrendState,
        zone: &'a ZoneContext,
        higher: Option<&'a HigherTimeframeTrend>,
    ) -> SignalInput<'a> {
        SignalInput {
            symbol: "BTCUSDT",
            timeframe: Timeframe::Hours1,
            snapshots,
            trend,
            zone,
            higher,
            quote_volume_24h: 5_000_000.0,
        }
    }

    #[test]
    fn test_detect_crossover() {
        let snaps = buy_flip();
        assert_eq!(SignalEngine::detect_crossover(&snaps[0], &snaps[1]), SignalDirection::Buy);
        assert_eq!(SignalEngine::detect_crossover(&snaps[1], &snaps[0]), SignalDirection::Sell);
        assert_eq!(SignalEngine::detect_crossover(&snaps[1], &snaps[1]), SignalDirection::Hold);
    }

    #[test]
    fn test_buy_on_flip_with_confirmation() {
        let snaps = buy_flip();
        let trend = bullish_trend();
        let zone = zone_context(130.0, 70.0);
        let higher = HigherTimeframeTrend {
            timeframe: Timeframe::Hours4,
            overlay_direction: TrendDirection::Bullish,
            trend,
        };
        let engine = SignalEngine::new(SignalConfig::default());
        let signal = engine.evaluate(input(&snaps, &trend, &zone, Some(&higher))).unwrap();

        assert_eq!(signal.direction, SignalDirection::Buy);
        assert_eq!(signal.stop_loss(), Some(99.0));
        // 0.5 + 0.15 alignment + 0.1 strong trend + 0.1 ATR + 0.08 zone + 0.05 liquidity
        assert!((signal.confidence - 0.98).abs() < 1e-9);
        assert!(signal.take_profit()[0] > signal.entry_price);
        assert_eq!(signal.timestamp, snaps[1].timestamp);
    }

    #[test]
    fn test_higher_timeframe_conflict_holds() {
        let snaps = buy_flip();
        let trend = bullish_trend();
        let zone = zone_context(130.0, 70.0);
        let higher = HigherTimeframeTrend {
            timeframe: Timeframe::Hours4,
            overlay_direction: TrendDirection::Bearish,
            trend,
        };
        let engine = SignalEngine::new(SignalConfig::default());
        let signal = engine.evaluate(input(&snaps, &trend, &zone, Some(&higher))).unwrap();
        assert_eq!(signal.direction, SignalDirection::Hold);
        assert!(signal.levels.is_none());
        assert!(signal.supporting_factors[0].contains("conflicts"));
    }

    #[test]
    fn test_threshold_is_a_hard_cutoff() {
        let snaps = buy_flip();
        let trend = TrendState {
            direction: TrendDirection::Neutral,
            strength: TrendStrength::Weak,
            structure: MarketStructure::Sideways,
        };
        let zone = zone_context(130.0, 70.0);
        let engine = SignalEngine::new(SignalConfig::default());
        let signal = engine.evaluate(input(&snaps, &trend, &zone, None)).unwrap();
        // 0.5 + 0.1 ATR + 0.03 golden band + 0.05 liquidity
        assert_eq!(signal.direction, SignalDirection::Hold);
        assert!((signal.confidence - 0.68).abs() < 1e-9);
        assert!(signal.supporting_factors.last().unwrap().contains("below threshold"));
    }

    #[test]
    fn test_degenerate_market_holds() {
        let mut snaps = buy_flip();
        snaps[1].atr = 0.0;
        let trend = bullish_trend();
        let zone = zone_context(130.0, 70.0);
        let engine = SignalEngine::new(SignalConfig::default());
        let signal = engine.evaluate(input(&snaps, &trend, &zone, None)).unwrap();
        assert_eq!(signal.direction, SignalDirection::Hold);

        let snaps = buy_flip();
        let flat = zone_context(100.0, 100.0);
        let signal = engine.evaluate(input(&snaps, &trend, &flat, None)).unwrap();
        assert_eq!(signal.direction, SignalDirection::Hold);
    }

    #[test]
    fn test_needs_two_snapshots() {
        let snaps = buy_flip();
        let trend = bullish_trend();
        let zone = zone_context(130.0, 70.0);
        let engine = SignalEngine::new(SignalConfig::default());
        let err = engine.evaluate(input(&snaps[..1], &trend, &zone, None)).unwrap_err();
        assert_eq!(err.code(), "insufficient_data");
    }

    #[test]
    fn test_order_block_strategy_gating() {
        let snaps = buy_flip();
        let trend = bullish_trend();
        let mut zone = zone_context(130.0, 70.0);
        let config = SignalConfig {
            strategy: SignalStrategy::OrderBlock,
            ..SignalConfig::default()
        };
        let engine = SignalEngine::new(config);

        let signal = engine.evaluate(input(&snaps, &trend, &zone, None)).unwrap();
        assert_eq!(signal.direction, SignalDirection::Hold);
        assert!(signal.supporting_factors[0].contains("no order block"));

        zone.order_blocks.push(OrderBlock {
            kind: OrderBlockKind::Bullish,
            price_high: 100.5,
            price_low: 98.5,
            origin_timestamp: snaps[0].timestamp,
            confidence: 0.9,
            volume_ratio: 2.6,
            body_ratio: 0.9,
        });
        let signal = engine.evaluate(input(&snaps, &trend, &zone, None)).unwrap();
        assert_eq!(signal.direction, SignalDirection::Hold);
        assert!(signal.supporting_factors[0].contains("manipulation"));

        zone.manipulation_phase = true;
        let signal = engine.evaluate(input(&snaps, &trend, &zone, None)).unwrap();
        assert_eq!(signal.direction, SignalDirection::Buy);
        // block low 98.5 - 1.5 * ATR 1.2
        assert!((signal.stop_loss().unwrap() - 96.7).abs() < 1e-9);
    }

    #[test]
    fn test_pipeline_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.indicators.rsi_period = 0;
        let err = SignalPipeline::new(config).unwrap_err();
        assert_eq!(err.code(), "configuration_error");
    }
}
