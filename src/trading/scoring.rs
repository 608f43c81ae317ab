// src/trading/scoring.rs
use crate::domain::models::{
    HigherTimeframeTrend, MarketStructure, PriceZone, SignalDirection, TrendDirection, TrendState,
    TrendStrength, ZoneContext,
};

/// Neutral starting point of every evaluation
pub const BASE_CONFIDENCE: f64 = 0.5;

/// One named contribution to the confidence score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreFactor {
    pub name: &'static str,
    pub weight: f64,
    pub detail: String,
}

impl ScoreFactor {
    fn new(name: &'static str, weight: f64, detail: String) -> Self {
        Self {
            name,
            weight,
            detail,
        }
    }

    pub fn describe(&self) -> String {
        format!("{} (+{:.2})", self.detail, self.weight)
    }
}

/// Weighted-factor accumulator
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceScore {
    base: f64,
    factors: Vec<ScoreFactor>,
}

impl Default for ConfidenceScore {
    fn default() -> Self {
        Self::new(BASE_CONFIDENCE)
    }
}

impl ConfidenceScore {
    pub fn new(base: f64) -> Self {
        Self {
            base,
            factors: Vec::new(),
        }
    }

    pub fn add(&mut self, factor: Option<ScoreFactor>) {
        if let Some(factor) = factor {
            self.factors.push(factor);
        }
    }

    pub fn factors(&self) -> &[ScoreFactor] {
        &self.factors
    }

    /// Sum of base and contributions, clamped to [0, 1]
    pub fn total(&self) -> f64 {
        (self.base + self.factors.iter().map(|f| f.weight).sum::<f64>()).clamp(0.0, 1.0)
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.factors.iter().map(ScoreFactor::describe).collect()
    }
}

/// Trend direction a BUY or SELL needs; `None` for HOLD
pub fn expected_trend(direction: SignalDirection) -> Option<TrendDirection> {
    match direction {
        SignalDirection::Buy => Some(TrendDirection::Bullish),
        SignalDirection::Sell => Some(TrendDirection::Bearish),
        SignalDirection::Hold => None,
    }
}

pub fn timeframe_alignment(
    higher: Option<&HigherTimeframeTrend>,
    direction: SignalDirection,
) -> Option<ScoreFactor> {
    let higher = higher?;
    (Some(higher.overlay_direction) == expected_trend(direction)).then(|| {
        ScoreFactor::new(
            "timeframe_alignment",
            0.15,
            format!("{} trend overlay agrees ({})", higher.timeframe, higher.overlay_direction),
        )
    })
}

pub fn primary_trend(trend: &TrendState, direction: SignalDirection) -> Option<ScoreFactor> {
    if Some(trend.direction) != expected_trend(direction) {
        return None;
    }
    let weight = if trend.strength == TrendStrength::Strong {
        0.1
    } else {
        0.05
    };
    Some(ScoreFactor::new(
        "primary_trend",
        weight,
        format!("{:?} {} trend on primary timeframe", trend.strength, trend.direction),
    ))
}

/// Oscillator on the favourable side of its midline, with an extra step at the extreme
pub fn momentum(rsi: Option<f64>, direction: SignalDirection) -> Option<ScoreFactor> {
    let rsi = rsi?;
    let (favourable, extreme, label) = match direction {
        SignalDirection::Buy => (rsi < 50.0, rsi <= 30.0, "oversold"),
        SignalDirection::Sell => (rsi > 50.0, rsi >= 70.0, "overbought"),
        SignalDirection::Hold => return None,
    };
    if !favourable {
        return None;
    }
    if extreme {
        Some(ScoreFactor::new("momentum", 0.1, format!("RSI {:.1} {}", rsi, label)))
    } else {
        Some(ScoreFactor::new(
            "momentum",
            0.05,
            format!("RSI {:.1} has room to run", rsi),
        ))
    }
}

pub fn volatility_expansion(current_atr: f64, previous_atr: f64) -> Option<ScoreFactor> {
    (current_atr > previous_atr).then(|| {
        ScoreFactor::new(
            "volatility_expansion",
            0.1,
            format!("ATR expanding ({:.4} > {:.4})", current_atr, previous_atr),
        )
    })
}

fn structure_agrees(structure: MarketStructure, direction: SignalDirection) -> bool {
    matches!(
        (structure, direction),
        (MarketStructure::Uptrend, SignalDirection::Buy)
            | (MarketStructure::Downtrend, SignalDirection::Sell)
    )
}

/// Discount for buys, premium for sells, the golden band, and structure
/// confirmed by a manipulation phase or rising volume.
pub fn zone(
    zone: &ZoneContext,
    trend: &TrendState,
    volume_trend: Option<f64>,
    direction: SignalDirection,
) -> Option<ScoreFactor> {
    let favourable = match direction {
        SignalDirection::Buy => zone.zone.is_discount(),
        SignalDirection::Sell => zone.zone.is_premium(),
        SignalDirection::Hold => return None,
    };
    let golden = zone.zone == PriceZone::Equilibrium;
    let confirmed = structure_agrees(trend.structure, direction)
        && (zone.manipulation_phase || volume_trend.map_or(false, |v| v > 0.0));

    let mut weight = 0.0;
    let mut notes = Vec::new();
    if favourable {
        weight += 0.05;
        notes.push(format!("price in {} zone", zone.zone));
    }
    if golden {
        weight += 0.03;
        notes.push("price in the 38.2-61.8% band".to_string());
    }
    if confirmed {
        weight += if favourable { 0.07 } else { 0.05 };
        notes.push(format!("{:?} structure confirmed", trend.structure));
    }

    (weight > 0.0).then(|| ScoreFactor::new("zone", weight, notes.join(", ")))
}

pub fn liquidity(quote_volume_24h: f64, floor: f64) -> Option<ScoreFactor> {
    (quote_volume_24h >= floor).then(|| {
        ScoreFactor::new(
            "liquidity",
            0.05,
            format!("24h quote volume {:.0}", quote_volume_24h),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{FibonacciLevel, Timeframe};

    fn trend(direction: TrendDirection, strength: TrendStrength, structure: MarketStructure) -> TrendState {
        TrendState {
            direction,
            strength,
            structure,
        }
    }

    fn zone_context(zone: PriceZone, manipulation_phase: bool) -> ZoneContext {
        ZoneContext {
            range_high: 110.0,
            range_low: 90.0,
            equilibrium: 100.0,
            position: 0.3,
            zone,
            fibonacci_levels: vec![FibonacciLevel {
                ratio: 0.5,
                price: 100.0,
            }],
            support: None,
            resistance: None,
            order_blocks: vec![],
            manipulation_phase,
        }
    }

    #[test]
    fn test_score_is_clamped() {
        let mut score = ConfidenceScore::new(0.9);
        score.add(Some(ScoreFactor::new("a", 0.2, "a".into())));
        score.add(None);
        assert_eq!(score.total(), 1.0);
        assert_eq!(score.factors().len(), 1);
        assert_eq!(score.descriptions(), vec!["a (+0.20)".to_string()]);
    }

    #[test]
    fn test_timeframe_alignment() {
        let higher = HigherTimeframeTrend {
            timeframe: Timeframe::Hours4,
            overlay_direction: TrendDirection::Bullish,
            trend: trend(TrendDirection::Bullish, TrendStrength::Weak, MarketStructure::Sideways),
        };
        assert_eq!(
            timeframe_alignment(Some(&higher), SignalDirection::Buy).map(|f| f.weight),
            Some(0.15)
        );
        assert!(timeframe_alignment(Some(&higher), SignalDirection::Sell).is_none());
        assert!(timeframe_alignment(None, SignalDirection::Buy).is_none());
    }

    #[test]
    fn test_primary_trend_weights_strength() {
        let strong = trend(TrendDirection::Bearish, TrendStrength::Strong, MarketStructure::Sideways);
        let weak = trend(TrendDirection::Bearish, TrendStrength::Weak, MarketStructure::Sideways);
        assert_eq!(primary_trend(&strong, SignalDirection::Sell).unwrap().weight, 0.1);
        assert_eq!(primary_trend(&weak, SignalDirection::Sell).unwrap().weight, 0.05);
        assert!(primary_trend(&strong, SignalDirection::Buy).is_none());
    }

    #[test]
    fn test_momentum_midline_and_extremes() {
        assert_eq!(momentum(Some(45.0), SignalDirection::Buy).unwrap().weight, 0.05);
        assert_eq!(momentum(Some(25.0), SignalDirection::Buy).unwrap().weight, 0.1);
        assert!(momentum(Some(60.0), SignalDirection::Buy).is_none());
        assert_eq!(momentum(Some(75.0), SignalDirection::Sell).unwrap().weight, 0.1);
        assert!(momentum(Some(50.0), SignalDirection::Sell).is_none());
        assert!(momentum(None, SignalDirection::Buy).is_none());
    }

    #[test]
    fn test_volatility_expansion() {
        assert!(volatility_expansion(1.2, 1.0).is_some());
        assert!(volatility_expansion(1.0, 1.0).is_none());
    }

    #[test]
    fn test_zone_contributions() {
        let up = trend(TrendDirection::Bullish, TrendStrength::Strong, MarketStructure::Uptrend);

        let discount = zone_context(PriceZone::Discount, true);
        let factor = zone(&discount, &up, None, SignalDirection::Buy).unwrap();
        assert!((factor.weight - 0.12).abs() < 1e-12);

        let golden = zone_context(PriceZone::Equilibrium, false);
        let factor = zone(&golden, &up, Some(10.0), SignalDirection::Buy).unwrap();
        assert!((factor.weight - 0.08).abs() < 1e-12);

        let premium = zone_context(PriceZone::Premium, false);
        assert!(zone(&premium, &up, Some(-5.0), SignalDirection::Buy).is_none());
    }

    #[test]
    fn test_liquidity_floor() {
        assert!(liquidity(2_000_000.0, 1_000_000.0).is_some());
        assert!(liquidity(999.0, 1_000_000.0).is_none());
    }
}
