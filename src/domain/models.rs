// src/domain/models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::{EngineError, EngineResult};

/// Candle interval supported by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Minutes1,
    #[serde(rename = "5m")]
    Minutes5,
    #[serde(rename = "15m")]
    Minutes15,
    #[serde(rename = "30m")]
    Minutes30,
    #[serde(rename = "1h")]
    Hours1,
    #[serde(rename = "4h")]
    Hours4,
    #[serde(rename = "1d")]
    Days1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minutes1 => "1m",
            Timeframe::Minutes5 => "5m",
            Timeframe::Minutes15 => "15m",
            Timeframe::Minutes30 => "30m",
            Timeframe::Hours1 => "1h",
            Timeframe::Hours4 => "4h",
            Timeframe::Days1 => "1d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::Minutes1 => Duration::minutes(1),
            Timeframe::Minutes5 => Duration::minutes(5),
            Timeframe::Minutes15 => Duration::minutes(15),
            Timeframe::Minutes30 => Duration::minutes(30),
            Timeframe::Hours1 => Duration::hours(1),
            Timeframe::Hours4 => Duration::hours(4),
            Timeframe::Days1 => Duration::days(1),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Timeframe::Minutes1),
            "5m" => Ok(Timeframe::Minutes5),
            "15m" => Ok(Timeframe::Minutes15),
            "30m" => Ok(Timeframe::Minutes30),
            "1h" => Ok(Timeframe::Hours1),
            "4h" => Ok(Timeframe::Hours4),
            "1d" => Ok(Timeframe::Days1),
            other => Err(format!("unsupported timeframe '{}'", other)),
        }
    }
}

/// One OHLCV observation. Only constructible through [`Candle::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candle {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> EngineResult<Self> {
        for (name, value) in [("open", open), ("high", high), ("low", low), ("close", close)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::InvalidCandle(format!(
                    "{} must be a positive finite price, got {} at {}",
                    name, value, timestamp
                )));
            }
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(EngineError::InvalidCandle(format!(
                "volume must be >= 0, got {} at {}",
                volume, timestamp
            )));
        }
        if high < open.max(close).max(low) {
            return Err(EngineError::InvalidCandle(format!(
                "high ({}) below open/close/low at {}",
                high, timestamp
            )));
        }
        if low > open.min(close).min(high) {
            return Err(EngineError::InvalidCandle(format!(
                "low ({}) above open/close/high at {}",
                low, timestamp
            )));
        }

        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Timestamp-ascending candles for one (symbol, timeframe) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleSeries {
    symbol: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(symbol: &str, timeframe: Timeframe, candles: Vec<Candle>) -> EngineResult<Self> {
        for (i, pair) in candles.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(EngineError::InvalidCandle(format!(
                    "{} {}: candle {} at {} is not after {}",
                    symbol,
                    timeframe,
                    i + 1,
                    pair[1].timestamp,
                    pair[0].timestamp
                )));
            }
        }

        Ok(Self {
            symbol: symbol.to_string(),
            timeframe,
            candles,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn close_prices(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn high_prices(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn low_prices(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn volume(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    /// Quote volume (close x volume) traded in the window ending at the last
    /// candle's close time.
    pub fn quote_volume_within(&self, window: Duration) -> f64 {
        let Some(last) = self.candles.last() else {
            return 0.0;
        };
        let cutoff = last.timestamp + self.timeframe.duration() - window;
        self.candles
            .iter()
            .rev()
            .take_while(|c| c.timestamp >= cutoff)
            .map(|c| c.close * c.volume)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrendDirection::Bullish => write!(f, "BULLISH"),
            TrendDirection::Bearish => write!(f, "BEARISH"),
            TrendDirection::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// SuperTrend-style trailing line
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendOverlay {
    /// Active trailing band: lower band while bullish, upper band while bearish
    pub value: f64,
    pub upper_band: f64,
    pub lower_band: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MovingAverageValue {
    pub length: usize,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerValue {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// (upper - lower) / middle
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionalMovement {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// Derived values for one candle. `None` means the indicator is disabled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub atr: f64,
    pub trend_overlay: Option<TrendOverlay>,
    pub pivot_high: Option<f64>,
    pub pivot_low: Option<f64>,
    pub rsi: Option<f64>,
    pub sma: Vec<MovingAverageValue>,
    pub ema: Vec<MovingAverageValue>,
    pub bollinger: Option<BollingerValue>,
    /// Short-window vs long-window average volume, in percent
    pub volume_trend: Option<f64>,
    pub directional: Option<DirectionalMovement>,
}

impl IndicatorSnapshot {
    pub fn overlay_direction(&self) -> Option<TrendDirection> {
        self.trend_overlay.map(|o| o.direction)
    }

    pub fn ema(&self, length: usize) -> Option<f64> {
        self.ema.iter().find(|m| m.length == length).map(|m| m.value)
    }

    pub fn sma(&self, length: usize) -> Option<f64> {
        self.sma.iter().find(|m| m.length == length).map(|m| m.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendStrength {
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStructure {
    Uptrend,
    Downtrend,
    Sideways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendState {
    pub direction: TrendDirection,
    pub strength: TrendStrength,
    pub structure: MarketStructure,
}

/// Position of the close inside the recent trading range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceZone {
    DeepDiscount,
    Discount,
    Equilibrium,
    Premium,
    DeepPremium,
}

impl PriceZone {
    pub fn is_discount(&self) -> bool {
        matches!(self, PriceZone::DeepDiscount | PriceZone::Discount)
    }

    pub fn is_premium(&self) -> bool {
        matches!(self, PriceZone::Premium | PriceZone::DeepPremium)
    }
}

impl fmt::Display for PriceZone {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PriceZone::DeepDiscount => "deep_discount",
            PriceZone::Discount => "discount",
            PriceZone::Equilibrium => "equilibrium",
            PriceZone::Premium => "premium",
            PriceZone::DeepPremium => "deep_premium",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FibonacciLevel {
    pub ratio: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBlockKind {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBlock {
    pub kind: OrderBlockKind,
    pub price_high: f64,
    pub price_low: f64,
    pub origin_timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub volume_ratio: f64,
    pub body_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneContext {
    pub range_high: f64,
    pub range_low: f64,
    pub equilibrium: f64,
    /// Fraction of the range below the close, 0.5 when the range is empty
    pub position: f64,
    pub zone: PriceZone,
    pub fibonacci_levels: Vec<FibonacciLevel>,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub order_blocks: Vec<OrderBlock>,
    pub manipulation_phase: bool,
}

impl ZoneContext {
    pub fn range_width(&self) -> f64 {
        self.range_high - self.range_low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalDirection {
    Buy,
    Sell,
    Hold,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Buy => "BUY",
            SignalDirection::Sell => "SELL",
            SignalDirection::Hold => "HOLD",
        }
    }
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskLevels {
    pub stop_loss: f64,
    /// One or two targets, ordered away from the entry
    pub take_profit: Vec<f64>,
}

/// Final output of one analysis call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub direction: SignalDirection,
    pub timestamp: DateTime<Utc>,
    pub entry_price: f64,
    /// Present iff `direction != Hold`
    pub levels: Option<RiskLevels>,
    pub confidence: f64,
    pub supporting_factors: Vec<String>,
    pub narrative: Option<String>,
}

impl Signal {
    pub fn hold(
        symbol: &str,
        timeframe: Timeframe,
        timestamp: DateTime<Utc>,
        price: f64,
        confidence: f64,
        supporting_factors: Vec<String>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            direction: SignalDirection::Hold,
            timestamp,
            entry_price: price,
            levels: None,
            confidence: confidence.clamp(0.0, 1.0),
            supporting_factors,
            narrative: None,
        }
    }

    /// Build a BUY/SELL signal, enforcing the ordering of stop, entry and targets.
    #[allow(clippy::too_many_arguments)]
    pub fn directional(
        symbol: &str,
        timeframe: Timeframe,
        direction: SignalDirection,
        timestamp: DateTime<Utc>,
        entry_price: f64,
        levels: RiskLevels,
        confidence: f64,
        supporting_factors: Vec<String>,
    ) -> EngineResult<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(EngineError::InvalidSignal(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }
        if levels.take_profit.is_empty() || levels.take_profit.len() > 2 {
            return Err(EngineError::InvalidSignal(format!(
                "expected 1 or 2 take-profit levels, got {}",
                levels.take_profit.len()
            )));
        }

        let ordered = match direction {
            SignalDirection::Buy => {
                levels.stop_loss < entry_price
                    && levels
                        .take_profit
                        .iter()
                        .fold((entry_price, true), |(prev, ok), &tp| (tp, ok && tp > prev))
                        .1
            }
            SignalDirection::Sell => {
                levels.stop_loss > entry_price
                    && levels
                        .take_profit
                        .iter()
                        .fold((entry_price, true), |(prev, ok), &tp| (tp, ok && tp < prev))
                        .1
            }
            SignalDirection::Hold => {
                return Err(EngineError::InvalidSignal(
                    "a HOLD signal carries no risk levels".to_string(),
                ))
            }
        };
        if !ordered {
            return Err(EngineError::InvalidSignal(format!(
                "{} levels out of order: stop {} entry {} targets {:?}",
                direction, levels.stop_loss, entry_price, levels.take_profit
            )));
        }

        Ok(Self {
            symbol: symbol.to_string(),
            timeframe,
            direction,
            timestamp,
            entry_price,
            levels: Some(levels),
            confidence,
            supporting_factors,
            narrative: None,
        })
    }

    pub fn is_actionable(&self) -> bool {
        self.direction != SignalDirection::Hold
    }

    pub fn stop_loss(&self) -> Option<f64> {
        self.levels.as_ref().map(|l| l.stop_loss)
    }

    pub fn take_profit(&self) -> &[f64] {
        self.levels
            .as_ref()
            .map(|l| l.take_profit.as_slice())
            .unwrap_or(&[])
    }
}

/// Trend read from the higher confirmation timeframe
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HigherTimeframeTrend {
    pub timeframe: Timeframe,
    pub overlay_direction: TrendDirection,
    pub trend: TrendState,
}

/// Structured summary of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub symbol: String,
    pub latest: IndicatorSnapshot,
    pub trend: TrendState,
    pub zone: ZoneContext,
    pub higher_timeframe: Option<HigherTimeframeTrend>,
    pub signal: Signal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + hour * 3600, 0).unwrap()
    }

    #[test]
    fn test_candle_rejects_broken_envelope() {
        assert!(Candle::new(ts(0), 100.0, 99.0, 98.0, 99.5, 1.0).is_err());
        assert!(Candle::new(ts(0), 100.0, 101.0, 100.5, 100.2, 1.0).is_err());
        assert!(Candle::new(ts(0), 100.0, 101.0, 99.0, 100.5, -1.0).is_err());
        assert!(Candle::new(ts(0), 0.0, 101.0, 99.0, 100.5, 1.0).is_err());
        assert!(Candle::new(ts(0), f64::NAN, 101.0, 99.0, 100.5, 1.0).is_err());
        assert!(Candle::new(ts(0), 100.0, 101.0, 99.0, 100.5, 0.0).is_ok());
    }

    #[test]
    fn test_series_rejects_unordered_timestamps() {
        let a = Candle::new(ts(1), 100.0, 101.0, 99.0, 100.5, 1.0).unwrap();
        let b = Candle::new(ts(0), 100.0, 101.0, 99.0, 100.5, 1.0).unwrap();
        let err = CandleSeries::new("BTCUSDT", Timeframe::Hours1, vec![a, b]).unwrap_err();
        assert_eq!(err.code(), "invalid_candle");

        let dup = CandleSeries::new("BTCUSDT", Timeframe::Hours1, vec![a, a]);
        assert!(dup.is_err());
    }

    #[test]
    fn test_quote_volume_within_window() {
        let candles = (0..30)
            .map(|h| Candle::new(ts(h), 10.0, 10.0, 10.0, 10.0, 2.0).unwrap())
            .collect();
        let series = CandleSeries::new("ETHUSDT", Timeframe::Hours1, candles).unwrap();
        // 24 one-hour candles fall inside a 24h window
        assert_eq!(series.quote_volume_within(Duration::hours(24)), 24.0 * 20.0);
    }

    #[test]
    fn test_quote_volume_counts_whole_candles() {
        let candles = (0..10)
            .map(|i| Candle::new(ts(4 * i), 10.0, 10.0, 10.0, 10.0, 2.0).unwrap())
            .collect();
        let series = CandleSeries::new("ETHUSDT", Timeframe::Hours4, candles).unwrap();
        // six 4h candles make up the last day
        assert_eq!(Timeframe::Hours4.duration(), Duration::hours(4));
        assert_eq!(series.quote_volume_within(Duration::hours(24)), 6.0 * 20.0);

        let daily = CandleSeries::new(
            "ETHUSDT",
            Timeframe::Days1,
            vec![
                Candle::new(ts(0), 10.0, 10.0, 10.0, 10.0, 2.0).unwrap(),
                Candle::new(ts(24), 10.0, 10.0, 10.0, 10.0, 3.0).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(daily.quote_volume_within(Duration::hours(24)), 30.0);
    }

    #[test]
    fn test_timeframe_parsing() {
        assert_eq!("4h".parse::<Timeframe>().unwrap(), Timeframe::Hours4);
        assert_eq!(" 15M ".parse::<Timeframe>().unwrap(), Timeframe::Minutes15);
        assert!("2w".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_directional_signal_enforces_ordering() {
        let levels = RiskLevels {
            stop_loss: 95.0,
            take_profit: vec![110.0, 120.0],
        };
        let buy = Signal::directional(
            "BTCUSDT",
            Timeframe::Hours1,
            SignalDirection::Buy,
            ts(0),
            100.0,
            levels.clone(),
            0.8,
            vec![],
        );
        assert!(buy.is_ok());

        let sell = Signal::directional(
            "BTCUSDT",
            Timeframe::Hours1,
            SignalDirection::Sell,
            ts(0),
            100.0,
            levels,
            0.8,
            vec![],
        );
        assert_eq!(sell.unwrap_err().code(), "invalid_signal");
    }

    #[test]
    fn test_directional_signal_rejects_out_of_range_confidence() {
        let levels = RiskLevels {
            stop_loss: 105.0,
            take_profit: vec![90.0],
        };
        let result = Signal::directional(
            "BTCUSDT",
            Timeframe::Hours1,
            SignalDirection::Sell,
            ts(0),
            100.0,
            levels,
            1.2,
            vec![],
        );
        assert!(result.is_err());
    }
}
