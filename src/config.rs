// src/config.rs
use crate::domain::errors::{AppError, AppResult, EngineError, EngineResult};
use crate::domain::models::Timeframe;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Signal bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Exchange API settings
    pub exchange: ExchangeConfig,

    /// Symbols and timeframes to analyze
    pub trading: TradingConfig,

    /// Indicator, structure and signal parameters
    pub engine: EngineConfig,

    /// Telegram delivery
    pub notification: NotificationConfig,

    /// Optional narrative commentary
    pub narrative: NarrativeConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Exchange API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Exchange name (e.g., "binance")
    pub name: String,

    /// API key, only needed for authenticated endpoints
    pub api_key: Option<String>,

    /// API secret
    pub api_secret: Option<String>,
}

/// Trading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Trading pairs (e.g., ["BTC/USDT", "ETH/USDT"])
    pub symbols: Vec<String>,

    /// Timeframe the signals are generated on
    pub primary_timeframe: Timeframe,

    /// Confirmation timeframe, disabled when None
    pub higher_timeframe: Option<Timeframe>,

    /// Number of candles requested per fetch
    pub candle_limit: usize,

    /// File holding the last emitted direction per symbol
    pub last_signal_file: Option<String>,
}

/// Indicator engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// Half-width of the pivot window (window = 2 * period + 1)
    pub pivot_period: usize,
    pub atr_period: usize,
    /// Band distance in ATR multiples
    pub atr_factor: f64,
    pub rsi_period: usize,
    pub sma_lengths: Vec<usize>,
    pub ema_lengths: Vec<usize>,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
    pub volume_short: usize,
    pub volume_long: usize,
    pub adx_period: usize,
    pub enabled: IndicatorToggles,
}

/// Per-indicator switches. ATR is always computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorToggles {
    pub trend_overlay: bool,
    pub pivots: bool,
    pub momentum: bool,
    pub moving_averages: bool,
    pub bollinger: bool,
    pub volume_trend: bool,
    pub directional: bool,
}

/// Structure and zone analyzer parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureConfig {
    /// Candles on each side of a swing point
    pub swing_window: usize,
    /// Candles defining the discount/premium range
    pub zone_lookback: usize,
    /// Snapshots scanned for support/resistance pivots
    pub sr_lookback: usize,
    /// Snapshots used to measure the slow moving-average slope
    pub trend_slope_lookback: usize,
    pub order_block_lookback: usize,
    /// Candles after an order block searched for the follow-through move
    pub order_block_extension_window: usize,
    pub order_block_min_body_ratio: f64,
    pub order_block_min_volume_ratio: f64,
    /// Minimum follow-through beyond the block extreme, as a fraction of price
    pub order_block_min_extension: f64,
    pub volume_average_window: usize,
    pub manipulation_lookback: usize,
    /// Touch tolerance in ATR multiples
    pub manipulation_tolerance: f64,
    pub volume_spike_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStrategy {
    /// Stop at the trend-overlay band
    SuperTrend,
    /// Stop beyond the aligned order block, gated by the manipulation phase
    OrderBlock,
}

impl FromStr for SignalStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "supertrend" => Ok(SignalStrategy::SuperTrend),
            "orderblock" | "order_block" => Ok(SignalStrategy::OrderBlock),
            other => Err(format!("unknown signal strategy '{}'", other)),
        }
    }
}

/// Signal decision parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub strategy: SignalStrategy,
    /// Hard cutoff: lower scores never produce a BUY/SELL
    pub min_confidence: f64,
    pub risk_reward: f64,
    pub extended_risk_reward: f64,
    /// Closest allowed target, in multiples of the stop distance
    pub min_partial_rr: f64,
    pub order_block_atr_multiplier: f64,
    pub require_manipulation_phase: bool,
    /// Quote volume over the last 24h needed for the liquidity bonus
    pub min_quote_volume_24h: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    pub indicators: IndicatorConfig,
    pub structure: StructureConfig,
    pub signal: SignalConfig,
}

/// Telegram configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
}

/// Narrative (chat completion) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

impl Default for IndicatorToggles {
    fn default() -> Self {
        Self {
            trend_overlay: true,
            pivots: true,
            momentum: true,
            moving_averages: true,
            bollinger: true,
            volume_trend: true,
            directional: true,
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            pivot_period: 2,
            atr_period: 10,
            atr_factor: 3.0,
            rsi_period: 14,
            sma_lengths: vec![20, 50],
            ema_lengths: vec![21, 50],
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
            volume_short: 5,
            volume_long: 20,
            adx_period: 14,
            enabled: IndicatorToggles::default(),
        }
    }
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            swing_window: 5,
            zone_lookback: 50,
            sr_lookback: 50,
            trend_slope_lookback: 5,
            order_block_lookback: 30,
            order_block_extension_window: 5,
            order_block_min_body_ratio: 0.7,
            order_block_min_volume_ratio: 1.4,
            order_block_min_extension: 0.015,
            volume_average_window: 20,
            manipulation_lookback: 20,
            manipulation_tolerance: 0.25,
            volume_spike_ratio: 1.6,
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            strategy: SignalStrategy::SuperTrend,
            min_confidence: 0.75,
            risk_reward: 1.5,
            extended_risk_reward: 3.2,
            min_partial_rr: 0.2,
            order_block_atr_multiplier: 1.5,
            require_manipulation_phase: true,
            min_quote_volume_24h: 1_000_000.0,
        }
    }
}

fn check(condition: bool, message: &str) -> EngineResult<()> {
    if condition {
        Ok(())
    } else {
        Err(EngineError::Configuration(message.to_string()))
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl IndicatorConfig {
    pub fn validate(&self) -> EngineResult<()> {
        check(self.pivot_period > 0, "pivot_period must be > 0")?;
        check(self.atr_period > 0, "atr_period must be > 0")?;
        check(positive(self.atr_factor), "atr_factor must be a positive number")?;
        check(self.rsi_period > 0, "rsi_period must be > 0")?;
        check(
            self.sma_lengths.iter().chain(&self.ema_lengths).all(|&l| l > 0),
            "moving-average lengths must be > 0",
        )?;
        check(self.bollinger_period > 1, "bollinger_period must be > 1")?;
        check(
            positive(self.bollinger_std_dev),
            "bollinger_std_dev must be a positive number",
        )?;
        check(self.volume_short > 0, "volume_short must be > 0")?;
        check(
            self.volume_long > self.volume_short,
            "volume_long must be greater than volume_short",
        )?;
        check(self.adx_period > 0, "adx_period must be > 0")?;
        Ok(())
    }
}

impl StructureConfig {
    pub fn validate(&self) -> EngineResult<()> {
        check(self.swing_window > 0, "swing_window must be > 0")?;
        check(self.zone_lookback > 1, "zone_lookback must be > 1")?;
        check(self.sr_lookback > 0, "sr_lookback must be > 0")?;
        check(self.trend_slope_lookback > 0, "trend_slope_lookback must be > 0")?;
        check(self.order_block_lookback > 0, "order_block_lookback must be > 0")?;
        check(
            self.order_block_extension_window > 0,
            "order_block_extension_window must be > 0",
        )?;
        check(
            positive(self.order_block_min_body_ratio) && self.order_block_min_body_ratio <= 1.0,
            "order_block_min_body_ratio must be in (0, 1]",
        )?;
        check(
            self.order_block_min_volume_ratio.is_finite() && self.order_block_min_volume_ratio >= 1.0,
            "order_block_min_volume_ratio must be >= 1",
        )?;
        check(
            positive(self.order_block_min_extension),
            "order_block_min_extension must be a positive fraction",
        )?;
        check(self.volume_average_window > 0, "volume_average_window must be > 0")?;
        check(self.manipulation_lookback > 1, "manipulation_lookback must be > 1")?;
        check(
            self.manipulation_tolerance.is_finite() && self.manipulation_tolerance >= 0.0,
            "manipulation_tolerance must be >= 0",
        )?;
        check(
            self.volume_spike_ratio.is_finite() && self.volume_spike_ratio > 1.0,
            "volume_spike_ratio must be > 1",
        )?;
        Ok(())
    }
}

impl SignalConfig {
    pub fn validate(&self) -> EngineResult<()> {
        check(
            (0.0..=1.0).contains(&self.min_confidence),
            "min_confidence must be in [0, 1]",
        )?;
        check(positive(self.risk_reward), "risk_reward must be a positive number")?;
        check(
            self.extended_risk_reward.is_finite() && self.extended_risk_reward >= self.risk_reward,
            "extended_risk_reward must be >= risk_reward",
        )?;
        check(
            positive(self.min_partial_rr) && self.min_partial_rr <= self.risk_reward,
            "min_partial_rr must be in (0, risk_reward]",
        )?;
        check(
            positive(self.order_block_atr_multiplier),
            "order_block_atr_multiplier must be a positive number",
        )?;
        check(
            self.min_quote_volume_24h.is_finite() && self.min_quote_volume_24h >= 0.0,
            "min_quote_volume_24h must be >= 0",
        )?;
        Ok(())
    }
}

impl EngineConfig {
    /// Reject out-of-range parameters before any analysis runs
    pub fn validate(&self) -> EngineResult<()> {
        self.indicators.validate()?;
        self.structure.validate()?;
        self.signal.validate()?;
        check(
            self.indicators.enabled.trend_overlay,
            "signal strategies require the trend overlay to be enabled",
        )?;
        Ok(())
    }
}

fn env_or<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {} '{}': {}", key, raw, e))),
        _ => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> AppResult<bool> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid {} '{}': expected true/false", key, raw))),
        _ => Ok(default),
    }
}

fn env_lengths(key: &str, default: &[usize]) -> AppResult<Vec<usize>> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .split(',')
            .map(|s| {
                s.trim()
                    .parse()
                    .map_err(|e| AppError::Config(format!("Invalid {} entry '{}': {}", key, s, e)))
            })
            .collect(),
        _ => Ok(default.to_vec()),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let exchange_config = ExchangeConfig {
            name: env::var("EXCHANGE_NAME").unwrap_or_else(|_| "binance".to_string()),
            api_key: env::var("API_KEY").ok(),
            api_secret: env::var("API_SECRET").ok(),
        };

        let symbols = env::var("TRADING_PAIRS")
            .unwrap_or_else(|_| "BTC/USDT,ETH/USDT".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let higher_timeframe = match env::var("HIGHER_TIMEFRAME") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(raw.parse().map_err(AppError::Config)?),
            Err(_) => defaults.trading.higher_timeframe,
        };

        let trading_config = TradingConfig {
            symbols,
            primary_timeframe: env_or("PRIMARY_TIMEFRAME", defaults.trading.primary_timeframe)?,
            higher_timeframe,
            candle_limit: env_or("OHLCV_LIMIT", defaults.trading.candle_limit)?,
            last_signal_file: env::var("LAST_SIGNAL_FILE").ok(),
        };

        let ind = &defaults.engine.indicators;
        let indicators = IndicatorConfig {
            pivot_period: env_or("PIVOT_PERIOD", ind.pivot_period)?,
            atr_period: env_or("ATR_PERIOD", ind.atr_period)?,
            atr_factor: env_or("ATR_FACTOR", ind.atr_factor)?,
            rsi_period: env_or("RSI_PERIOD", ind.rsi_period)?,
            sma_lengths: env_lengths("SMA_LENGTHS", &ind.sma_lengths)?,
            ema_lengths: env_lengths("EMA_LENGTHS", &ind.ema_lengths)?,
            bollinger_period: env_or("BOLLINGER_PERIOD", ind.bollinger_period)?,
            bollinger_std_dev: env_or("BOLLINGER_STD_DEV", ind.bollinger_std_dev)?,
            volume_short: env_or("VOLUME_SHORT", ind.volume_short)?,
            volume_long: env_or("VOLUME_LONG", ind.volume_long)?,
            adx_period: env_or("ADX_PERIOD", ind.adx_period)?,
            enabled: ind.enabled,
        };

        let st = &defaults.engine.structure;
        let structure = StructureConfig {
            swing_window: env_or("SWING_WINDOW", st.swing_window)?,
            zone_lookback: env_or("ZONE_LOOKBACK", st.zone_lookback)?,
            manipulation_tolerance: env_or("MANIPULATION_TOLERANCE", st.manipulation_tolerance)?,
            ..st.clone()
        };

        let sig = &defaults.engine.signal;
        let signal = SignalConfig {
            strategy: env_or("SIGNAL_STRATEGY", sig.strategy)?,
            min_confidence: env_or("MIN_CONFIDENCE", sig.min_confidence)?,
            risk_reward: env_or("RISK_REWARD", sig.risk_reward)?,
            extended_risk_reward: env_or("EXTENDED_RISK_REWARD", sig.extended_risk_reward)?,
            min_partial_rr: env_or("MIN_PARTIAL_RR", sig.min_partial_rr)?,
            min_quote_volume_24h: env_or("MIN_QUOTE_VOLUME_24H", sig.min_quote_volume_24h)?,
            ..sig.clone()
        };

        let notification_config = NotificationConfig {
            enabled: env_flag("ENABLE_NOTIFICATIONS", true)?,
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            telegram_chat_id: env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
        };

        let narrative_config = NarrativeConfig {
            enabled: env_flag("ENABLE_NARRATIVE", false)?,
            api_key: env::var("OPENAI_API_KEY").ok(),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| defaults.narrative.model.clone()),
            endpoint: env::var("OPENAI_ENDPOINT")
                .unwrap_or_else(|_| defaults.narrative.endpoint.clone()),
        };

        let logging_config = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: env_flag("LOG_TO_FILE", false)?,
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        let config = Config {
            exchange: exchange_config,
            trading: trading_config,
            engine: EngineConfig {
                indicators,
                structure,
                signal,
            },
            notification: notification_config,
            narrative: narrative_config,
            logging: logging_config,
        };
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open config file: {}", e))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file: {}", e))
        })?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::Config(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents).map_err(|e| {
            AppError::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Check cross-field requirements and engine parameter ranges
    pub fn validate(&self) -> AppResult<()> {
        if self.trading.symbols.is_empty() {
            return Err(AppError::Config("TRADING_PAIRS must list at least one pair".to_string()));
        }
        if self.trading.candle_limit < 2 {
            return Err(AppError::Config("OHLCV_LIMIT must be at least 2".to_string()));
        }
        if self.notification.enabled {
            let missing: Vec<&str> = [
                ("TELEGRAM_BOT_TOKEN", &self.notification.telegram_bot_token),
                ("TELEGRAM_CHAT_ID", &self.notification.telegram_chat_id),
            ]
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
            if !missing.is_empty() {
                return Err(AppError::Config(format!(
                    "Missing required environment variables: {}",
                    missing.join(", ")
                )));
            }
        }
        if self.narrative.enabled && self.narrative.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(AppError::Config(
                "ENABLE_NARRATIVE is set but OPENAI_API_KEY is missing".to_string(),
            ));
        }
        self.engine.validate()?;
        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        // Set log level
        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        // Configure output
        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path).map_err(|e| {
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder
            .try_init()
            .map_err(|e| AppError::Config(format!("Failed to initialize logger: {}", e)))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig {
                name: "binance".to_string(),
                api_key: None,
                api_secret: None,
            },
            trading: TradingConfig {
                symbols: vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()],
                primary_timeframe: Timeframe::Hours1,
                higher_timeframe: Some(Timeframe::Hours4),
                candle_limit: 200,
                last_signal_file: None,
            },
            engine: EngineConfig::default(),
            notification: NotificationConfig {
                enabled: false,
                telegram_bot_token: String::new(),
                telegram_chat_id: String::new(),
            },
            narrative: NarrativeConfig {
                enabled: false,
                api_key: None,
                model: "gpt-4o".to_string(),
                endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}
