// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Narrative error: {0}")]
    Narrative(#[from] NarrativeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures raised by the indicator, structure and signal stages.
///
/// Degenerate computations (zero-range denominators and the like) are not
/// represented here: they are replaced by a neutral value where they occur.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid candle: {0}")]
    InvalidCandle(String),

    #[error("Insufficient data: need at least {required} candles, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid signal: {0}")]
    InvalidSignal(String),
}

impl EngineError {
    /// Machine-readable reason attached to a "no signal" outcome.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidCandle(_) => "invalid_candle",
            EngineError::InsufficientData { .. } => "insufficient_data",
            EngineError::Configuration(_) => "configuration_error",
            EngineError::InvalidSignal(_) => "invalid_signal",
        }
    }
}

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid market data: {0}")]
    InvalidData(#[from] EngineError),
}

/// Transport failures of the HTTPS collaborators
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Failed to build request: {0}")]
    InvalidRequest(String),

    #[error("Request failed: {0}")]
    Transport(#[source] hyper::Error),

    #[error("Failed to read response body: {0}")]
    Body(#[source] hyper::Error),
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Request error: {0}")]
    Request(#[from] HttpError),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

#[derive(Error, Debug)]
pub enum NarrativeError {
    #[error("Request error: {0}")]
    Request(#[from] HttpError),

    #[error("API error: {0}")]
    Api(String),

    #[error("Empty response")]
    EmptyResponse,
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type EngineResult<T> = Result<T, EngineError>;
pub type ExchangeResult<T> = Result<T, ExchangeError>;
pub type NotificationResult<T> = Result<T, NotificationError>;
pub type NarrativeResult<T> = Result<T, NarrativeError>;
pub type HttpResult<T> = Result<T, HttpError>;
