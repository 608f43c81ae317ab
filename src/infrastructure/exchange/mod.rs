// src/infrastructure/exchange/mod.rs
// Binance market data repository implementation

use async_trait::async_trait;
use binance_spot_connector_rust::{
    http::Credentials,
    hyper::{BinanceHttpClient, Error as BinanceError},
    market,
    market::klines::KlineInterval,
};
use hyper::client::HttpConnector;
use hyper_tls::HttpsConnector;

use crate::application::dto::parser::{klines_to_series, parse_klines};
use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::models::{CandleSeries, Timeframe};
use crate::domain::repository::MarketDataRepository;

/// Largest page the klines endpoint serves
const MAX_KLINES: usize = 1000;

pub struct BinanceMarketRepository {
    client: BinanceHttpClient<HttpsConnector<HttpConnector>>,
}

impl Default for BinanceMarketRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl BinanceMarketRepository {
    /// Public market data needs no credentials
    pub fn new() -> Self {
        Self {
            client: BinanceHttpClient::default(),
        }
    }

    pub fn with_credentials(api_key: String, api_secret: String) -> Self {
        let credentials = Credentials::from_hmac(api_key, api_secret);
        Self {
            client: BinanceHttpClient::default().credentials(credentials),
        }
    }

    async fn get_klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        limit: usize,
    ) -> ExchangeResult<String> {
        let request = market::klines(symbol, interval).limit(limit.min(MAX_KLINES) as u32);
        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| map_error(symbol, e))?;
        response
            .into_body_str()
            .await
            .map_err(|e| map_error(symbol, e))
    }
}

/// "BTC/USDT" and "btc-usdt" become "BTCUSDT"
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

pub fn kline_interval(timeframe: Timeframe) -> KlineInterval {
    match timeframe {
        Timeframe::Minutes1 => KlineInterval::Minutes1,
        Timeframe::Minutes5 => KlineInterval::Minutes5,
        Timeframe::Minutes15 => KlineInterval::Minutes15,
        Timeframe::Minutes30 => KlineInterval::Minutes30,
        Timeframe::Hours1 => KlineInterval::Hours1,
        Timeframe::Hours4 => KlineInterval::Hours4,
        Timeframe::Days1 => KlineInterval::Days1,
    }
}

fn map_error(symbol: &str, error: BinanceError) -> ExchangeError {
    let detail = format!("{:?}", error);
    // -1121: Invalid symbol
    if detail.contains("-1121") || detail.contains("Invalid symbol") {
        ExchangeError::UnknownSymbol(symbol.to_string())
    } else {
        ExchangeError::Network(detail)
    }
}

#[async_trait]
impl MarketDataRepository for BinanceMarketRepository {
    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> ExchangeResult<CandleSeries> {
        let exchange_symbol = normalize_symbol(symbol);
        let body = self
            .get_klines(&exchange_symbol, kline_interval(timeframe), limit)
            .await?;

        let klines =
            parse_klines(&body).map_err(|e| ExchangeError::InvalidResponse(e.to_string()))?;
        if klines.len() < limit {
            log::warn!(
                "{} {}: requested {} candles, received {}",
                exchange_symbol,
                timeframe,
                limit,
                klines.len()
            );
        }

        Ok(klines_to_series(symbol, timeframe, &klines)?)
    }

    async fn test_connection(&self) -> bool {
        match self.client.send(market::ping()).await {
            Ok(_) => true,
            Err(e) => {
                log::error!("Binance connection test failed: {:?}", e);
                false
            }
        }
    }
}
