// src/main.rs
use std::sync::Arc;

use trend_signal_bot::application::usecase::{
    LastSignalStore, MarketAnalysisProcessor, SignalProcessor, TradingUseCase,
};
use trend_signal_bot::config::Config;
use trend_signal_bot::domain::errors::AppResult;
use trend_signal_bot::domain::repository::MarketDataRepository;
use trend_signal_bot::domain::service::{NarrativeService, NotificationService};
use trend_signal_bot::infrastructure::{
    BinanceMarketRepository, DisabledNotifier, OpenAiNarrative, TelegramNotifier,
};
use trend_signal_bot::trading::SignalPipeline;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting trend_signal_bot v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Pairs: {}, timeframe {} (confirmation: {}), strategy {:?}",
        config.trading.symbols.join(", "),
        config.trading.primary_timeframe,
        config
            .trading
            .higher_timeframe
            .map_or_else(|| "none".to_string(), |tf| tf.to_string()),
        config.engine.signal.strategy
    );

    let pipeline = Arc::new(SignalPipeline::new(config.engine.clone())?);

    let market_data: Arc<dyn MarketDataRepository + Send + Sync> =
        match (&config.exchange.api_key, &config.exchange.api_secret) {
            (Some(key), Some(secret)) => Arc::new(BinanceMarketRepository::with_credentials(
                key.clone(),
                secret.clone(),
            )),
            _ => Arc::new(BinanceMarketRepository::new()),
        };

    let notifier: Arc<dyn NotificationService + Send + Sync> = if config.notification.enabled {
        Arc::new(TelegramNotifier::new(
            config.notification.telegram_bot_token.clone(),
            config.notification.telegram_chat_id.clone(),
        ))
    } else {
        log::info!("Notifications are disabled. Signals will only be logged.");
        Arc::new(DisabledNotifier)
    };

    let narrative: Option<Arc<dyn NarrativeService + Send + Sync>> = match (
        config.narrative.enabled,
        &config.narrative.api_key,
    ) {
        (true, Some(key)) => Some(Arc::new(OpenAiNarrative::new(
            key.clone(),
            config.narrative.model.clone(),
            config.narrative.endpoint.clone(),
        )) as Arc<dyn NarrativeService + Send + Sync>),
        _ => None,
    };

    let last_signals = Arc::new(match &config.trading.last_signal_file {
        Some(path) => LastSignalStore::load(path)?,
        None => LastSignalStore::in_memory(),
    });

    let analysis = Arc::new(MarketAnalysisProcessor::new(
        market_data.clone(),
        pipeline,
        config.trading.primary_timeframe,
        config.trading.higher_timeframe,
        config.trading.candle_limit,
    ));
    let signals = Arc::new(SignalProcessor::new(notifier.clone(), narrative, last_signals));

    let use_case = TradingUseCase::new(
        market_data,
        notifier,
        analysis,
        signals,
        config.trading.symbols.clone(),
    );

    // One pass per invocation; scheduling is left to cron/CI
    let summary = use_case.run_once().await;
    for error in &summary.errors {
        log::warn!("{}", error);
    }
    log::info!("Run summary: {}", serde_json::to_string(&summary)?);

    Ok(())
}
