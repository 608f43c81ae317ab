pub mod analysis_usecase;
pub mod signal_processing_usecase;
pub mod trading_usecase;

// Re-export public API
pub use analysis_usecase::{MarketAnalysisProcessor, MarketAnalysisUseCase};
pub use signal_processing_usecase::{
    summarize, LastSignalStore, SignalProcessingUseCase, SignalProcessor,
};
pub use trading_usecase::{error_reason, RunSummary, TradingUseCase};
