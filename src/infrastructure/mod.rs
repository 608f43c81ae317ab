// src/infrastructure/mod.rs
// Concrete collaborators: exchange, chat delivery, narrative

pub mod exchange;
pub mod http;
pub mod narrative;
pub mod notification;

pub use exchange::BinanceMarketRepository;
pub use narrative::OpenAiNarrative;
pub use notification::{DisabledNotifier, TelegramNotifier};
