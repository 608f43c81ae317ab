// src/infrastructure/notification/mod.rs
// Telegram notification service implementation

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::json;

use crate::domain::errors::{NotificationError, NotificationResult};
use crate::domain::models::{Signal, SignalDirection};
use crate::domain::service::NotificationService;
use crate::infrastructure::http::{self, HttpsClient};

/// Telegram rejects longer messages
pub const MAX_MESSAGE_CHARS: usize = 4096;

const API_BASE: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    client: HttpsClient,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            client: http::https_client(),
            token,
            chat_id,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token, method)
    }

    pub async fn send_message(&self, text: &str) -> NotificationResult<()> {
        if text.trim().is_empty() {
            return Err(NotificationError::InvalidMessage("empty message".to_string()));
        }

        let length = text.chars().count();
        if length > MAX_MESSAGE_CHARS {
            return Err(NotificationError::InvalidMessage(format!(
                "{} characters exceeds the {} limit",
                length, MAX_MESSAGE_CHARS
            )));
        }

        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let (status, body) = http::post_json(&self.client, &self.method_url("sendMessage"), None, &payload)
            .await?;

        if !status.is_success() {
            return Err(NotificationError::Api(format!("{}: {}", status, body)));
        }
        Ok(())
    }
}

/// Price rounded to 4 decimals without float noise
pub fn format_price(price: f64) -> String {
    Decimal::from_f64(price)
        .map(|d| d.round_dp(4).normalize().to_string())
        .unwrap_or_else(|| format!("{:.4}", price))
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape `text`, shortening the plain text first so the escaped form fits
/// in `budget` characters. Entities are never split.
pub fn escape_within(text: &str, budget: usize) -> String {
    let escaped = escape_html(text);
    if escaped.chars().count() <= budget {
        return escaped;
    }
    if budget < 3 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let piece = escape_html(c.encode_utf8(&mut [0; 4]));
        let width = piece.chars().count();
        if used + width > budget - 3 {
            break;
        }
        out.push_str(&piece);
        used += width;
    }
    out.push_str("...");
    out
}

pub fn format_signal_message(signal: &Signal) -> String {
    let (icon, hint) = match signal.direction {
        SignalDirection::Buy => ("🚀", "Consider buying above the stop level"),
        SignalDirection::Sell => ("🔴", "Consider selling below the stop level"),
        SignalDirection::Hold => ("➡️", "No action"),
    };

    let mut message = format!("{} <b>{} SIGNAL</b>\n\n", icon, signal.direction);
    message += &format!(
        "💎 <b>Pair:</b> {} ({})\n",
        escape_html(&signal.symbol),
        signal.timeframe
    );
    message += &format!("💰 <b>Entry:</b> ${}\n", format_price(signal.entry_price));
    if let Some(stop) = signal.stop_loss() {
        message += &format!("🛡️ <b>Stop Loss:</b> ${}\n", format_price(stop));
    }
    for (i, target) in signal.take_profit().iter().enumerate() {
        message += &format!("🎯 <b>Take Profit {}:</b> ${}\n", i + 1, format_price(*target));
    }
    message += &format!("📊 <b>Confidence:</b> {:.1}%\n", signal.confidence * 100.0);

    let footer = format!(
        "\n⏰ {}\n\n💡 <i>{}</i>",
        signal.timestamp.format("%Y-%m-%d %H:%M UTC"),
        hint
    );

    if !signal.supporting_factors.is_empty() {
        let title = "\n<b>📈 Factors:</b>\n";
        let mut budget = MAX_MESSAGE_CHARS.saturating_sub(
            message.chars().count() + footer.chars().count() + title.chars().count(),
        );
        let mut lines = String::new();
        for factor in &signal.supporting_factors {
            // "• " and the newline
            if budget <= 3 {
                break;
            }
            let text = escape_within(factor, budget - 3);
            if text.is_empty() {
                break;
            }
            let line = format!("• {}\n", text);
            budget -= line.chars().count();
            lines += &line;
        }
        if !lines.is_empty() {
            message += title;
            message += &lines;
        }
    }

    message += &footer;
    message
}

#[async_trait]
impl NotificationService for TelegramNotifier {
    async fn notify(&self, signal: &Signal) -> bool {
        match self.send_message(&format_signal_message(signal)).await {
            Ok(()) => {
                log::debug!("Message sent to Telegram: {} {}", signal.direction, signal.symbol);
                true
            }
            Err(e) => {
                log::error!("Failed to send signal notification: {}", e);
                false
            }
        }
    }

    async fn notify_error(&self, message: &str) -> bool {
        let frame = "🚨 <b>Error Occurred</b>\n\n<code></code>".chars().count();
        let text = format!(
            "🚨 <b>Error Occurred</b>\n\n<code>{}</code>",
            escape_within(message, MAX_MESSAGE_CHARS - frame)
        );
        match self.send_message(&text).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to send error notification: {}", e);
                false
            }
        }
    }

    async fn test_connection(&self) -> bool {
        match http::get(&self.client, &self.method_url("getMe")).await {
            Ok((status, _)) if status.is_success() => true,
            Ok((status, body)) => {
                log::error!("Telegram connection test failed: {} {}", status, body);
                false
            }
            Err(e) => {
                log::error!("Telegram connection test failed: {}", e);
                false
            }
        }
    }
}

/// Stand-in when notifications are switched off: signals are only logged
pub struct DisabledNotifier;

#[async_trait]
impl NotificationService for DisabledNotifier {
    async fn notify(&self, signal: &Signal) -> bool {
        log::info!(
            "Notifications disabled, {} {} @ {} not sent",
            signal.direction,
            signal.symbol,
            format_price(signal.entry_price)
        );
        true
    }

    async fn notify_error(&self, message: &str) -> bool {
        log::warn!("Notifications disabled, error not sent: {}", message);
        true
    }

    async fn test_connection(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{RiskLevels, Timeframe};
    use chrono::{TimeZone, Utc};

    fn create_signal() -> Signal {
        Signal::directional(
            "BTC/USDT",
            Timeframe::Hours1,
            SignalDirection::Buy,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            106.5,
            RiskLevels {
                stop_loss: 102.9,
                take_profit: vec![111.9, 118.02],
            },
            0.8,
            vec!["RSI < 30 & volume > avg".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_format_price_rounds() {
        assert_eq!(format_price(111.89999999999999), "111.9");
        assert_eq!(format_price(0.123456), "0.1235");
    }

    #[test]
    fn test_signal_message_contents() {
        let message = format_signal_message(&create_signal());
        assert!(message.contains("<b>BUY SIGNAL</b>"));
        assert!(message.contains("BTC/USDT (1h)"));
        assert!(message.contains("Stop Loss:</b> $102.9"));
        assert!(message.contains("Take Profit 2:</b> $118.02"));
        assert!(message.contains("80.0%"));
        assert!(message.contains("RSI &lt; 30 &amp; volume &gt; avg"));
        assert!(message.contains("2023-11-14 22:13 UTC"));
    }

    #[test]
    fn test_escape_within_keeps_entities_whole() {
        assert_eq!(escape_within("a & b", 20), "a &amp; b");
        // "&amp;" does not fit after "ab", so it is dropped whole
        assert_eq!(escape_within("ab&cdef", 8), "ab...");
        assert_eq!(escape_within("abcdef", 2), "");
    }

    #[test]
    fn test_long_commentary_stays_within_limit() {
        let mut signal = create_signal();
        signal
            .supporting_factors
            .push(format!("Commentary: {}", "<b>Q&A</b> é ".repeat(800)));

        let message = format_signal_message(&signal);

        assert!(message.chars().count() <= MAX_MESSAGE_CHARS);
        assert!(message.ends_with("<i>Consider buying above the stop level</i>"));
        assert!(message.contains("RSI &lt; 30 &amp; volume &gt; avg"));
        assert!(message.contains("...\n"));
        assert_eq!(message.matches("<b>").count(), message.matches("</b>").count());
        for (i, _) in message.match_indices('&') {
            let rest = &message[i..];
            assert!(
                rest.starts_with("&amp;") || rest.starts_with("&lt;") || rest.starts_with("&gt;"),
                "broken entity at {}",
                i
            );
        }
    }
}
