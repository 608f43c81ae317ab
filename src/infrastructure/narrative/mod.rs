// src/infrastructure/narrative/mod.rs
// OpenAI-compatible chat completion narrative

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::domain::errors::{NarrativeError, NarrativeResult};
use crate::domain::service::NarrativeService;
use crate::infrastructure::http::{self, HttpsClient};

const SYSTEM_PROMPT: &str = "You are a concise crypto market analyst. \
Comment on the technical summary you are given in at most five sentences. \
Do not change or contradict the signal direction, confidence or price levels, \
and do not give financial advice.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct OpenAiNarrative {
    client: HttpsClient,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiNarrative {
    pub fn new(api_key: String, model: String, endpoint: String) -> Self {
        Self {
            client: http::https_client(),
            api_key,
            model,
            endpoint,
        }
    }
}

/// First non-empty choice of a chat completion body
pub fn parse_completion(body: &str) -> NarrativeResult<String> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| NarrativeError::Api(e.to_string()))?;

    response
        .choices
        .into_iter()
        .filter_map(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
        .ok_or(NarrativeError::EmptyResponse)
}

#[async_trait]
impl NarrativeService for OpenAiNarrative {
    async fn commentary(&self, symbol: &str, summary: &str) -> NarrativeResult<String> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("Technical report for {}:\n{}", symbol, summary)},
            ],
            "temperature": 0.3,
        });

        log::debug!("Requesting {} commentary for {}", self.model, symbol);
        let (status, body) = http::post_json(&self.client, &self.endpoint, Some(&self.api_key), &payload)
            .await?;

        if !status.is_success() {
            return Err(NarrativeError::Api(format!("{}: {}", status, body)));
        }
        parse_completion(&body)
    }
}
