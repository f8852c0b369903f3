//! Streaming Gemini generation client.

use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::ChatEvent;
use crate::{RagError, RagResult};

const DEFAULT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const TEMPERATURE: f64 = 0.4;

/// REST client for `streamGenerateContent`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> RagResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Override the endpoint base URL (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Stream generated tokens for `prompt` into `tx`.
    ///
    /// The SSE response is parsed incrementally; each text part is forwarded
    /// as a [`ChatEvent::Token`]. Returns once the upstream stream ends.
    pub async fn stream_generate(
        &self,
        prompt: &str,
        tx: &mpsc::Sender<ChatEvent>,
    ) -> RagResult<()> {
        let url = format!(
            "{}/models/{}:streamGenerateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": { "temperature": TEMPERATURE },
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RagError::LlmApi {
                status: status.as_u16(),
                message,
            });
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // SSE frames are newline-delimited; keep the trailing partial line
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);

                if let Some(text) = extract_sse_text(&line) {
                    if tx.send(ChatEvent::Token(text)).await.is_err() {
                        debug!("Chat consumer dropped, aborting generation stream");
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }
}

/// Extract generated text from one SSE data line, if it carries any.
fn extract_sse_text(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }

    let value: Value = serde_json::from_str(payload).ok()?;
    let parts = value
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
