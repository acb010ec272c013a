// src/gemini.rs
// REST client for the hosted generative-language API. One shared client,
// one lightweight handle per model variant.

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::model::{GenerativeModel, ModelError, TextStream};

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            // No timeout on purpose: a turn waits as long as the provider
            // keeps the connection open.
            http: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// One handle per variant name, all sharing this client.
    pub fn candidates(&self, names: &[&str]) -> Vec<Box<dyn GenerativeModel>> {
        names
            .iter()
            .map(|name| {
                Box::new(GeminiModel {
                    client: self.clone(),
                    model: name.to_string(),
                }) as Box<dyn GenerativeModel>
            })
            .collect()
    }

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, model, self.api_key
        )
    }
}

pub struct GeminiModel {
    client: GeminiClient,
    model: String,
}

fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [{"parts": [{"text": prompt}]}]
    })
}

/// Concatenated text of every part in the first candidate of one response
/// payload. Empty when the payload carries no text (safety block, feedback
/// only, malformed).
fn payload_text(payload: &Value) -> String {
    let mut out = String::new();
    if let Some(parts) = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
    {
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
    }
    out
}

/// JSON payload of one SSE line, if it carries one.
fn sse_payload(line: &str) -> Option<&str> {
    let payload = line.trim().strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(payload)
}

#[async_trait::async_trait]
impl GenerativeModel for GeminiModel {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "one-shot generation");
        let response = self
            .client
            .http
            .post(self.client.generate_url(&self.model))
            .json(&request_body(prompt))
            .send()
            .await
            .map_err(|e| ModelError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::ConnectionFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(ModelError::GenerationFailed(format!("{status} {body}")));
        }

        let payload: Value =
            serde_json::from_str(&body).map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        let text = payload_text(&payload);
        if text.is_empty() {
            return Err(ModelError::InvalidResponse(
                "no text in response".to_string(),
            ));
        }
        Ok(text)
    }

    async fn stream_generate(&self, prompt: &str) -> Result<TextStream, ModelError> {
        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "streaming generation");
        let response = self
            .client
            .http
            .post(self.client.stream_url(&self.model))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&request_body(prompt))
            .send()
            .await
            .map_err(|e| ModelError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::GenerationFailed(format!("{status} {body}")));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let model = self.model.clone();
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        let _ = tx.send(Err(ModelError::ConnectionFailed(err.to_string())));
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);
                // Drain complete lines only. A network chunk may split a
                // multi-byte character, so the cut stays on raw bytes until
                // a newline is in hand.
                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = match std::str::from_utf8(&line) {
                        Ok(line) => line,
                        Err(err) => {
                            let _ = tx.send(Err(ModelError::InvalidResponse(err.to_string())));
                            return;
                        }
                    };
                    let Some(payload) = sse_payload(line) else {
                        continue;
                    };
                    match serde_json::from_str::<Value>(payload) {
                        Ok(payload) => {
                            let text = payload_text(&payload);
                            if !text.is_empty() && tx.send(Ok(text)).is_err() {
                                return; // receiver dropped
                            }
                        }
                        Err(err) => {
                            let _ = tx.send(Err(ModelError::InvalidResponse(err.to_string())));
                            return;
                        }
                    }
                }
            }
            debug!(model = %model, "stream finished");
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
