//! Adapter for Anthropic-style message APIs.
//!
//! The message wire format models the system instruction out-of-band: system
//! messages are extracted from the transcript into a dedicated top-level
//! `system` field (last one wins) and only user/assistant turns are sent.
//! Streaming uses typed SSE events; `message_stop` is the distinct terminal
//! event.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{error_for_status, merge_extra_params};
use crate::adapter::ChatAdapter;
use crate::chunk_stream::ChunkStream;
use crate::error::Error;
use crate::framing::SseStream;
use crate::types::{
    AdapterCapabilities, AdapterConfig, ChatResponse, Message, Role, StreamChunk, Usage,
};

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

/// The wire protocol mandates `max_tokens`; this stands in when the unified
/// config leaves it unset.
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug)]
pub struct AnthropicAdapter {
    config: AdapterConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self, Error> {
        Self::validate_config(&config)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, client })
    }

    fn validate_config(config: &AdapterConfig) -> Result<(), Error> {
        if config.api_key.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::config("Anthropic API key is required"));
        }
        if config.model.is_empty() {
            return Err(Error::config("Anthropic model name is required"));
        }
        if !config.model.starts_with("claude-") {
            return Err(Error::config(format!(
                "Invalid Anthropic model: {}. Expected model name starting with 'claude-'",
                config.model
            )));
        }
        if config.base_url.is_empty() {
            return Err(Error::config("Anthropic base URL is required"));
        }
        Ok(())
    }

    fn api_key(&self) -> &str {
        self.config.api_key.as_deref().unwrap_or_default()
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    /// Split the transcript into wire turns and the out-of-band system
    /// instruction. When several system messages appear, the last one wins;
    /// tool-role messages have no slot in this wire format and are dropped.
    fn split_system(messages: &[Message]) -> (Vec<Value>, Option<&str>) {
        let mut turns = Vec::new();
        let mut system = None;

        for msg in messages {
            match msg.role {
                Role::System => system = Some(msg.content.as_str()),
                Role::User | Role::Assistant => turns.push(serde_json::json!({
                    "role": msg.role.as_str(),
                    "content": msg.content,
                })),
                Role::Tool => {}
            }
        }
        (turns, system)
    }

    fn build_payload(&self, messages: &[Message], stream: bool) -> Value {
        let (turns, system) = Self::split_system(messages);

        let mut payload = serde_json::json!({
            "model": self.config.model,
            "messages": turns,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": stream,
        });
        if let (Value::Object(fields), Some(system)) = (&mut payload, system) {
            fields.insert("system".to_string(), system.into());
        }
        merge_extra_params(&mut payload, self.config.extra_params.as_ref());
        payload
    }

    async fn execute(&self, payload: &Value) -> Result<reqwest::Response, Error> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", self.api_key())
            .header("anthropic-version", API_VERSION)
            .json(payload)
            .send()
            .await?;
        error_for_status(PROVIDER, response).await
    }

    fn convert_event(event: StreamEvent) -> Option<StreamChunk> {
        match event.kind.as_str() {
            "content_block_delta" => {
                let text = event.delta.and_then(|d| d.text).unwrap_or_default();
                let mut metadata = Map::new();
                metadata.insert("type".to_string(), "content_block_delta".into());
                Some(StreamChunk::delta(text).with_metadata(metadata))
            }
            "message_stop" => Some(StreamChunk::terminal()),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl ChatAdapter for AnthropicAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse, Error> {
        let payload = self.build_payload(messages, false);
        let response = self.execute(&payload).await?;
        let answer: MessagesResponse = response.json().await?;

        let content: String = answer
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        let mut out = ChatResponse::new(content, answer.model);
        out.finish_reason = answer.stop_reason;
        out.usage = answer
            .usage
            .map(|u| Usage::from_parts(u.input_tokens, u.output_tokens));
        Ok(out)
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChunkStream, Error> {
        let payload = self.build_payload(messages, true);
        let response = self.execute(&payload).await?;

        let chunks = SseStream::new(response.bytes_stream()).filter_map(|event| async move {
            match event {
                Ok(event) => match serde_json::from_str::<StreamEvent>(&event.data) {
                    Ok(parsed) => Self::convert_event(parsed).map(Ok),
                    Err(e) => {
                        tracing::warn!(provider = PROVIDER, "skipping malformed stream event: {e}");
                        None
                    }
                },
                Err(e) => Some(Err(e)),
            }
        });
        Ok(ChunkStream::new(chunks))
    }

    /// Liveness is probed with a one-token generation request and reported
    /// honestly: a failed probe is `false`, the same as every other adapter.
    async fn health_check(&self) -> bool {
        let probe = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": "Hello"}],
            "max_tokens": 1,
        });
        match self
            .client
            .post(self.endpoint())
            .header("x-api-key", self.api_key())
            .header("anthropic-version", API_VERSION)
            .json(&probe)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(provider = PROVIDER, "health check failed: {e}");
                false
            }
        }
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            provider: PROVIDER.to_string(),
            supports_streaming: true,
            supports_tools: true,
            supports_function_calling: true,
            max_context_length: Some(200_000),
            supported_models: vec![
                "claude-3-5-sonnet-20241022".to_string(),
                "claude-3-opus-20240229".to_string(),
                "claude-3-sonnet-20240229".to_string(),
                "claude-3-haiku-20240307".to_string(),
            ],
        }
    }
}
