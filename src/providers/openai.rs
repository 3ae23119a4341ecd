//! Adapter for OpenAI-style chat completion APIs.
//!
//! The completion wire format keeps the full role-tagged transcript,
//! system messages included, in one `messages` array. Streaming uses SSE
//! `data:` chunks; the chunk whose `finish_reason` becomes non-null is the
//! terminal one, followed by a `[DONE]` sentinel.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{error_for_status, merge_extra_params};
use crate::adapter::ChatAdapter;
use crate::chunk_stream::ChunkStream;
use crate::error::Error;
use crate::framing::SseStream;
use crate::types::{
    AdapterCapabilities, AdapterConfig, ChatResponse, Message, StreamChunk, Usage,
};

const PROVIDER: &str = "openai";

/// OpenAI chat completions adapter. Also serves OpenAI-compatible endpoints,
/// which is why the model name prefix is not enforced.
#[derive(Debug)]
pub struct OpenAiAdapter {
    config: AdapterConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    model: String,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: AssistantMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(wire: WireUsage) -> Self {
        let total = if wire.total_tokens == 0 {
            wire.prompt_tokens + wire.completion_tokens
        } else {
            wire.total_tokens
        };
        Usage {
            prompt_tokens: wire.prompt_tokens,
            completion_tokens: wire.completion_tokens,
            total_tokens: total,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionsChunk {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<Value>>,
}

impl OpenAiAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self, Error> {
        Self::validate_config(&config)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, client })
    }

    fn validate_config(config: &AdapterConfig) -> Result<(), Error> {
        if config.api_key.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::config("OpenAI API key is required"));
        }
        if config.model.is_empty() {
            return Err(Error::config("OpenAI model name is required"));
        }
        if config.base_url.is_empty() {
            return Err(Error::config("OpenAI base URL is required"));
        }
        Ok(())
    }

    fn api_key(&self) -> &str {
        // Presence is validated at construction.
        self.config.api_key.as_deref().unwrap_or_default()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Translate unified messages to the wire transcript. System messages
    /// stay inline; the optional fields are passed through when present.
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage<'_>> {
        messages
            .iter()
            .map(|msg| WireMessage {
                role: msg.role.as_str(),
                content: &msg.content,
                name: msg.name.as_deref(),
                tool_calls: msg.tool_calls.as_deref(),
                tool_call_id: msg.tool_call_id.as_deref(),
            })
            .collect()
    }

    fn build_payload(&self, messages: &[Message], stream: bool) -> Value {
        let mut payload = serde_json::json!({
            "model": self.config.model,
            "messages": Self::convert_messages(messages),
            "temperature": self.config.temperature,
            "stream": stream,
        });
        if let (Value::Object(fields), Some(max_tokens)) = (&mut payload, self.config.max_tokens) {
            fields.insert("max_tokens".to_string(), max_tokens.into());
        }
        merge_extra_params(&mut payload, self.config.extra_params.as_ref());
        payload
    }

    async fn execute(&self, payload: &Value) -> Result<reqwest::Response, Error> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(self.api_key())
            .json(payload)
            .send()
            .await?;
        error_for_status(PROVIDER, response).await
    }

    fn convert_chunk(chunk: CompletionsChunk) -> Option<StreamChunk> {
        let choice = chunk.choices.into_iter().next()?;
        let mut metadata = Map::new();
        if let Some(model) = chunk.model {
            metadata.insert("model".to_string(), model.into());
        }
        if let Some(id) = chunk.id {
            metadata.insert("id".to_string(), id.into());
        }

        let mut out = StreamChunk::delta(choice.delta.content.unwrap_or_default())
            .with_finished(choice.finish_reason.is_some())
            .with_metadata(metadata);
        if let Some(tool_calls) = choice.delta.tool_calls {
            out = out.with_tool_calls(tool_calls);
        }
        Some(out)
    }
}

#[async_trait::async_trait]
impl ChatAdapter for OpenAiAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse, Error> {
        let payload = self.build_payload(messages, false);
        let response = self.execute(&payload).await?;
        let completion: CompletionsResponse = response.json().await?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider(PROVIDER, "response contained no choices"))?;

        let mut out = ChatResponse::new(
            choice.message.content.unwrap_or_default(),
            completion.model,
        );
        out.finish_reason = choice.finish_reason;
        out.usage = completion.usage.map(Usage::from);
        out.tool_calls = choice.message.tool_calls;
        Ok(out)
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChunkStream, Error> {
        let payload = self.build_payload(messages, true);
        let response = self.execute(&payload).await?;

        let chunks = SseStream::new(response.bytes_stream()).filter_map(|event| async move {
            match event {
                Ok(event) => {
                    if event.is_done() {
                        return None;
                    }
                    match serde_json::from_str::<CompletionsChunk>(&event.data) {
                        Ok(chunk) => Self::convert_chunk(chunk).map(Ok),
                        Err(e) => {
                            tracing::warn!(provider = PROVIDER, "skipping malformed stream event: {e}");
                            None
                        }
                    }
                }
                Err(e) => Some(Err(e)),
            }
        });
        Ok(ChunkStream::new(chunks))
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(self.api_key())
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
            max_context_length: Some(128_000),
            supported_models: vec![
                "gpt-4-turbo-preview".to_string(),
                "gpt-4".to_string(),
                "gpt-4-32k".to_string(),
                "gpt-3.5-turbo".to_string(),
                "o1-preview".to_string(),
                "o1-mini".to_string(),
            ],
        }
    }
}
