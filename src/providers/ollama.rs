//! Adapter for a local Ollama-style inference server.
//!
//! No credential: reachability alone determines availability. The full
//! role-tagged transcript goes over the wire; generation parameters live
//! under `options`. Streaming is newline-delimited JSON, one object per
//! increment, each carrying a `done` flag.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{error_for_status, merge_extra_params};
use crate::adapter::ChatAdapter;
use crate::chunk_stream::ChunkStream;
use crate::error::Error;
use crate::framing::JsonLinesStream;
use crate::types::{
    AdapterCapabilities, AdapterConfig, ChatResponse, Message, StreamChunk, Usage,
};

const PROVIDER: &str = "ollama";

#[derive(Debug)]
pub struct OllamaAdapter {
    config: AdapterConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self, Error> {
        Self::validate_config(&config)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, client })
    }

    fn validate_config(config: &AdapterConfig) -> Result<(), Error> {
        if config.model.is_empty() {
            return Err(Error::config("Ollama model name is required"));
        }
        if config.base_url.is_empty() {
            return Err(Error::config("Ollama base URL is required"));
        }
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn build_payload(&self, messages: &[Message], stream: bool) -> Value {
        let turns: Vec<Value> = messages
            .iter()
            .map(|msg| {
                serde_json::json!({
                    "role": msg.role.as_str(),
                    "content": msg.content,
                })
            })
            .collect();

        let mut options = serde_json::json!({
            "temperature": self.config.temperature,
        });
        if let (Value::Object(fields), Some(max_tokens)) = (&mut options, self.config.max_tokens) {
            fields.insert("num_predict".to_string(), max_tokens.into());
        }
        // Extra parameters are model options here, not top-level fields.
        merge_extra_params(&mut options, self.config.extra_params.as_ref());

        serde_json::json!({
            "model": self.config.model,
            "messages": turns,
            "stream": stream,
            "options": options,
        })
    }

    fn usage_from_counts(prompt: Option<u32>, completion: Option<u32>) -> Option<Usage> {
        if prompt.is_none() && completion.is_none() {
            return None;
        }
        Some(Usage::from_parts(
            prompt.unwrap_or(0),
            completion.unwrap_or(0),
        ))
    }

    fn convert_stream_line(line: &str) -> Option<StreamChunk> {
        match serde_json::from_str::<WireResponse>(line) {
            Ok(increment) => {
                let content = increment.message.map(|m| m.content).unwrap_or_default();
                let mut metadata = Map::new();
                if let Some(model) = increment.model {
                    metadata.insert("model".to_string(), model.into());
                }
                if let Some(reason) = increment.done_reason {
                    metadata.insert("done_reason".to_string(), reason.into());
                }
                Some(
                    StreamChunk::delta(content)
                        .with_finished(increment.done)
                        .with_metadata(metadata),
                )
            }
            Err(e) => {
                tracing::warn!(provider = PROVIDER, "skipping malformed stream line: {e}");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl ChatAdapter for OllamaAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse, Error> {
        let payload = self.build_payload(messages, false);
        let response = self
            .client
            .post(self.endpoint("api/chat"))
            .json(&payload)
            .send()
            .await?;
        let response = error_for_status(PROVIDER, response).await?;
        let answer: WireResponse = response.json().await?;

        let mut out = ChatResponse::new(
            answer.message.map(|m| m.content).unwrap_or_default(),
            answer.model.unwrap_or_else(|| self.config.model.clone()),
        );
        out.finish_reason = answer.done_reason;
        out.usage = Self::usage_from_counts(answer.prompt_eval_count, answer.eval_count);
        Ok(out)
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChunkStream, Error> {
        let payload = self.build_payload(messages, true);
        let response = self
            .client
            .post(self.endpoint("api/chat"))
            .json(&payload)
            .send()
            .await?;
        let response = error_for_status(PROVIDER, response).await?;

        let chunks = JsonLinesStream::new(response.bytes_stream()).filter_map(|line| async move {
            match line {
                Ok(line) => Self::convert_stream_line(&line).map(Ok),
                Err(e) => Some(Err(e)),
            }
        });
        Ok(ChunkStream::new(chunks))
    }

    async fn health_check(&self) -> bool {
        match self.client.get(self.endpoint("api/tags")).send().await {
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
            supports_tools: false,
            supports_function_calling: false,
            // Context length varies by locally installed model.
            max_context_length: None,
            // Models are discovered live via list_models.
            supported_models: Vec::new(),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, Error> {
        let response = self.client.get(self.endpoint("api/tags")).send().await?;
        let response = error_for_status(PROVIDER, response).await?;
        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|entry| entry.name).collect())
    }
}
