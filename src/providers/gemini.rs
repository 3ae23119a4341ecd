//! Adapter for Google Gemini-style generative APIs.
//!
//! The generative wire format structures the conversation as turns tagged
//! `user`/`model`, each holding content parts; the system instruction is
//! extracted into a dedicated `system_instruction` field. Streaming emits
//! `data:`-prefixed JSON lines parsed incrementally; malformed lines are
//! skipped rather than aborting the stream.

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
    AdapterCapabilities, AdapterConfig, ChatResponse, Message, Role, StreamChunk, Usage,
};

const PROVIDER: &str = "gemini";

#[derive(Debug)]
pub struct GeminiAdapter {
    config: AdapterConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata", default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u32,
    #[serde(rename = "totalTokenCount", default)]
    total_token_count: u32,
}

impl From<UsageMetadata> for Usage {
    fn from(meta: UsageMetadata) -> Self {
        let total = if meta.total_token_count == 0 {
            meta.prompt_token_count + meta.candidates_token_count
        } else {
            meta.total_token_count
        };
        Usage {
            prompt_tokens: meta.prompt_token_count,
            completion_tokens: meta.candidates_token_count,
            total_tokens: total,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(default)]
    name: String,
}

impl GeminiAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self, Error> {
        Self::validate_config(&config)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, client })
    }

    fn validate_config(config: &AdapterConfig) -> Result<(), Error> {
        if config.api_key.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::config("Gemini API key is required"));
        }
        if config.model.is_empty() {
            return Err(Error::config("Gemini model name is required"));
        }
        if !config.model.starts_with("gemini-") {
            return Err(Error::config(format!(
                "Invalid Gemini model: {}. Expected model name starting with 'gemini-'",
                config.model
            )));
        }
        if config.base_url.is_empty() {
            return Err(Error::config("Gemini base URL is required"));
        }
        Ok(())
    }

    fn api_key(&self) -> &str {
        self.config.api_key.as_deref().unwrap_or_default()
    }

    fn model_url(&self, verb: &str) -> String {
        format!(
            "{}/models/{}:{verb}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Translate the transcript into `user`/`model` turns and the extracted
    /// system instruction (last one wins). Tool-role messages have no slot
    /// in this wire format and are dropped.
    fn split_turns(messages: &[Message]) -> (Vec<Value>, Option<&str>) {
        let mut contents = Vec::new();
        let mut system = None;

        for msg in messages {
            match msg.role {
                Role::System => system = Some(msg.content.as_str()),
                Role::User | Role::Assistant => {
                    let role = if msg.role == Role::User { "user" } else { "model" };
                    contents.push(serde_json::json!({
                        "role": role,
                        "parts": [{"text": msg.content}],
                    }));
                }
                Role::Tool => {}
            }
        }
        (contents, system)
    }

    fn build_payload(&self, messages: &[Message]) -> Value {
        let (contents, system) = Self::split_turns(messages);

        let mut generation_config = serde_json::json!({
            "temperature": self.config.temperature,
        });
        if let (Value::Object(fields), Some(max_tokens)) =
            (&mut generation_config, self.config.max_tokens)
        {
            fields.insert("maxOutputTokens".to_string(), max_tokens.into());
        }
        // Extra parameters are generation settings here, not top-level fields.
        merge_extra_params(&mut generation_config, self.config.extra_params.as_ref());

        let mut payload = serde_json::json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let (Value::Object(fields), Some(system)) = (&mut payload, system) {
            fields.insert(
                "system_instruction".to_string(),
                serde_json::json!({"parts": [{"text": system}]}),
            );
        }
        payload
    }

    fn candidate_text(candidate: &Candidate) -> String {
        candidate
            .content
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect()
    }

    fn convert_stream_line(line: &str) -> Option<StreamChunk> {
        let data = line.strip_prefix("data:")?.trim_start();
        match serde_json::from_str::<GenerateResponse>(data) {
            Ok(event) => {
                let candidate = event.candidates.into_iter().next()?;
                let content = Self::candidate_text(&candidate);
                let mut chunk =
                    StreamChunk::delta(content).with_finished(candidate.finish_reason.is_some());
                if let Some(reason) = candidate.finish_reason {
                    let mut metadata = Map::new();
                    metadata.insert("finish_reason".to_string(), reason.into());
                    chunk = chunk.with_metadata(metadata);
                }
                Some(chunk)
            }
            Err(e) => {
                tracing::warn!(provider = PROVIDER, "skipping malformed stream line: {e}");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl ChatAdapter for GeminiAdapter {
    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn chat(&self, messages: &[Message]) -> Result<ChatResponse, Error> {
        let payload = self.build_payload(messages);
        let response = self
            .client
            .post(self.model_url("generateContent"))
            .query(&[("key", self.api_key())])
            .json(&payload)
            .send()
            .await?;
        let response = error_for_status(PROVIDER, response).await?;
        let generated: GenerateResponse = response.json().await?;

        let candidate = generated
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider(PROVIDER, "no candidates in response"))?;

        let mut out = ChatResponse::new(Self::candidate_text(&candidate), self.config.model.as_str());
        out.finish_reason = candidate.finish_reason;
        out.usage = generated.usage_metadata.map(Usage::from);
        Ok(out)
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChunkStream, Error> {
        let payload = self.build_payload(messages);
        let response = self
            .client
            .post(self.model_url("streamGenerateContent"))
            .query(&[("key", self.api_key()), ("alt", "sse")])
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
        let url = format!("{}/models", self.config.base_url.trim_end_matches('/'));
        match self
            .client
            .get(url)
            .query(&[("key", self.api_key())])
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
            max_context_length: Some(1_000_000),
            supported_models: vec![
                "gemini-pro".to_string(),
                "gemini-pro-vision".to_string(),
                "gemini-1.5-pro".to_string(),
                "gemini-1.5-flash".to_string(),
            ],
        }
    }

    /// Live model discovery; names come back as `models/<id>` paths.
    async fn list_models(&self) -> Result<Vec<String>, Error> {
        let url = format!("{}/models", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[("key", self.api_key())])
            .send()
            .await?;
        let response = error_for_status(PROVIDER, response).await?;
        let listing: ModelsResponse = response.json().await?;

        Ok(listing
            .models
            .into_iter()
            .map(|entry| {
                entry
                    .name
                    .rsplit('/')
                    .next()
                    .unwrap_or(entry.name.as_str())
                    .to_string()
            })
            .collect())
    }
}
