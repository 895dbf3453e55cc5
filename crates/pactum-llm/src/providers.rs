//! HTTP provider implementations for OpenAI-compatible APIs.

use crate::embeddings::{Embedding, EmbeddingBatch, EmbeddingProvider};
use crate::{LlmOptions, LlmProvider};
use async_trait::async_trait;
use pactum_core::{ReconError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Chat-completions client for OpenAI-compatible APIs.
pub struct OpenAiChatClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    system_prompt: Option<String>,
}

impl OpenAiChatClient {
    /// Creates a new client for the given model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            system_prompt: None,
        }
    }

    /// Sets a custom base URL (for OpenAI-compatible APIs).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets a system prompt prepended to every request.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait]
impl LlmProvider for OpenAiChatClient {
    async fn complete_structured<T: DeserializeOwned + Send>(
        &self,
        prompt: &str,
        options: &LlmOptions,
    ) -> Result<T> {
        let mut messages = Vec::new();
        if let Some(ref system_prompt) = self.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system_prompt.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ReconError::adapter_transient("openai", e.to_string()))?;

        let response = classify_status("openai", response)?;

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ReconError::adapter_permanent("openai", e.to_string()))?;

        let text = chat_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ReconError::adapter_permanent("openai", "empty choices"))?;

        let json_str = extract_json(&text).unwrap_or(&text);
        serde_json::from_str(json_str).map_err(|e| {
            ReconError::adapter_permanent("openai", format!("schema mismatch: {e}"))
        })
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Embeddings client for OpenAI-compatible APIs.
pub struct OpenAiEmbeddingClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    dimensions: usize,
    max_batch_size: usize,
}

impl OpenAiEmbeddingClient {
    /// Creates a new embedding client with the default small model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_model(api_key, "text-embedding-3-small")
    }

    /// Creates a new embedding client with a specific model.
    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let dimensions = match model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        };
        Self {
            api_key: api_key.into(),
            model,
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            dimensions,
            max_batch_size: 100,
        }
    }

    /// Sets a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Overrides the advertised dimensionality.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch {
                vectors: Vec::new(),
                model_version: self.model.clone(),
            });
        }
        if texts.len() > self.max_batch_size {
            return Err(ReconError::input(format!(
                "embedding batch of {} exceeds limit {}",
                texts.len(),
                self.max_batch_size
            )));
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ReconError::adapter_transient("openai-embeddings", e.to_string()))?;

        let response = classify_status("openai-embeddings", response)?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ReconError::adapter_permanent("openai-embeddings", e.to_string()))?;

        // The API may return data out of order; restore input order by index.
        let mut data = body.data;
        data.sort_by_key(|d| d.index);
        if data.len() != texts.len() {
            return Err(ReconError::adapter_permanent(
                "openai-embeddings",
                format!("expected {} vectors, received {}", texts.len(), data.len()),
            ));
        }

        Ok(EmbeddingBatch {
            vectors: data
                .into_iter()
                .map(|d| Embedding::new(d.embedding))
                .collect(),
            model_version: self.model.clone(),
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_version(&self) -> &str {
        &self.model
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn provider_name(&self) -> &str {
        "openai-embeddings"
    }
}

/// Maps an HTTP status onto the adapter error taxonomy.
///
/// 429 and 5xx are transient (retryable); every other failure status is
/// permanent (authentication, malformed request).
fn classify_status(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 429 || status.is_server_error() {
        Err(ReconError::adapter_transient(
            provider,
            format!("http status {status}"),
        ))
    } else {
        Err(ReconError::adapter_permanent(
            provider,
            format!("http status {status}"),
        ))
    }
}

/// Extracts the JSON payload from a model response that may wrap it in a
/// code fence or surrounding prose.
fn extract_json(text: &str) -> Option<&str> {
    // Fenced ```json block first
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return Some(text[content_start..content_start + end].trim());
        }
    }

    // Generic fenced block
    if let Some(start) = text.find("```") {
        let content_start = text[start + 3..].find('\n').map(|i| start + 3 + i + 1)?;
        if let Some(end) = text[content_start..].find("```") {
            return Some(text[content_start..content_start + end].trim());
        }
    }

    // Raw JSON array (the batch schemas are arrays)
    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if end > start {
            return Some(&text[start..=end]);
        }
    }

    // Raw JSON object
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            return Some(&text[start..=end]);
        }
    }

    None
}
