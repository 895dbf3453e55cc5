//! Pactum-LLM: adapter layer for LLM and embedding providers.
//!
//! This crate isolates every network-facing dependency of the reconciliation
//! engine behind two narrow traits: [`LlmProvider`] for structured
//! completions and [`EmbeddingProvider`] for text embeddings. The engine in
//! `pactum-recon` is generic over both, so production providers, the retry
//! machinery and the scripted test doubles are interchangeable.

mod cache;
mod cancellation;
mod embeddings;
mod providers;
mod resilience;
pub mod testing;

pub use cache::{CacheStats, EmbeddingCache};
pub use cancellation::CancellationContext;
pub use embeddings::{Embedding, EmbeddingBatch, EmbeddingProvider, embed_chunked};
pub use providers::{OpenAiChatClient, OpenAiEmbeddingClient};
pub use resilience::{CallOutcome, RetryConfig, run_adapter_call};

use async_trait::async_trait;
use pactum_core::Result;
use serde::de::DeserializeOwned;

/// Request options for a structured completion.
#[derive(Debug, Clone)]
pub struct LlmOptions {
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature; comparison work wants determinism
    pub temperature: f32,
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.0,
        }
    }
}

impl LlmOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }
}

/// LLM provider abstraction.
///
/// Providers are stateless: they turn one prompt into one JSON document
/// matching the caller's schema and report failures through the shared error
/// taxonomy (`AdapterTransient` for network/5xx/rate-limit conditions,
/// `AdapterPermanent` for schema or authentication failures). Deadlines and
/// retries are applied by the caller, not the provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generates structured data matching the schema described in `prompt`.
    async fn complete_structured<T: DeserializeOwned + Send>(
        &self,
        prompt: &str,
        options: &LlmOptions,
    ) -> Result<T>;

    /// Returns the name of this provider.
    fn provider_name(&self) -> &str;

    /// Returns the model being used.
    fn model_name(&self) -> &str;
}
