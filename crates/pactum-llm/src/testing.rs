//! Test doubles for LLM and embedding providers.
//!
//! These live in the library (not behind `cfg(test)`) so downstream crates
//! can drive the reconciliation pipeline deterministically in their own
//! tests and local environments.

use crate::embeddings::{Embedding, EmbeddingBatch, EmbeddingProvider};
use crate::{LlmOptions, LlmProvider};
use async_trait::async_trait;
use pactum_core::{ReconError, Result};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type ScriptedResponse = std::result::Result<serde_json::Value, String>;

/// A scripted LLM provider.
///
/// Responses can be keyed by a prompt substring (checked first, stable under
/// concurrent batches) or queued FIFO. Errors are scripted the same way; a
/// queued transient error string starting with `transient:` degrades to an
/// `AdapterTransient`, anything else to `AdapterPermanent`. Every prompt is
/// recorded for assertions.
#[derive(Default)]
pub struct ScriptedLlm {
    keyed: Mutex<Vec<(String, ScriptedResponse)>>,
    queue: Mutex<VecDeque<ScriptedResponse>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    /// Creates an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a response returned whenever the prompt contains `key`.
    pub fn with_response_for(self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.keyed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((key.into(), Ok(value)));
        self
    }

    /// Registers a transient error returned whenever the prompt contains `key`.
    pub fn with_transient_error_for(self, key: impl Into<String>) -> Self {
        self.keyed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((key.into(), Err("transient: scripted outage".to_string())));
        self
    }

    /// Queues a response consumed by the next unkeyed prompt.
    pub fn push_json(&self, value: serde_json::Value) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(value));
    }

    /// Queues a permanent (schema-shaped) error.
    pub fn push_permanent_error(&self, message: impl Into<String>) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(message.into()));
    }

    /// Queues a transient error.
    pub fn push_transient_error(&self, message: impl Into<String>) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(format!("transient: {}", message.into())));
    }

    /// All prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of queued (unkeyed) responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn next_for(&self, prompt: &str) -> Option<ScriptedResponse> {
        let keyed = self.keyed.lock().unwrap_or_else(|e| e.into_inner());
        for (key, response) in keyed.iter() {
            if prompt.contains(key.as_str()) {
                return Some(response.clone());
            }
        }
        drop(keyed);
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete_structured<T: DeserializeOwned + Send>(
        &self,
        prompt: &str,
        _options: &LlmOptions,
    ) -> Result<T> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        match self.next_for(prompt) {
            Some(Ok(value)) => serde_json::from_value(value).map_err(|e| {
                ReconError::adapter_permanent("scripted-llm", format!("schema mismatch: {e}"))
            }),
            Some(Err(message)) => {
                if let Some(rest) = message.strip_prefix("transient:") {
                    Err(ReconError::adapter_transient("scripted-llm", rest.trim()))
                } else {
                    Err(ReconError::adapter_permanent("scripted-llm", message))
                }
            }
            None => Err(ReconError::adapter_permanent(
                "scripted-llm",
                "script exhausted",
            )),
        }
    }

    fn provider_name(&self) -> &str {
        "scripted-llm"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Deterministic embedding provider derived from content hashes.
///
/// Distinct texts map to near-orthogonal unit vectors, so semantic
/// similarity between unrelated texts is close to zero. Tests that need a
/// specific similarity pin exact vectors with [`with_vector`](Self::with_vector).
pub struct HashEmbedder {
    dimensions: usize,
    model_version: String,
    overrides: Mutex<HashMap<String, Vec<f32>>>,
}

impl HashEmbedder {
    /// Creates an embedder producing vectors of the given dimensionality.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(4),
            model_version: "hash-embedder-v1".to_string(),
            overrides: Mutex::new(HashMap::new()),
        }
    }

    /// Pins the exact vector returned for `text`.
    pub fn with_vector(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.overrides
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(text.into(), vector);
        self
    }

    /// The deterministic vector for one text.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(vector) = self
            .overrides
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(text)
        {
            return vector.clone();
        }

        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();

        let mut vector = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let byte = digest[i % digest.len()];
            let rotated = byte.rotate_left((i / digest.len()) as u32);
            vector.push(f32::from(rotated) / 127.5 - 1.0);
        }
        Embedding::new(vector).normalized().vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        Ok(EmbeddingBatch {
            vectors: texts
                .iter()
                .map(|t| Embedding::new(self.vector_for(t)))
                .collect(),
            model_version: self.model_version.clone(),
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }

    fn provider_name(&self) -> &str {
        "hash-embedder"
    }
}

/// An embedding provider that always fails with a transient error.
pub struct FailingEmbedder {
    dimensions: usize,
}

impl FailingEmbedder {
    /// Creates a failing embedder.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<EmbeddingBatch> {
        Err(ReconError::adapter_transient(
            "failing-embedder",
            "simulated outage",
        ))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_version(&self) -> &str {
        "failing-v1"
    }

    fn provider_name(&self) -> &str {
        "failing-embedder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn scripted_llm_serves_keyed_before_queued() {
        let llm = ScriptedLlm::new().with_response_for("BATCH-A", json!({"tag": "keyed"}));
        llm.push_json(json!({"tag": "queued"}));

        #[derive(serde::Deserialize)]
        struct Tagged {
            tag: String,
        }

        let keyed: Tagged = llm
            .complete_structured("prompt mentioning BATCH-A", &LlmOptions::default())
            .await
            .unwrap();
        assert_eq!(keyed.tag, "keyed");

        let queued: Tagged = llm
            .complete_structured("unrelated prompt", &LlmOptions::default())
            .await
            .unwrap();
        assert_eq!(queued.tag, "queued");
        assert_eq!(llm.prompts().len(), 2);
    }

    #[tokio::test]
    async fn scripted_llm_schema_mismatch_is_permanent() {
        let llm = ScriptedLlm::new();
        llm.push_json(json!({"unexpected": true}));

        #[derive(serde::Deserialize, Debug)]
        struct Strict {
            #[expect(dead_code)]
            required: String,
        }

        let err = llm
            .complete_structured::<Strict>("p", &LlmOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::AdapterPermanent { .. }));
    }

    #[tokio::test]
    async fn hash_embedder_is_deterministic_and_distinct() {
        let embedder = HashEmbedder::new(32);
        let a1 = embedder.vector_for("payment clause");
        let a2 = embedder.vector_for("payment clause");
        let b = embedder.vector_for("termination clause");
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[tokio::test]
    async fn hash_embedder_respects_overrides() {
        let embedder = HashEmbedder::new(4).with_vector("pinned", vec![1.0, 0.0, 0.0, 0.0]);
        let batch = embedder.embed(&["pinned".to_string()]).await.unwrap();
        assert_eq!(batch.vectors[0].vector, vec![1.0, 0.0, 0.0, 0.0]);
    }
}
