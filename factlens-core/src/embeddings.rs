//! Pluggable embedding providers for evidence retrieval.
//!
//! Provides a trait-based abstraction over embedding models, with implementations
//! for local hashed term-frequency vectors (always available), FastEmbed (optional,
//! behind the `semantic-search` feature), the OpenAI API, and the Ollama API.
//!
//! Providers must be deterministic for a given model version: the vector index is
//! built with the same provider that later embeds claims, and the provider name and
//! model id are recorded alongside the persisted index.

use crate::error::EmbeddingError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Return the dimensionality of embeddings.
    fn dimensions(&self) -> usize;

    /// Return the provider name.
    fn provider_name(&self) -> &str;

    /// Return the model identifier. Two embedders with the same provider,
    /// model, and dimensions produce interchangeable vectors.
    fn model_id(&self) -> &str;
}

/// Configuration for embedding providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: "local" (default), "fastembed", "openai", "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Provider-specific model name.
    #[serde(default)]
    pub model: Option<String>,
    /// Embedding dimensions (auto-detected from provider if 0).
    #[serde(default)]
    pub dimensions: usize,
    /// Batch size for bulk embedding operations during index builds.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Environment variable holding the API key for hosted providers.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Override the provider base URL.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "local".into()
}

fn default_batch_size() -> usize {
    32
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".into(),
            model: None,
            dimensions: 0,
            batch_size: 32,
            api_key_env: default_api_key_env(),
            base_url: None,
        }
    }
}

/// Local hashed term-frequency embedder (always available, no external dependencies).
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimensions: usize,
}

impl LocalEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Embed synchronously. Each word is hashed to a dimension index, its term
    /// frequency accumulated, and the resulting vector L2-normalised.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return vector;
        }

        let mut tf: HashMap<&str, usize> = HashMap::new();
        for word in &words {
            *tf.entry(word).or_insert(0) += 1;
        }

        for (term, count) in &tf {
            let idx = simple_hash(term) % self.dimensions;
            vector[idx] += *count as f32;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

fn simple_hash(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "local"
    }

    fn model_id(&self) -> &str {
        "hashed-tf"
    }
}

/// FastEmbed embedder (behind `semantic-search` feature flag).
/// Uses the `fastembed` crate with local ONNX models; defaults to all-MiniLM-L6-v2.
#[cfg(feature = "semantic-search")]
pub struct FastEmbedder {
    model: fastembed::TextEmbedding,
    model_name: &'static str,
    dims: usize,
}

#[cfg(feature = "semantic-search")]
impl FastEmbedder {
    pub fn new(model_name: Option<&str>) -> Result<Self, EmbeddingError> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let (model_enum, resolved) = match model_name {
            Some("all-MiniLM-L6-v2") | None => (EmbeddingModel::AllMiniLML6V2, "all-MiniLM-L6-v2"),
            Some("bge-small-en-v1.5") => (EmbeddingModel::BGESmallENV15, "bge-small-en-v1.5"),
            Some("bge-base-en-v1.5") => (EmbeddingModel::BGEBaseENV15, "bge-base-en-v1.5"),
            Some(other) => {
                tracing::warn!(
                    "Unknown fastembed model '{}', falling back to AllMiniLML6V2",
                    other
                );
                (EmbeddingModel::AllMiniLML6V2, "all-MiniLM-L6-v2")
            }
        };

        let model = TextEmbedding::try_new(
            InitOptions::new(model_enum).with_show_download_progress(true),
        )
        .map_err(|e| EmbeddingError::Unavailable {
            provider: "fastembed".into(),
            message: e.to_string(),
        })?;

        // Detect dimensions from a probe embedding
        let probe = model
            .embed(vec!["probe"], None)
            .map_err(|e| EmbeddingError::Unavailable {
                provider: "fastembed".into(),
                message: e.to_string(),
            })?;
        let dims = probe.first().map(|v| v.len()).unwrap_or(384);

        Ok(Self {
            model,
            model_name: resolved,
            dims,
        })
    }
}

#[cfg(feature = "semantic-search")]
#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut batch = self.embed_batch(&[text]).await?;
        batch.pop().ok_or_else(|| EmbeddingError::Request {
            message: "fastembed returned no embedding".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Request {
                message: e.to_string(),
            })
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }

    fn model_id(&self) -> &str {
        self.model_name
    }
}

/// OpenAI API embedder (uses text-embedding-3-small by default).
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    base_url: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "text-embedding-3-small".into());
        let dims = match model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536,
        };
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            dims,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".into()),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut batch = self.embed_batch(&[text]).await?;
        batch.pop().ok_or_else(|| EmbeddingError::Request {
            message: "OpenAI returned no embedding".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| unavailable("openai", e))?;

        if !resp.status().is_success() {
            return Err(EmbeddingError::Request {
                message: format!("OpenAI embeddings returned HTTP {}", resp.status()),
            });
        }

        let json: serde_json::Value = resp.json().await.map_err(|e| EmbeddingError::Request {
            message: e.to_string(),
        })?;
        let data = json["data"]
            .as_array()
            .ok_or_else(|| EmbeddingError::Request {
                message: "OpenAI response has no 'data' array".into(),
            })?;

        let vectors: Vec<Vec<f32>> = data
            .iter()
            .map(|item| parse_vector(&item["embedding"]))
            .collect();
        check_batch(vectors, texts.len(), self.dims)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Ollama embedder (uses local Ollama API).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    model: String,
    dims: usize,
    base_url: String,
}

impl OllamaEmbedder {
    pub fn new(model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "all-minilm".into());
        let dims = match model.as_str() {
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 768,
        };
        Self {
            client: reqwest::Client::new(),
            model,
            dims,
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".into()),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut batch = self.embed_batch(&[text]).await?;
        batch.pop().ok_or_else(|| EmbeddingError::Request {
            message: "Ollama returned no embedding".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| unavailable("ollama", e))?;

        if !resp.status().is_success() {
            return Err(EmbeddingError::Request {
                message: format!("Ollama embed returned HTTP {}", resp.status()),
            });
        }

        let json: serde_json::Value = resp.json().await.map_err(|e| EmbeddingError::Request {
            message: e.to_string(),
        })?;
        let embeddings = json["embeddings"]
            .as_array()
            .ok_or_else(|| EmbeddingError::Request {
                message: "Ollama response has no 'embeddings' array".into(),
            })?;

        let vectors: Vec<Vec<f32>> = embeddings.iter().map(parse_vector).collect();
        check_batch(vectors, texts.len(), self.dims)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn unavailable(provider: &str, err: reqwest::Error) -> EmbeddingError {
    EmbeddingError::Unavailable {
        provider: provider.to_string(),
        message: err.to_string(),
    }
}

fn parse_vector(value: &serde_json::Value) -> Vec<f32> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect()
        })
        .unwrap_or_default()
}

fn check_batch(
    vectors: Vec<Vec<f32>>,
    expected_len: usize,
    dims: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if vectors.len() != expected_len {
        return Err(EmbeddingError::Request {
            message: format!(
                "expected {} embeddings, provider returned {}",
                expected_len,
                vectors.len()
            ),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dims,
            actual: bad.len(),
        });
    }
    Ok(vectors)
}

fn local_fallback(config: &EmbeddingConfig) -> Arc<dyn Embedder> {
    let dims = if config.dimensions > 0 {
        config.dimensions
    } else {
        128
    };
    Arc::new(LocalEmbedder::new(dims))
}

/// Factory function to create an embedder based on configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Arc<dyn Embedder> {
    match config.provider.as_str() {
        #[cfg(feature = "semantic-search")]
        "fastembed" => match FastEmbedder::new(config.model.as_deref()) {
            Ok(embedder) => Arc::new(embedder),
            Err(e) => {
                tracing::warn!(
                    "Failed to create FastEmbedder: {}, falling back to local",
                    e
                );
                local_fallback(config)
            }
        },
        #[cfg(not(feature = "semantic-search"))]
        "fastembed" => {
            tracing::warn!(
                "FastEmbed requested but 'semantic-search' feature is not enabled, falling back to local"
            );
            local_fallback(config)
        }
        "openai" => {
            let api_key = std::env::var(&config.api_key_env).unwrap_or_default();
            if api_key.is_empty() {
                tracing::warn!(
                    "{} not set, falling back to local embedder",
                    config.api_key_env
                );
                local_fallback(config)
            } else {
                Arc::new(OpenAiEmbedder::new(
                    api_key,
                    config.model.clone(),
                    config.base_url.clone(),
                ))
            }
        }
        "ollama" => Arc::new(OllamaEmbedder::new(
            config.model.clone(),
            config.base_url.clone(),
        )),
        _ => local_fallback(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_embedder_dimensions() {
        let embedder = LocalEmbedder::new(128);
        assert_eq!(embedder.dimensions(), 128);
        let v = embedder.embed_text("hello world");
        assert_eq!(v.len(), 128);
    }

    #[test]
    fn test_local_embedder_normalized() {
        let embedder = LocalEmbedder::new(128);
        let v = embedder.embed_text("test input text for normalization");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 0.01,
            "Expected normalized vector, got norm={}",
            norm
        );
    }

    #[test]
    fn test_local_embedder_empty_text() {
        let embedder = LocalEmbedder::new(128);
        let v = embedder.embed_text("");
        assert_eq!(v.len(), 128);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_local_embedder_zero_dimensions_clamped() {
        let embedder = LocalEmbedder::new(0);
        assert_eq!(embedder.dimensions(), 1);
    }

    #[tokio::test]
    async fn test_local_embedder_deterministic() {
        let embedder = LocalEmbedder::new(128);
        let v1 = embedder.embed("same text").await.unwrap();
        let v2 = embedder.embed("same text").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_local_embedder_different_texts_differ() {
        let embedder = LocalEmbedder::new(128);
        let v1 = embedder.embed("hello world").await.unwrap();
        let v2 = embedder.embed("goodbye universe").await.unwrap();
        assert_ne!(v1, v2);
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let embedder = LocalEmbedder::new(64);
        let texts = &["hello", "world", "test"];
        let embeddings = embedder.embed_batch(texts).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        for (text, emb) in texts.iter().zip(&embeddings) {
            assert_eq!(emb.len(), 64);
            assert_eq!(emb, &embedder.embed_text(text));
        }
    }

    #[tokio::test]
    async fn test_embedder_trait_object() {
        let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(128));
        assert_eq!(embedder.dimensions(), 128);
        assert_eq!(embedder.provider_name(), "local");
        let v = embedder.embed("test").await.unwrap();
        assert_eq!(v.len(), 128);
    }

    #[test]
    fn test_same_provider_models_are_distinguished() {
        let small = OpenAiEmbedder::new("key".into(), None, None);
        let ada = OpenAiEmbedder::new("key".into(), Some("text-embedding-ada-002".into()), None);
        assert_eq!(small.provider_name(), ada.provider_name());
        assert_eq!(small.dimensions(), ada.dimensions());
        assert_eq!(small.model_id(), "text-embedding-3-small");
        assert_ne!(small.model_id(), ada.model_id());
    }

    #[test]
    fn test_embedding_config_defaults() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "local");
        assert!(config.model.is_none());
        assert_eq!(config.dimensions, 0);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_embedding_config_deserialize_empty() {
        let config: EmbeddingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.provider, "local");
        assert_eq!(config.batch_size, 32);
    }

    #[test]
    fn test_create_embedder_default() {
        let config = EmbeddingConfig::default();
        let embedder = create_embedder(&config);
        assert_eq!(embedder.provider_name(), "local");
        assert_eq!(embedder.dimensions(), 128);
    }

    #[test]
    fn test_create_embedder_explicit_local() {
        let config = EmbeddingConfig {
            provider: "local".into(),
            dimensions: 256,
            ..Default::default()
        };
        let embedder = create_embedder(&config);
        assert_eq!(embedder.dimensions(), 256);
    }

    #[test]
    fn test_create_embedder_openai_no_key() {
        let config = EmbeddingConfig {
            provider: "openai".into(),
            api_key_env: "FACTLENS_TEST_UNSET_EMBEDDING_KEY".into(),
            ..Default::default()
        };
        let embedder = create_embedder(&config);
        assert_eq!(embedder.provider_name(), "local");
    }

    #[cfg(not(feature = "semantic-search"))]
    #[test]
    fn test_create_embedder_fastembed_without_feature() {
        let config = EmbeddingConfig {
            provider: "fastembed".into(),
            ..Default::default()
        };
        let embedder = create_embedder(&config);
        assert_eq!(embedder.provider_name(), "local");
    }

    #[test]
    fn test_ollama_embedder_dimensions() {
        let embedder = OllamaEmbedder::new(None, None);
        assert_eq!(embedder.dimensions(), 384); // all-minilm default
    }

    #[test]
    fn test_openai_embedder_dimensions() {
        let embedder = OpenAiEmbedder::new("test-key".into(), None, None);
        assert_eq!(embedder.dimensions(), 1536); // text-embedding-3-small default
    }

    #[test]
    fn test_check_batch_rejects_wrong_dimensions() {
        let err = check_batch(vec![vec![0.0; 3]], 1, 4).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_check_batch_rejects_short_batch() {
        let err = check_batch(vec![vec![0.0; 4]], 2, 4).unwrap_err();
        assert!(matches!(err, EmbeddingError::Request { .. }));
    }
}
