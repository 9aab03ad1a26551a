//! Error types for the factlens core library.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering retrieval, entailment classification, embeddings, the corpus,
//! index persistence, and configuration.
//!
//! A claim without evidence is not an error: it produces a
//! "Not enough information" verdict.

use std::path::PathBuf;

/// Top-level error type for the factlens core library.
#[derive(Debug, thiserror::Error)]
pub enum FactlensError {
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from evidence retrieval.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Vector index is not built or loaded")]
    IndexUnavailable,

    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("top_k must be at least 1, got {k}")]
    InvalidTopK { k: usize },

    #[error("Index was built with '{index_embedder}' but the embedder is '{embedder}'")]
    IncompatibleIndex {
        index_embedder: String,
        embedder: String,
    },

    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Errors from the entailment classifier.
///
/// `Unavailable` is fatal for a verification request. `Inference` and
/// `ResponseParse` describe a single failed (premise, hypothesis) pair and
/// are absorbed by the verifier, which skips the pair.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Entailment classifier '{provider}' is unavailable: {message}")]
    Unavailable { provider: String, message: String },

    #[error("Inference failed: {message}")]
    Inference { message: String },

    #[error("Classifier response parse error: {message}")]
    ResponseParse { message: String },
}

impl ClassifierError {
    /// Whether this error invalidates the whole verification request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Errors from embedding providers.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding provider '{provider}' is unavailable: {message}")]
    Unavailable { provider: String, message: String },

    #[error("Embedding request failed: {message}")]
    Request { message: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors from loading or assembling the document corpus.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("Corpus file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Corpus parse error: {message}")]
    Parse { message: String },

    #[error("Malformed document at position {position}: {reason}")]
    MalformedDocument { position: usize, reason: String },
}

/// Errors from the vector index and its on-disk store.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Index database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Index file is corrupt: {message}")]
    Corrupt { message: String },

    #[error("Vector dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `FactlensError`.
pub type Result<T> = std::result::Result<T, FactlensError>;
