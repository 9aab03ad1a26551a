//! # Factlens Core
//!
//! Core library for factlens, an evidence-grounded checker for factual claims
//! in generated text. Provides the corpus store and vector index, evidence
//! retrieval, entailment classification, claim verification, trust scoring,
//! and configuration.

pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod entailment;
pub mod error;
pub mod extractor;
pub mod index;
pub mod knowledge;
pub mod pipeline;
pub mod retriever;
pub mod trust;
pub mod verifier;

// Re-export commonly used types at the crate root.
pub use config::{FactlensConfig, RetrievalConfig, load_config};
pub use corpus::{CorpusStore, Document};
pub use embeddings::{Embedder, EmbeddingConfig, LocalEmbedder, create_embedder};
pub use entailment::{
    ClassifierConfig, EntailmentClassifier, HttpEntailmentClassifier, LabelScore,
    MockEntailmentClassifier, create_classifier,
};
pub use error::{FactlensError, Result};
pub use extractor::{ClaimExtractor, ExtractorConfig, HeuristicClaimExtractor};
pub use knowledge::KnowledgeBase;
pub use pipeline::{FactChecker, ProbeResult, TextReport};
pub use retriever::{EvidenceItem, EvidenceRetriever};
pub use trust::{TrustSummary, compute_trust_score};
pub use verifier::{ClaimVerifier, Verdict, VerdictLabel, VerifierConfig};
