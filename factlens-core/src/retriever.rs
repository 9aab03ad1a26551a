//! Evidence retrieval: embed a claim and look up its nearest corpus documents.

use crate::corpus::{CorpusStore, Document};
use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, IndexError, RetrievalError};
use crate::knowledge::{KnowledgeBase, embedder_identity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Number of evidence documents retrieved per claim unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 3;

/// A retrieved corpus document with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub text: String,
    pub source: String,
    pub id: String,
    pub url: String,
    /// Squared L2 distance between the claim and this document.
    pub distance: f32,
}

impl EvidenceItem {
    fn from_document(doc: &Document, distance: f32) -> Self {
        Self {
            text: doc.text.clone(),
            source: doc.source.clone(),
            id: doc.id.clone(),
            url: doc.url.clone(),
            distance,
        }
    }
}

/// Retrieves evidence from a knowledge base.
///
/// The knowledge base is set at most once per retriever; until then every
/// retrieval fails with [`RetrievalError::IndexUnavailable`].
pub struct EvidenceRetriever {
    embedder: Arc<dyn Embedder>,
    knowledge: OnceCell<Arc<KnowledgeBase>>,
    default_top_k: usize,
}

impl std::fmt::Debug for EvidenceRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceRetriever")
            .field("provider", &self.embedder.provider_name())
            .field("loaded", &self.is_loaded())
            .field("default_top_k", &self.default_top_k)
            .finish()
    }
}

impl EvidenceRetriever {
    /// Create a retriever with no index loaded yet.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            knowledge: OnceCell::new(),
            default_top_k: DEFAULT_TOP_K,
        }
    }

    /// Create a retriever over an already-built knowledge base.
    pub fn with_knowledge(
        embedder: Arc<dyn Embedder>,
        knowledge: Arc<KnowledgeBase>,
    ) -> Result<Self, RetrievalError> {
        let retriever = Self::new(embedder);
        retriever.attach(knowledge)?;
        Ok(retriever)
    }

    pub fn with_default_top_k(mut self, k: usize) -> Self {
        self.default_top_k = k;
        self
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn is_loaded(&self) -> bool {
        self.knowledge.initialized()
    }

    pub fn knowledge(&self) -> Option<&Arc<KnowledgeBase>> {
        self.knowledge.get()
    }

    /// Install a knowledge base. Fails if it was built with a different
    /// embedding provider or model; a second call after a successful one is
    /// ignored.
    pub fn attach(&self, knowledge: Arc<KnowledgeBase>) -> Result<(), RetrievalError> {
        self.check_compatible(&knowledge)?;
        if self.knowledge.set(knowledge).is_err() {
            tracing::debug!("Knowledge base already attached, keeping the existing one");
        }
        Ok(())
    }

    /// Build the knowledge base from `corpus` unless one is already loaded.
    pub async fn ensure_built(
        &self,
        corpus: CorpusStore,
        batch_size: usize,
    ) -> crate::error::Result<Arc<KnowledgeBase>> {
        let kb = self
            .knowledge
            .get_or_try_init(|| async {
                KnowledgeBase::build(corpus, self.embedder.as_ref(), batch_size)
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(kb))
    }

    /// Retrieve up to `k` evidence items for `claim`, most similar first.
    ///
    /// `k` is bounded by the corpus size. Padding rows and rows outside the
    /// corpus are dropped, so the result may be shorter than `k`.
    pub async fn retrieve(
        &self,
        claim: &str,
        k: usize,
    ) -> Result<Vec<EvidenceItem>, RetrievalError> {
        if k == 0 {
            return Err(RetrievalError::InvalidTopK { k });
        }
        if claim.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery {
                reason: "claim is empty".into(),
            });
        }
        let kb = self
            .knowledge
            .get()
            .ok_or(RetrievalError::IndexUnavailable)?;

        let k = k.min(kb.len().max(1));

        let query = self.embedder.embed(claim).await?;
        let neighbors = kb.index().search(&query, k).map_err(|e| match e {
            IndexError::DimensionMismatch { expected, actual } => {
                RetrievalError::Embedding(EmbeddingError::DimensionMismatch { expected, actual })
            }
            _ => RetrievalError::IndexUnavailable,
        })?;

        let corpus = kb.corpus();
        let mut evidence = Vec::with_capacity(k);
        for hit in neighbors {
            if !hit.is_match() {
                continue;
            }
            match corpus.get(hit.row as usize) {
                Some(doc) => evidence.push(EvidenceItem::from_document(doc, hit.distance)),
                None => tracing::warn!(
                    row = hit.row,
                    corpus_len = corpus.len(),
                    "Index returned a row outside the corpus, dropping it"
                ),
            }
        }

        tracing::debug!(
            claim = %claim,
            k,
            returned = evidence.len(),
            "Retrieved evidence"
        );
        Ok(evidence)
    }

    /// Retrieve with the configured default `k`.
    pub async fn retrieve_default(&self, claim: &str) -> Result<Vec<EvidenceItem>, RetrievalError> {
        self.retrieve(claim, self.default_top_k).await
    }

    fn check_compatible(&self, knowledge: &KnowledgeBase) -> Result<(), RetrievalError> {
        if knowledge.provider() != self.embedder.provider_name()
            || knowledge.model() != self.embedder.model_id()
        {
            return Err(RetrievalError::IncompatibleIndex {
                index_embedder: knowledge.embedder_identity(),
                embedder: embedder_identity(self.embedder.as_ref()),
            });
        }
        if knowledge.index().dimensions() != self.embedder.dimensions() {
            return Err(RetrievalError::Embedding(EmbeddingError::DimensionMismatch {
                expected: knowledge.index().dimensions(),
                actual: self.embedder.dimensions(),
            }));
        }
        Ok(())
    }
}
