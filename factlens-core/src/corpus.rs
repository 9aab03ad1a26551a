//! Corpus store: the ordered document collection evidence is drawn from.
//!
//! Position `i` in a [`CorpusStore`] corresponds to row `i` of the vector
//! index built from it. The store itself is immutable once loaded; merging
//! produces a new store, which must be re-indexed through
//! [`KnowledgeBase::build`](crate::knowledge::KnowledgeBase::build).

use crate::error::CorpusError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// A single corpus document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: String::new(),
            url: String::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// Ordered, read-only collection of documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusStore {
    documents: Vec<Document>,
}

impl CorpusStore {
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Load a corpus from a JSON array of document objects.
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        if !path.exists() {
            return Err(CorpusError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| CorpusError::Parse {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let store = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            documents = store.len(),
            "Loaded corpus"
        );
        Ok(store)
    }

    /// Parse a corpus from JSON text.
    ///
    /// Entries missing a `text` field are kept with empty text so positions
    /// stay stable; entries missing an `id` receive `doc-<position>`. Entries
    /// that are not JSON objects are skipped.
    pub fn from_json(content: &str) -> Result<Self, CorpusError> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| CorpusError::Parse {
                message: e.to_string(),
            })?;
        let entries = value.as_array().ok_or_else(|| CorpusError::Parse {
            message: "corpus must be a JSON array of documents".into(),
        })?;

        let mut documents = Vec::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            match parse_document(position, entry) {
                Ok(doc) => documents.push(doc),
                Err(e) => tracing::warn!("Skipping corpus entry: {}", e),
            }
        }
        Ok(Self { documents })
    }

    /// Append another corpus after this one, preserving both orders.
    pub fn merge(mut self, other: CorpusStore) -> Self {
        self.documents.extend(other.documents);
        self
    }

    /// Write the corpus back out as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), CorpusError> {
        let json = serde_json::to_string_pretty(&self.documents).map_err(|e| {
            CorpusError::Parse {
                message: e.to_string(),
            }
        })?;
        std::fs::write(path, json).map_err(|e| CorpusError::Parse {
            message: format!("failed to write {}: {}", path.display(), e),
        })
    }

    pub fn get(&self, position: usize) -> Option<&Document> {
        self.documents.get(position)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn texts(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.text.as_str()).collect()
    }

    /// SHA-256 over every field of every document in order, salted with the
    /// identity of the embedder that indexes them. Two stores with the same
    /// fingerprint index and cite identically.
    pub fn fingerprint(&self, embedder_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(embedder_id.as_bytes());
        hasher.update([0u8]);
        for doc in &self.documents {
            for field in [&doc.id, &doc.text, &doc.source, &doc.url] {
                hasher.update(field.as_bytes());
                hasher.update([0u8]);
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

fn parse_document(position: usize, entry: &serde_json::Value) -> Result<Document, CorpusError> {
    let obj = entry
        .as_object()
        .ok_or_else(|| CorpusError::MalformedDocument {
            position,
            reason: "entry is not an object".into(),
        })?;

    let field = |name: &str| obj.get(name).and_then(|v| v.as_str()).map(str::to_string);

    let text = field("text").unwrap_or_else(|| {
        tracing::warn!(position, "Corpus entry has no text field, using empty text");
        String::new()
    });
    let id = field("id").unwrap_or_else(|| format!("doc-{}", position));

    Ok(Document {
        id,
        text,
        source: field("source").unwrap_or_default(),
        url: field("url").unwrap_or_default(),
    })
}
