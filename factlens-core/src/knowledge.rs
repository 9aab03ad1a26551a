//! Knowledge base: a corpus and its vector index, built and persisted as one unit.
//!
//! [`KnowledgeBase::build`] is the only way to produce an index: it embeds the
//! corpus texts in store order, so row `i` of the index is always document `i`.
//! Persistence writes documents and their embeddings into the same SQLite
//! rows, and loading validates the stored fingerprint so a changed corpus is
//! rebuilt rather than read against stale rows.

use crate::corpus::{CorpusStore, Document};
use crate::embeddings::Embedder;
use crate::error::{IndexError, Result};
use crate::index::FlatIndex;
use rusqlite::{Connection, params};
use std::collections::HashMap;
use std::path::Path;

const SCHEMA_VERSION: &str = "2";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS documents (
    row       INTEGER PRIMARY KEY,
    id        TEXT NOT NULL,
    text      TEXT NOT NULL,
    source    TEXT NOT NULL,
    url       TEXT NOT NULL,
    embedding BLOB NOT NULL
);
";

/// A corpus together with the index built from it.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    corpus: CorpusStore,
    index: FlatIndex,
    provider: String,
    model: String,
    fingerprint: String,
}

/// `provider/model`, the salt that ties an index to the embedder that built it.
pub fn embedder_identity(embedder: &dyn Embedder) -> String {
    format!("{}/{}", embedder.provider_name(), embedder.model_id())
}

impl KnowledgeBase {
    /// Embed every document in corpus order and build the index.
    ///
    /// Building twice from the same corpus with the same embedder yields the
    /// same rows in the same order.
    pub async fn build(
        corpus: CorpusStore,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self> {
        let started = std::time::Instant::now();
        let mut index = FlatIndex::new(embedder.dimensions());

        if corpus.is_empty() {
            tracing::warn!("Building knowledge base from an empty corpus");
        }

        let texts = corpus.texts();
        for chunk in texts.chunks(batch_size.max(1)) {
            let vectors = embedder.embed_batch(chunk).await?;
            if vectors.len() != chunk.len() {
                return Err(IndexError::Corrupt {
                    message: format!(
                        "embedder returned {} vectors for a batch of {} texts",
                        vectors.len(),
                        chunk.len()
                    ),
                }
                .into());
            }
            for vector in &vectors {
                index.add(vector)?;
            }
        }

        let provider = embedder.provider_name().to_string();
        let model = embedder.model_id().to_string();
        let fingerprint = corpus.fingerprint(&embedder_identity(embedder));
        tracing::info!(
            documents = corpus.len(),
            dimensions = index.dimensions(),
            provider = %provider,
            model = %model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Built vector index"
        );

        Ok(Self {
            corpus,
            index,
            provider,
            model,
            fingerprint,
        })
    }

    /// Load a persisted knowledge base if it matches `corpus` and `embedder`,
    /// otherwise rebuild it and overwrite the file.
    pub async fn open_or_build(
        corpus: CorpusStore,
        path: &Path,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self> {
        if path.exists() {
            match Self::load(path) {
                Ok(kb) if kb.is_current(&corpus, embedder) => {
                    tracing::info!(path = %path.display(), "Loaded vector index");
                    return Ok(kb);
                }
                Ok(_) => {
                    tracing::info!(
                        path = %path.display(),
                        "Vector index is stale for the current corpus, rebuilding"
                    );
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Unreadable vector index ({}), rebuilding", e);
                }
            }
        }

        let kb = Self::build(corpus, embedder, batch_size).await?;
        kb.save(path)?;
        Ok(kb)
    }

    /// Whether this knowledge base was built from `corpus` with `embedder`.
    pub fn is_current(&self, corpus: &CorpusStore, embedder: &dyn Embedder) -> bool {
        self.provider == embedder.provider_name()
            && self.model == embedder.model_id()
            && self.index.dimensions() == embedder.dimensions()
            && self.fingerprint == corpus.fingerprint(&embedder_identity(embedder))
    }

    pub fn corpus(&self) -> &CorpusStore {
        &self.corpus
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// `provider/model` of the embedder this index was built with.
    pub fn embedder_identity(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    /// Persist documents, embeddings, and metadata to a SQLite file.
    pub fn save(&self, path: &Path) -> std::result::Result<(), IndexError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::Corrupt {
                message: format!("cannot create {}: {}", parent.display(), e),
            })?;
        }

        let mut conn = Connection::open(path)?;
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA)?;
        tx.execute("DELETE FROM documents", [])?;
        tx.execute("DELETE FROM meta", [])?;

        {
            let mut meta = tx.prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")?;
            meta.execute(params!["schema_version", SCHEMA_VERSION])?;
            meta.execute(params!["provider", self.provider])?;
            meta.execute(params!["model", self.model])?;
            meta.execute(params!["dimensions", self.index.dimensions().to_string()])?;
            meta.execute(params!["fingerprint", self.fingerprint])?;

            let mut insert = tx.prepare(
                "INSERT INTO documents (row, id, text, source, url, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (row, doc) in self.corpus.documents().iter().enumerate() {
                let vector = self.index.row(row).ok_or_else(|| IndexError::Corrupt {
                    message: format!("index has no row {}", row),
                })?;
                insert.execute(params![
                    row as i64,
                    doc.id,
                    doc.text,
                    doc.source,
                    doc.url,
                    encode_vector(vector),
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!(path = %path.display(), rows = self.len(), "Saved vector index");
        Ok(())
    }

    /// Load a knowledge base previously written by [`save`](Self::save).
    pub fn load(path: &Path) -> std::result::Result<Self, IndexError> {
        let conn = Connection::open(path)?;

        let meta: HashMap<String, String> = {
            let mut stmt = conn.prepare("SELECT key, value FROM meta")?;
            let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
            rows.collect::<std::result::Result<_, _>>()?
        };

        let required = |key: &str| {
            meta.get(key).cloned().ok_or_else(|| IndexError::Corrupt {
                message: format!("missing metadata key '{}'", key),
            })
        };

        let version = required("schema_version")?;
        if version != SCHEMA_VERSION {
            return Err(IndexError::Corrupt {
                message: format!("unsupported schema version {}", version),
            });
        }
        let provider = required("provider")?;
        let model = required("model")?;
        let fingerprint = required("fingerprint")?;
        let dimensions: usize = required("dimensions")?
            .parse()
            .map_err(|_| IndexError::Corrupt {
                message: "dimensions is not a number".into(),
            })?;

        let mut stmt = conn.prepare(
            "SELECT row, id, text, source, url, embedding FROM documents ORDER BY row ASC",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                Document {
                    id: r.get(1)?,
                    text: r.get(2)?,
                    source: r.get(3)?,
                    url: r.get(4)?,
                },
                r.get::<_, Vec<u8>>(5)?,
            ))
        })?;

        let mut documents = Vec::new();
        let mut index = FlatIndex::new(dimensions);
        for (expected, entry) in rows.enumerate() {
            let (row, doc, blob) = entry?;
            if row != expected as i64 {
                return Err(IndexError::Corrupt {
                    message: format!("row {} found where {} was expected", row, expected),
                });
            }
            let vector = decode_vector(&blob, dimensions)?;
            index.add(&vector)?;
            documents.push(doc);
        }

        Ok(Self {
            corpus: CorpusStore::from_documents(documents),
            index,
            provider,
            model,
            fingerprint,
        })
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8], dimensions: usize) -> std::result::Result<Vec<f32>, IndexError> {
    if blob.len() != dimensions * 4 {
        return Err(IndexError::Corrupt {
            message: format!(
                "embedding blob has {} bytes, expected {}",
                blob.len(),
                dimensions * 4
            ),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
