//! The verification pipeline: one service object holding the embedder,
//! knowledge base, classifier, and extractor, shared read-only across requests.
//!
//! Callers construct a [`FactChecker`] once (from configuration or from
//! injected parts) and pass it by handle. Requests run sequentially: claims
//! of a text are verified one at a time in extraction order.

use crate::config::FactlensConfig;
use crate::corpus::CorpusStore;
use crate::embeddings::{Embedder, create_embedder};
use crate::entailment::{EntailmentClassifier, create_classifier};
use crate::error::{ConfigError, Result};
use crate::extractor::{ClaimExtractor, HeuristicClaimExtractor};
use crate::knowledge::KnowledgeBase;
use crate::retriever::{EvidenceItem, EvidenceRetriever};
use crate::trust::TrustSummary;
use crate::verifier::{ClaimVerifier, Verdict, VerifierConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Result of checking a block of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextReport {
    /// One verdict per extracted claim, in text order.
    pub claims: Vec<Verdict>,
    pub trust_score: f64,
    pub summary: TrustSummary,
}

impl TextReport {
    pub fn from_verdicts(claims: Vec<Verdict>) -> Self {
        let summary = TrustSummary::from_verdicts(&claims);
        Self {
            trust_score: summary.trust_score(),
            summary,
            claims,
        }
    }
}

/// Evidence-grounded claim checker.
pub struct FactChecker {
    verifier: ClaimVerifier,
    extractor: Arc<dyn ClaimExtractor>,
}

impl FactChecker {
    pub fn new(
        retriever: Arc<EvidenceRetriever>,
        classifier: Arc<dyn EntailmentClassifier>,
        extractor: Arc<dyn ClaimExtractor>,
        verifier_config: VerifierConfig,
    ) -> Self {
        Self {
            verifier: ClaimVerifier::new(retriever, classifier, verifier_config),
            extractor,
        }
    }

    /// Build every component from configuration.
    ///
    /// Rejects a configuration that fails [`FactlensConfig::validate`]. Loads
    /// (and merges) the configured corpora, then opens the persisted index or
    /// rebuilds it when the corpus or embedder changed.
    pub async fn from_config(config: &FactlensConfig, workspace: &Path) -> Result<Self> {
        let problems = config.validate();
        if !problems.is_empty() {
            return Err(ConfigError::Invalid {
                message: problems.join("; "),
            }
            .into());
        }

        let embedder = create_embedder(&config.embedding);
        let classifier = create_classifier(&config.classifier)?;
        let corpus = load_corpus(config, workspace)?;

        let knowledge = KnowledgeBase::open_or_build(
            corpus,
            &config.retrieval.index_path(workspace),
            embedder.as_ref(),
            config.embedding.batch_size,
        )
        .await?;

        let retriever = EvidenceRetriever::with_knowledge(embedder, Arc::new(knowledge))?
            .with_default_top_k(config.retrieval.top_k);

        tracing::info!(
            documents = retriever.knowledge().map(|kb| kb.len()).unwrap_or(0),
            classifier = classifier.model_name(),
            top_k = config.retrieval.top_k,
            "Fact checker ready"
        );

        Ok(Self::new(
            Arc::new(retriever),
            classifier,
            Arc::new(HeuristicClaimExtractor::new(&config.extractor)),
            config.verifier.clone(),
        ))
    }

    pub fn retriever(&self) -> &Arc<EvidenceRetriever> {
        self.verifier.retriever()
    }

    pub fn classifier(&self) -> &Arc<dyn EntailmentClassifier> {
        self.verifier.classifier()
    }

    pub fn extract_claims(&self, text: &str) -> Vec<String> {
        self.extractor.extract(text)
    }

    /// Plain semantic search over the corpus.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<EvidenceItem>> {
        Ok(self.retriever().retrieve(query, k).await?)
    }

    pub async fn verify_claim(&self, claim: &str) -> Result<Verdict> {
        self.verifier.verify(claim).await
    }

    /// Verify claims one at a time, in order.
    pub async fn verify_claims(&self, claims: &[String]) -> Result<Vec<Verdict>> {
        let mut verdicts = Vec::with_capacity(claims.len());
        for claim in claims {
            verdicts.push(self.verifier.verify(claim).await?);
        }
        Ok(verdicts)
    }

    /// Extract claims from `text`, verify each, and score the result.
    ///
    /// Text without claim-like sentences yields an empty report with a trust
    /// score of 0.
    pub async fn check_text(&self, text: &str) -> Result<TextReport> {
        let claims = self.extract_claims(text);
        tracing::info!(claims = claims.len(), "Extracted claims");
        let verdicts = self.verify_claims(&claims).await?;
        let report = TextReport::from_verdicts(verdicts);
        tracing::info!(
            trust_score = report.trust_score,
            supported = report.summary.supported,
            total = report.summary.total,
            "Checked text"
        );
        Ok(report)
    }
}

/// Load the primary corpus followed by any additional corpora.
pub fn load_corpus(config: &FactlensConfig, workspace: &Path) -> Result<CorpusStore> {
    let mut corpus = CorpusStore::default();
    for path in config.retrieval.corpus_paths(workspace) {
        let next = CorpusStore::load(&path)?;
        tracing::debug!(path = %path.display(), documents = next.len(), "Loaded corpus file");
        corpus = corpus.merge(next);
    }
    Ok(corpus)
}

/// Outcome of one readiness probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub component: String,
    pub detail: String,
    pub ok: bool,
}

impl ProbeResult {
    fn pass(component: &str, detail: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            detail: detail.into(),
            ok: true,
        }
    }

    fn fail(component: &str, detail: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            detail: detail.into(),
            ok: false,
        }
    }
}

/// Probe the configured corpus, embedder, and classifier independently.
pub async fn diagnose(config: &FactlensConfig, workspace: &Path) -> Vec<ProbeResult> {
    let mut results = Vec::new();

    for problem in config.validate() {
        results.push(ProbeResult::fail("config", problem));
    }

    results.push(match load_corpus(config, workspace) {
        Ok(corpus) => ProbeResult::pass("corpus", format!("{} documents", corpus.len())),
        Err(e) => ProbeResult::fail("corpus", e.to_string()),
    });

    let embedder = create_embedder(&config.embedding);
    results.push(probe_embedder(embedder.as_ref()).await);

    results.push(match create_classifier(&config.classifier) {
        Ok(classifier) => match classifier.health_check().await {
            Ok(()) => ProbeResult::pass("classifier", classifier.model_name().to_string()),
            Err(e) => ProbeResult::fail("classifier", e.to_string()),
        },
        Err(e) => ProbeResult::fail("classifier", e.to_string()),
    });

    results
}

async fn probe_embedder(embedder: &dyn Embedder) -> ProbeResult {
    match embedder.embed("Language models can hallucinate.").await {
        Ok(v) if v.len() == embedder.dimensions() => ProbeResult::pass(
            "embedder",
            format!("{} ({} dimensions)", embedder.provider_name(), v.len()),
        ),
        Ok(v) => ProbeResult::fail(
            "embedder",
            format!(
                "{} returned {} dimensions, expected {}",
                embedder.provider_name(),
                v.len(),
                embedder.dimensions()
            ),
        ),
        Err(e) => ProbeResult::fail("embedder", e.to_string()),
    }
}
