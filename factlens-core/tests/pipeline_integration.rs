//! Integration tests for the factlens pipeline.
//!
//! These tests exercise corpus loading, index persistence, retrieval,
//! verification, and scoring end-to-end using the local embedder and
//! MockEntailmentClassifier.

use factlens_core::corpus::{CorpusStore, Document};
use factlens_core::embeddings::{Embedder, LocalEmbedder};
use factlens_core::entailment::{LabelScore, MockEntailmentClassifier};
use factlens_core::error::{FactlensError, RetrievalError};
use factlens_core::extractor::HeuristicClaimExtractor;
use factlens_core::knowledge::KnowledgeBase;
use factlens_core::pipeline::FactChecker;
use factlens_core::retriever::EvidenceRetriever;
use factlens_core::verifier::{VerdictLabel, VerifierConfig};
use factlens_core::{FactlensConfig, compute_trust_score};
use std::sync::Arc;

const HALLUCINATION: &str =
    "Large language models sometimes generate plausible but false statements called hallucinations.";
const RATES: &str = "Interest rates increased significantly last year.";
const SUN: &str = "The Sun is a star at the centre of the Solar System.";

fn corpus() -> CorpusStore {
    CorpusStore::from_documents(vec![
        Document::new("hallucination", HALLUCINATION)
            .with_source("Wikipedia")
            .with_url("https://en.wikipedia.org/wiki/Hallucination_(artificial_intelligence)"),
        Document::new("rates", RATES).with_source("internal"),
        Document::new("sun", SUN).with_source("Wikipedia"),
    ])
}

fn mock() -> MockEntailmentClassifier {
    MockEntailmentClassifier::new()
        .with_response(
            HALLUCINATION,
            vec![
                LabelScore::new("ENTAILMENT", 0.91),
                LabelScore::new("NEUTRAL", 0.06),
                LabelScore::new("CONTRADICTION", 0.03),
            ],
        )
        .with_response(
            RATES,
            vec![
                LabelScore::new("ENTAILMENT", 0.9),
                LabelScore::new("NEUTRAL", 0.07),
                LabelScore::new("CONTRADICTION", 0.03),
            ],
        )
        .with_response(
            SUN,
            vec![
                LabelScore::new("CONTRADICTION", 0.88),
                LabelScore::new("NEUTRAL", 0.1),
                LabelScore::new("ENTAILMENT", 0.02),
            ],
        )
}

async fn checker(top_k: usize) -> FactChecker {
    let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(256));
    let kb = KnowledgeBase::build(corpus(), embedder.as_ref(), 2)
        .await
        .unwrap();
    let retriever = EvidenceRetriever::with_knowledge(embedder, Arc::new(kb))
        .unwrap()
        .with_default_top_k(top_k);
    FactChecker::new(
        Arc::new(retriever),
        Arc::new(mock()),
        Arc::new(HeuristicClaimExtractor::default()),
        VerifierConfig::default(),
    )
}

#[tokio::test]
async fn test_supported_claim_end_to_end() {
    let checker = checker(1).await;
    let verdict = checker
        .verify_claim("Language models generate false statements called hallucinations.")
        .await
        .unwrap();
    assert_eq!(verdict.label, VerdictLabel::Supported);
    assert_eq!(verdict.confidence, 0.91);
    let evidence = verdict.evidence.unwrap();
    assert_eq!(evidence.id, "hallucination");
    assert_eq!(evidence.source, "Wikipedia");
}

#[tokio::test]
async fn test_numeric_claim_is_downgraded_end_to_end() {
    let checker = checker(1).await;
    let verdict = checker
        .verify_claim("Interest rates increased by 45% last year.")
        .await
        .unwrap();
    assert_eq!(verdict.label, VerdictLabel::NotEnoughInformation);
    assert_eq!(verdict.confidence, 0.4);
    assert_eq!(verdict.evidence.unwrap().id, "rates");
}

#[tokio::test]
async fn test_check_text_report() {
    let checker = checker(1).await;
    let text = "Research shows language models generate false statements called hallucinations. \
                The weather is nice. \
                According to astronomers, the Sun is a planet of the Solar System.";
    let report = checker.check_text(text).await.unwrap();

    let labels: Vec<VerdictLabel> = report.claims.iter().map(|v| v.label).collect();
    assert_eq!(
        labels,
        vec![VerdictLabel::Supported, VerdictLabel::Contradicted]
    );
    assert_eq!(report.trust_score, 50.0);
    assert_eq!(report.trust_score, compute_trust_score(&report.claims));
    assert_eq!(report.summary.contradicted, 1);
}

#[tokio::test]
async fn test_retrieval_before_build_is_unavailable() {
    let retriever = Arc::new(EvidenceRetriever::new(Arc::new(LocalEmbedder::new(16))));
    let checker = FactChecker::new(
        retriever.clone(),
        Arc::new(mock()),
        Arc::new(HeuristicClaimExtractor::default()),
        VerifierConfig::default(),
    );
    let err = checker.verify_claim("LLMs can hallucinate.").await.unwrap_err();
    assert!(matches!(
        err,
        FactlensError::Retrieval(RetrievalError::IndexUnavailable)
    ));

    // Building on demand makes the same checker usable.
    retriever.ensure_built(corpus(), 4).await.unwrap();
    assert!(checker.verify_claim("LLMs can hallucinate.").await.is_ok());
}

#[tokio::test]
async fn test_persisted_index_round_trips_and_detects_staleness() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corpus.index.db");
    let embedder = LocalEmbedder::new(64);

    let built = KnowledgeBase::open_or_build(corpus(), &path, &embedder, 8)
        .await
        .unwrap();
    let loaded = KnowledgeBase::load(&path).unwrap();
    assert_eq!(loaded.fingerprint(), built.fingerprint());
    assert_eq!(loaded.index(), built.index());
    assert_eq!(loaded.corpus(), built.corpus());

    let grown = corpus().merge(CorpusStore::from_documents(vec![Document::new(
        "extra",
        "Citation errors are common in generated text.",
    )]));
    assert!(!loaded.is_current(&grown, &embedder));

    let rebuilt = KnowledgeBase::open_or_build(grown, &path, &embedder, 8)
        .await
        .unwrap();
    assert_eq!(rebuilt.len(), 4);
    assert_eq!(KnowledgeBase::load(&path).unwrap().len(), 4);
}

#[tokio::test]
async fn test_from_config_with_merged_corpora() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("data")).unwrap();
    corpus()
        .save(&dir.path().join("data/corpus.json"))
        .unwrap();
    std::fs::write(
        dir.path().join("data/extra.json"),
        r#"[{"id": "extra", "text": "Citation errors are common in generated text."}, {"id": "blank"}]"#,
    )
    .unwrap();

    let mut config = FactlensConfig::default();
    config.classifier.provider = "mock".into();
    config.retrieval.additional_corpora = vec!["data/extra.json".into()];

    let checker = FactChecker::from_config(&config, dir.path()).await.unwrap();
    let kb = checker.retriever().knowledge().unwrap();
    assert_eq!(kb.len(), 5);
    assert_eq!(kb.corpus().get(3).unwrap().id, "extra");
    assert_eq!(kb.corpus().get(4).unwrap().text, "");

    let hits = checker.search("Citation errors are common", 1).await.unwrap();
    assert_eq!(hits[0].id, "extra");
}
