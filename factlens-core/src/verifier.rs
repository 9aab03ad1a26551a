//! Claim verification: classify a claim against its retrieved evidence and
//! reduce the results to a single [`Verdict`].
//!
//! # Selection
//!
//! Every (evidence, label) score is folded into one running best triple that
//! starts at `("Not enough information", 0.0, none)`. A score replaces the
//! incumbent only when it is strictly greater, so ties keep the earliest
//! evidence item and, within it, the earliest label in the classifier's order.
//! This is a global maximum over all pairs, not a per-document vote.
//!
//! # Numeric downgrade
//!
//! A `Supported` result whose claim contains a digit but whose selected
//! evidence contains none becomes `Not enough information`, and its raw
//! confidence is capped (0.6 by default).
//!
//! # Displayed confidence
//!
//! For `Not enough information` the displayed confidence is `1 - raw`, i.e. a
//! measure of uncertainty rather than of support. A downgraded claim at raw
//! 0.9 is therefore shown as 0.4, and a claim with no usable evidence is
//! shown as 1.0. For the other labels the raw score is shown unchanged. The
//! displayed value is a presentation policy, not a calibrated probability.

use crate::entailment::{EntailmentClassifier, LabelScore};
use crate::error::{ClassifierError, Result};
use crate::retriever::{EvidenceItem, EvidenceRetriever};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock};

static DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d").expect("valid regex"));

/// Whether `text` contains at least one decimal digit (any script).
pub fn contains_digit(text: &str) -> bool {
    DIGIT.is_match(text)
}

/// Final classification of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerdictLabel {
    Supported,
    Contradicted,
    #[serde(rename = "Not enough information")]
    NotEnoughInformation,
}

impl VerdictLabel {
    /// Map a raw classifier label. Matching is case-insensitive; anything
    /// other than entailment or contradiction is `NotEnoughInformation`.
    pub fn from_raw(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("entailment") {
            Self::Supported
        } else if raw.eq_ignore_ascii_case("contradiction") {
            Self::Contradicted
        } else {
            Self::NotEnoughInformation
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supported => "Supported",
            Self::Contradicted => "Contradicted",
            Self::NotEnoughInformation => "Not enough information",
        }
    }

    pub fn explanation(&self) -> &'static str {
        match self {
            Self::Supported => "Claim is supported by retrieved evidence from the corpus.",
            Self::Contradicted => "Retrieved evidence contradicts the claim.",
            Self::NotEnoughInformation => {
                "No sufficient supporting evidence found in the indexed corpus."
            }
        }
    }
}

impl fmt::Display for VerdictLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of verifying one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub claim: String,
    pub label: VerdictLabel,
    /// Displayed confidence, see the module docs for the inversion rule.
    pub confidence: f64,
    /// Selected score after the numeric cap, before inversion and rounding.
    pub raw_confidence: f64,
    pub evidence: Option<EvidenceItem>,
    pub explanation: String,
}

/// Tuning for the verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Upper bound on the raw confidence of a numerically downgraded claim.
    #[serde(default = "default_numeric_confidence_cap")]
    pub numeric_confidence_cap: f64,
    /// Decimal places kept in the displayed confidence.
    #[serde(default = "default_confidence_decimals")]
    pub confidence_decimals: u32,
}

fn default_numeric_confidence_cap() -> f64 {
    0.6
}

fn default_confidence_decimals() -> u32 {
    3
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            numeric_confidence_cap: default_numeric_confidence_cap(),
            confidence_decimals: default_confidence_decimals(),
        }
    }
}

/// Running best (label, confidence, evidence) triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestLabel {
    pub label: VerdictLabel,
    pub confidence: f64,
    /// Position of the selected evidence item, if any score was positive.
    pub evidence: Option<usize>,
}

impl Default for BestLabel {
    fn default() -> Self {
        Self {
            label: VerdictLabel::NotEnoughInformation,
            confidence: 0.0,
            evidence: None,
        }
    }
}

impl BestLabel {
    /// Fold one evidence item's label distribution into the running best.
    pub fn observe(&mut self, evidence: usize, scores: &[LabelScore]) {
        for score in scores {
            let value = f64::from(score.score);
            if value > self.confidence {
                *self = Self {
                    label: VerdictLabel::from_raw(&score.label),
                    confidence: value,
                    evidence: Some(evidence),
                };
            }
        }
    }

    /// Fold a whole ordered sequence of (evidence position, distribution).
    pub fn select<'a, I>(classified: I) -> Self
    where
        I: IntoIterator<Item = (usize, &'a [LabelScore])>,
    {
        classified
            .into_iter()
            .fold(Self::default(), |mut best, (evidence, scores)| {
                best.observe(evidence, scores);
                best
            })
    }
}

/// Downgrade an unsupported numeric claim. Returns the (label, raw confidence)
/// to report.
pub fn numeric_downgrade(
    label: VerdictLabel,
    confidence: f64,
    claim: &str,
    evidence_text: &str,
    cap: f64,
) -> (VerdictLabel, f64) {
    if label == VerdictLabel::Supported && contains_digit(claim) && !contains_digit(evidence_text)
    {
        (VerdictLabel::NotEnoughInformation, confidence.min(cap))
    } else {
        (label, confidence)
    }
}

/// Confidence shown to the caller for a final label and raw score.
pub fn display_confidence(label: VerdictLabel, raw: f64, decimals: u32) -> f64 {
    let shown = match label {
        VerdictLabel::NotEnoughInformation => 1.0 - raw,
        _ => raw,
    };
    round_to(shown, decimals)
}

pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals.min(15) as i32);
    (value * factor).round() / factor
}

/// Verifies claims against evidence from an [`EvidenceRetriever`].
pub struct ClaimVerifier {
    retriever: Arc<EvidenceRetriever>,
    classifier: Arc<dyn EntailmentClassifier>,
    config: VerifierConfig,
}

impl ClaimVerifier {
    pub fn new(
        retriever: Arc<EvidenceRetriever>,
        classifier: Arc<dyn EntailmentClassifier>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            retriever,
            classifier,
            config,
        }
    }

    pub fn retriever(&self) -> &Arc<EvidenceRetriever> {
        &self.retriever
    }

    pub fn classifier(&self) -> &Arc<dyn EntailmentClassifier> {
        &self.classifier
    }

    /// Retrieve evidence with the default `k` and verify `claim` against it.
    pub async fn verify(&self, claim: &str) -> Result<Verdict> {
        self.verify_with_top_k(claim, self.retriever.default_top_k())
            .await
    }

    pub async fn verify_with_top_k(&self, claim: &str, k: usize) -> Result<Verdict> {
        let evidence = self.retriever.retrieve(claim, k).await?;
        Ok(self.verify_against(claim, evidence).await?)
    }

    /// Verify `claim` against an explicit evidence list, in list order.
    ///
    /// Items with empty text are not classified. A classifier failure on one
    /// item skips that item; an unavailable classifier fails the request.
    pub async fn verify_against(
        &self,
        claim: &str,
        evidence: Vec<EvidenceItem>,
    ) -> std::result::Result<Verdict, ClassifierError> {
        let mut best = BestLabel::default();

        for (position, item) in evidence.iter().enumerate() {
            if item.text.trim().is_empty() {
                tracing::debug!(id = %item.id, "Skipping evidence with empty text");
                continue;
            }
            match self.classifier.classify(&item.text, claim).await {
                Ok(scores) => {
                    tracing::debug!(
                        id = %item.id,
                        scores = ?scores,
                        "Classified evidence pair"
                    );
                    best.observe(position, &scores);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(id = %item.id, "Classification failed, skipping evidence: {}", e);
                }
            }
        }

        let selected = best.evidence.and_then(|i| evidence.into_iter().nth(i));
        let evidence_text = selected.as_ref().map(|e| e.text.as_str()).unwrap_or("");
        let (label, raw) = numeric_downgrade(
            best.label,
            best.confidence,
            claim,
            evidence_text,
            self.config.numeric_confidence_cap,
        );
        if label != best.label {
            tracing::debug!(
                claim = %claim,
                "Claim has numbers its evidence lacks, downgrading support"
            );
        }

        Ok(Verdict {
            claim: claim.to_string(),
            label,
            confidence: display_confidence(label, raw, self.config.confidence_decimals),
            raw_confidence: raw,
            evidence: selected,
            explanation: label.explanation().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{Embedder, LocalEmbedder};
    use crate::entailment::MockEntailmentClassifier;
    use pretty_assertions::assert_eq;

    fn item(id: &str, text: &str) -> EvidenceItem {
        EvidenceItem {
            text: text.into(),
            source: "test".into(),
            id: id.into(),
            url: String::new(),
            distance: 0.0,
        }
    }

    fn verifier(classifier: MockEntailmentClassifier) -> ClaimVerifier {
        let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(32));
        ClaimVerifier::new(
            Arc::new(EvidenceRetriever::new(embedder)),
            Arc::new(classifier),
            VerifierConfig::default(),
        )
    }

    fn dist(entail: f32, contra: f32, neutral: f32) -> Vec<LabelScore> {
        vec![
            LabelScore::new("ENTAILMENT", entail),
            LabelScore::new("CONTRADICTION", contra),
            LabelScore::new("NEUTRAL", neutral),
        ]
    }

    #[test]
    fn test_label_from_raw() {
        assert_eq!(VerdictLabel::from_raw("ENTAILMENT"), VerdictLabel::Supported);
        assert_eq!(VerdictLabel::from_raw("entailment"), VerdictLabel::Supported);
        assert_eq!(
            VerdictLabel::from_raw("Contradiction"),
            VerdictLabel::Contradicted
        );
        assert_eq!(
            VerdictLabel::from_raw("NEUTRAL"),
            VerdictLabel::NotEnoughInformation
        );
        assert_eq!(
            VerdictLabel::from_raw("LABEL_7"),
            VerdictLabel::NotEnoughInformation
        );
    }

    #[test]
    fn test_label_serde_names() {
        let json = serde_json::to_string(&VerdictLabel::NotEnoughInformation).unwrap();
        assert_eq!(json, "\"Not enough information\"");
        let back: VerdictLabel = serde_json::from_str("\"Supported\"").unwrap();
        assert_eq!(back, VerdictLabel::Supported);
        assert_eq!(
            VerdictLabel::NotEnoughInformation.to_string(),
            "Not enough information"
        );
    }

    #[test]
    fn test_best_label_is_global_max() {
        let a = dist(0.2, 0.7, 0.1);
        let b = dist(0.9, 0.05, 0.05);
        let best = BestLabel::select([(0, a.as_slice()), (1, b.as_slice())]);
        assert_eq!(best.label, VerdictLabel::Supported);
        assert_eq!(best.evidence, Some(1));
        assert!((best.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_best_label_ties_keep_first_seen() {
        let a = dist(0.1, 0.5, 0.4);
        let b = dist(0.5, 0.1, 0.4);
        let best = BestLabel::select([(0, a.as_slice()), (1, b.as_slice())]);
        assert_eq!(best.label, VerdictLabel::Contradicted);
        assert_eq!(best.evidence, Some(0));

        let within = vec![
            LabelScore::new("NEUTRAL", 0.5),
            LabelScore::new("ENTAILMENT", 0.5),
        ];
        let best = BestLabel::select([(0, within.as_slice())]);
        assert_eq!(best.label, VerdictLabel::NotEnoughInformation);
    }

    #[test]
    fn test_best_label_ignores_zero_scores() {
        let zeros = dist(0.0, 0.0, 0.0);
        let best = BestLabel::select([(0, zeros.as_slice())]);
        assert_eq!(best, BestLabel::default());
    }

    #[test]
    fn test_numeric_downgrade() {
        let (label, conf) = numeric_downgrade(
            VerdictLabel::Supported,
            0.9,
            "Rates increased by 45% last year.",
            "Rates increased significantly last year.",
            0.6,
        );
        assert_eq!(label, VerdictLabel::NotEnoughInformation);
        assert_eq!(conf, 0.6);

        let (label, conf) = numeric_downgrade(
            VerdictLabel::Supported,
            0.5,
            "Rates rose 45%.",
            "Rates rose significantly.",
            0.6,
        );
        assert_eq!(label, VerdictLabel::NotEnoughInformation);
        assert_eq!(conf, 0.5);
    }

    #[test]
    fn test_numeric_downgrade_only_for_supported() {
        let (label, conf) = numeric_downgrade(
            VerdictLabel::Contradicted,
            0.9,
            "Rates rose 45%.",
            "Rates fell.",
            0.6,
        );
        assert_eq!(label, VerdictLabel::Contradicted);
        assert_eq!(conf, 0.9);

        let (label, _) = numeric_downgrade(
            VerdictLabel::Supported,
            0.9,
            "Rates rose 45%.",
            "Rates rose 45 percent.",
            0.6,
        );
        assert_eq!(label, VerdictLabel::Supported);
    }

    #[test]
    fn test_contains_digit_unicode() {
        assert!(contains_digit("in 2021"));
        assert!(contains_digit("٣ results"));
        assert!(!contains_digit("no numbers here"));
    }

    #[test]
    fn test_display_confidence() {
        assert_eq!(
            display_confidence(VerdictLabel::NotEnoughInformation, 0.6, 3),
            0.4
        );
        assert_eq!(
            display_confidence(VerdictLabel::NotEnoughInformation, 0.0, 3),
            1.0
        );
        assert_eq!(display_confidence(VerdictLabel::Supported, 0.87654, 3), 0.877);
    }

    #[tokio::test]
    async fn test_numeric_claim_scenario() {
        let evidence_text = "Rates increased significantly last year.";
        let mock = MockEntailmentClassifier::new()
            .with_response(evidence_text, dist(0.9, 0.05, 0.05));
        let verdict = verifier(mock)
            .verify_against(
                "Rates increased by 45% last year.",
                vec![item("rates", evidence_text)],
            )
            .await
            .unwrap();

        assert_eq!(verdict.label, VerdictLabel::NotEnoughInformation);
        assert_eq!(verdict.confidence, 0.4);
        assert_eq!(verdict.raw_confidence, 0.6);
        assert_eq!(verdict.evidence.unwrap().id, "rates");
        assert_eq!(
            verdict.explanation,
            "No sufficient supporting evidence found in the indexed corpus."
        );
    }

    #[tokio::test]
    async fn test_empty_evidence_is_maximally_uncertain() {
        let verdict = verifier(MockEntailmentClassifier::new())
            .verify_against("LLMs can hallucinate.", Vec::new())
            .await
            .unwrap();
        assert_eq!(verdict.label, VerdictLabel::NotEnoughInformation);
        assert_eq!(verdict.confidence, 1.0);
        assert_eq!(verdict.evidence, None);
    }

    #[tokio::test]
    async fn test_supported_claim() {
        let text = "Large language models can generate false statements.";
        let mock = MockEntailmentClassifier::new().with_response(text, dist(0.92, 0.03, 0.05));
        let verdict = verifier(mock)
            .verify_against("LLMs can hallucinate.", vec![item("llm", text)])
            .await
            .unwrap();
        assert_eq!(verdict.label, VerdictLabel::Supported);
        assert_eq!(verdict.confidence, 0.92);
        assert_eq!(
            verdict.explanation,
            "Claim is supported by retrieved evidence from the corpus."
        );
    }

    #[tokio::test]
    async fn test_empty_text_evidence_not_classified() {
        let mock = Arc::new(MockEntailmentClassifier::new());
        let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(8));
        let verifier = ClaimVerifier::new(
            Arc::new(EvidenceRetriever::new(embedder)),
            mock.clone(),
            VerifierConfig::default(),
        );
        verifier
            .verify_against("claim", vec![item("blank", "  "), item("real", "text")])
            .await
            .unwrap();
        assert_eq!(mock.calls(), vec![("text".to_string(), "claim".to_string())]);
    }

    #[tokio::test]
    async fn test_failed_pairs_are_skipped() {
        let mock = MockEntailmentClassifier::new()
            .fail_on("broken")
            .with_response("works", dist(0.1, 0.8, 0.1));
        let verdict = verifier(mock)
            .verify_against("claim", vec![item("a", "broken"), item("b", "works")])
            .await
            .unwrap();
        assert_eq!(verdict.label, VerdictLabel::Contradicted);
        assert_eq!(verdict.evidence.unwrap().id, "b");
    }

    #[tokio::test]
    async fn test_all_pairs_failing_gives_default_verdict() {
        let mock = MockEntailmentClassifier::new().fail_on("broken");
        let verdict = verifier(mock)
            .verify_against("claim", vec![item("a", "broken")])
            .await
            .unwrap();
        assert_eq!(verdict.label, VerdictLabel::NotEnoughInformation);
        assert_eq!(verdict.confidence, 1.0);
        assert_eq!(verdict.evidence, None);
    }

    #[tokio::test]
    async fn test_unavailable_classifier_fails_request() {
        let err = verifier(MockEntailmentClassifier::unavailable())
            .verify_against("claim", vec![item("a", "text")])
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_verify_without_index_is_unavailable() {
        let err = verifier(MockEntailmentClassifier::new())
            .verify("LLMs can hallucinate.")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::FactlensError::Retrieval(crate::error::RetrievalError::IndexUnavailable)
        ));
    }
}
