//! Trust scoring over a set of verdicts.

use crate::verifier::{Verdict, VerdictLabel, round_to};
use serde::{Deserialize, Serialize};

/// Percentage of verdicts labelled `Supported`, rounded to two decimals.
///
/// Returns 0 for an empty slice. Contradicted and uncertain verdicts count
/// only toward the denominator.
pub fn compute_trust_score(verdicts: &[Verdict]) -> f64 {
    TrustSummary::from_verdicts(verdicts).trust_score()
}

/// Verdict counts by label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustSummary {
    pub total: usize,
    pub supported: usize,
    pub contradicted: usize,
    pub uncertain: usize,
}

impl TrustSummary {
    pub fn from_verdicts(verdicts: &[Verdict]) -> Self {
        Self::from_labels(verdicts.iter().map(|v| v.label))
    }

    pub fn from_labels(labels: impl IntoIterator<Item = VerdictLabel>) -> Self {
        labels.into_iter().fold(Self::default(), |mut s, label| {
            s.total += 1;
            match label {
                VerdictLabel::Supported => s.supported += 1,
                VerdictLabel::Contradicted => s.contradicted += 1,
                VerdictLabel::NotEnoughInformation => s.uncertain += 1,
            }
            s
        })
    }

    pub fn trust_score(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        round_to(100.0 * self.supported as f64 / self.total as f64, 2)
    }
}
