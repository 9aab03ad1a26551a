//! Plain-text and JSON rendering of pipeline results.

use factlens_core::pipeline::ProbeResult;
use factlens_core::{EvidenceItem, TextReport, Verdict, VerdictLabel};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn marker(label: VerdictLabel) -> &'static str {
    match label {
        VerdictLabel::Supported => "[SUPPORTED]",
        VerdictLabel::Contradicted => "[CONTRADICTED]",
        VerdictLabel::NotEnoughInformation => "[UNCERTAIN]",
    }
}

fn evidence_line(item: &EvidenceItem) -> String {
    let mut line = format!("{} ({})", item.id, item.source);
    if !item.url.is_empty() {
        line.push_str(&format!(" {}", item.url));
    }
    line
}

pub fn render_verdict(verdict: &Verdict) -> String {
    let mut out = format!(
        "{} {}\n  {} (confidence {:.3})\n  {}",
        marker(verdict.label),
        verdict.claim,
        verdict.label,
        verdict.confidence,
        verdict.explanation
    );
    if let Some(evidence) = &verdict.evidence {
        out.push_str(&format!(
            "\n  evidence: {}\n    \"{}\"",
            evidence_line(evidence),
            evidence.text
        ));
    }
    out
}

pub fn print_verdict(verdict: &Verdict, format: Format) -> anyhow::Result<()> {
    match format {
        Format::Json => print_json(verdict),
        Format::Text => {
            println!("{}", render_verdict(verdict));
            Ok(())
        }
    }
}

pub fn print_report(report: &TextReport, format: Format) -> anyhow::Result<()> {
    if format == Format::Json {
        return print_json(report);
    }
    if report.claims.is_empty() {
        println!("No factual claims found.");
    }
    for verdict in &report.claims {
        println!("{}\n", render_verdict(verdict));
    }
    println!(
        "Trust score: {:.2}% ({} supported, {} contradicted, {} uncertain of {})",
        report.trust_score,
        report.summary.supported,
        report.summary.contradicted,
        report.summary.uncertain,
        report.summary.total
    );
    Ok(())
}

pub fn print_evidence(hits: &[EvidenceItem], format: Format) -> anyhow::Result<()> {
    if format == Format::Json {
        return print_json(hits);
    }
    if hits.is_empty() {
        println!("No matching documents.");
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{}. {} [distance {:.4}]\n   {}",
            rank + 1,
            evidence_line(hit),
            hit.distance,
            hit.text
        );
    }
    Ok(())
}

pub fn print_probes(results: &[ProbeResult], format: Format) -> anyhow::Result<()> {
    if format == Format::Json {
        return print_json(results);
    }
    for r in results {
        println!(
            "{} {:<10} {}",
            if r.ok { "ok  " } else { "FAIL" },
            r.component,
            r.detail
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(evidence: Option<EvidenceItem>) -> Verdict {
        Verdict {
            claim: "Rates increased by 45% last year.".into(),
            label: VerdictLabel::NotEnoughInformation,
            confidence: 0.4,
            raw_confidence: 0.6,
            evidence,
            explanation: VerdictLabel::NotEnoughInformation.explanation().into(),
        }
    }

    #[test]
    fn test_render_verdict_without_evidence() {
        let text = render_verdict(&verdict(None));
        assert!(text.starts_with("[UNCERTAIN] Rates increased by 45% last year."));
        assert!(text.contains("Not enough information (confidence 0.400)"));
        assert!(!text.contains("evidence:"));
    }

    #[test]
    fn test_render_verdict_with_evidence() {
        let text = render_verdict(&verdict(Some(EvidenceItem {
            text: "Rates increased significantly last year.".into(),
            source: "internal".into(),
            id: "rates".into(),
            url: String::new(),
            distance: 0.2,
        })));
        assert!(text.contains("evidence: rates (internal)"));
        assert!(text.contains("\"Rates increased significantly last year.\""));
    }
}
