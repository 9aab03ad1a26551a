use criterion::{Criterion, black_box, criterion_group, criterion_main};
use factlens_core::entailment::LabelScore;
use factlens_core::extractor::{ClaimExtractor, HeuristicClaimExtractor, split_sentences};
use factlens_core::index::FlatIndex;
use factlens_core::trust::TrustSummary;
use factlens_core::verifier::{BestLabel, VerdictLabel};
use factlens_core::{CorpusStore, Document, LocalEmbedder};

const SAMPLE_TEXT: &str = "
    Large language models are widely used.
    Studies show LLMs hallucinate in over 60% of cases.
    According to recent research, citation errors are common.
    Smith et al. (2021) proposed hallucination mitigation.
    The model was released in March. Dr. Lee reported that accuracy improved by 12.5 points.
";

fn bench_flat_index(c: &mut Criterion) {
    let embedder = LocalEmbedder::new(384);
    let mut index = FlatIndex::new(384);
    for i in 0..1000 {
        index
            .add(&embedder.embed_text(&format!("document {} about topic {}", i, i % 17)))
            .unwrap();
    }
    let query = embedder.embed_text("a document about topic 3");

    c.bench_function("flat_index_search_1k_top3", |b| {
        b.iter(|| index.search(black_box(&query), black_box(3)))
    });

    c.bench_function("flat_index_search_1k_top50", |b| {
        b.iter(|| index.search(black_box(&query), black_box(50)))
    });
}

fn bench_embedding(c: &mut Criterion) {
    let embedder = LocalEmbedder::new(384);
    c.bench_function("local_embed_sentence", |b| {
        b.iter(|| embedder.embed_text(black_box("Studies show LLMs hallucinate in over 60% of cases.")))
    });

    let corpus = CorpusStore::from_documents(
        (0..500)
            .map(|i| Document::new(format!("d{}", i), format!("text of document {}", i)))
            .collect(),
    );
    c.bench_function("corpus_fingerprint_500", |b| {
        b.iter(|| black_box(&corpus).fingerprint("local"))
    });
}

fn bench_extraction(c: &mut Criterion) {
    let extractor = HeuristicClaimExtractor::default();
    c.bench_function("split_sentences", |b| {
        b.iter(|| split_sentences(black_box(SAMPLE_TEXT)))
    });

    let long_text = SAMPLE_TEXT.repeat(200);
    c.bench_function("extract_claims_long_text", |b| {
        b.iter(|| extractor.extract(black_box(&long_text)))
    });
}

fn bench_scoring(c: &mut Criterion) {
    let docs: Vec<Vec<LabelScore>> = (0..10)
        .map(|i| {
            vec![
                LabelScore::new("ENTAILMENT", (i as f32) / 10.0),
                LabelScore::new("CONTRADICTION", 0.5),
                LabelScore::new("NEUTRAL", 0.1),
            ]
        })
        .collect();
    c.bench_function("best_label_fold_10_docs", |b| {
        b.iter(|| BestLabel::select(black_box(&docs).iter().enumerate().map(|(i, d)| (i, d.as_slice()))))
    });

    let labels: Vec<VerdictLabel> = (0..1000)
        .map(|i| match i % 3 {
            0 => VerdictLabel::Supported,
            1 => VerdictLabel::Contradicted,
            _ => VerdictLabel::NotEnoughInformation,
        })
        .collect();
    c.bench_function("trust_summary_1k", |b| {
        b.iter(|| TrustSummary::from_labels(black_box(&labels).iter().copied()).trust_score())
    });
}

criterion_group!(
    benches,
    bench_flat_index,
    bench_embedding,
    bench_extraction,
    bench_scoring,
);
criterion_main!(benches);
