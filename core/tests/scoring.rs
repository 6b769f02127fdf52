// End-to-end scoring over a small in-memory corpus.
//
// Covers the behaviors every smoothing variant has to share:
// - probabilities stay inside (0, 1] for seen, unseen and OOV n-grams
// - a seen continuation beats an unseen one in the same context
// - perplexity is stable across scorer resets
// - the recursive variants honor explicit discounts and unknown settings

use ngramlm_core::{
    perplexity_of, BoundaryHandling, LanguageModel, LmConfig, SentenceTags, SequenceScorer,
    SmoothingKind,
};
use proptest::prelude::*;

const CORPUS: &[&str] = &[
    "the quick brown fox jumps over the lazy dog",
    "the quick brown fox sleeps",
    "a lazy dog sleeps under the tree",
    "the brown dog jumps over a fox",
];

fn sentences() -> Vec<Vec<&'static str>> {
    CORPUS
        .iter()
        .map(|s| s.split_whitespace().collect())
        .collect()
}

fn model(kind: SmoothingKind) -> LanguageModel {
    let cfg = LmConfig {
        smoothing: kind,
        sentence_tags: SentenceTags::Both,
        boundary: BoundaryHandling::Grow,
        ..LmConfig::default()
    };
    LanguageModel::from_sentences(sentences(), cfg).unwrap()
}

#[test]
fn every_variant_scores_inside_unit_interval() {
    let queries: [&[&str]; 6] = [
        &["quick", "brown", "fox"],
        &["brown", "fox", "jumps"],
        &["lazy", "dog", "flies"],
        &["tree", "fox", "quick"],
        &["dog"],
        &["zebra"],
    ];
    for kind in SmoothingKind::ALL {
        let m = model(kind);
        for q in queries {
            let p = m.ngram_probability(q);
            assert!(p > 0.0 && p <= 1.0, "{kind}: p({q:?}) = {p}");
            assert!(m.ngram_log_probability(q) <= 0.0);
        }
    }
}

#[test]
fn seen_continuation_beats_unseen() {
    for kind in SmoothingKind::ALL {
        let m = model(kind);
        let seen = m.ngram_probability(&["quick", "brown", "fox"]);
        let unseen = m.ngram_probability(&["quick", "brown", "tree"]);
        assert!(seen > unseen, "{kind}: {seen} <= {unseen}");
    }
}

#[test]
fn in_domain_sentence_has_lower_perplexity() {
    let m = model(SmoothingKind::KneserNey);
    let tokens = |s: &str| -> Vec<Vec<String>> {
        let t: Vec<&str> = s.split_whitespace().collect();
        m.ngram_sequence(&t)
    };
    let familiar = perplexity_of(&m, &tokens("the quick brown fox sleeps"), false);
    let strange = perplexity_of(&m, &tokens("tree under sleeps quick the"), false);
    assert!(familiar < strange, "{familiar} >= {strange}");
    assert!(familiar >= 1.0);
}

#[test]
fn scorer_reset_is_deterministic() {
    let m = model(SmoothingKind::ModifiedKneserNeyRecursive);
    let t: Vec<&str> = "a lazy dog jumps over the quick fox".split_whitespace().collect();
    let grams = m.ngram_sequence(&t);

    let mut scorer = SequenceScorer::new(&m);
    let first_sum = scorer.add_sequence(&grams);
    let first = scorer.perplexity();
    scorer.reset();
    let second_sum = scorer.add_sequence(&grams);
    assert_eq!(first_sum, second_sum);
    assert_eq!(scorer.perplexity(), first);
    assert!((first_sum - m.sentence_log_probability(&t)).abs() < 1e-12);
}

#[test]
fn static_unknown_probability_is_used_for_oov() {
    let cfg = LmConfig {
        smoothing: SmoothingKind::KneserNeyRecursive,
        unknown_log10_prob: Some(-6.0),
        discount: 0.6,
        ..LmConfig::default()
    };
    let m = LanguageModel::from_sentences(sentences(), cfg).unwrap();
    let p = m.ngram_probability(&["the", "quick", "zebra"]);
    assert!((p - 1e-6).abs() < 1e-12);
    assert!((m.ngram_log_probability(&["<unk>"]) + 6.0).abs() < 1e-9);
    assert_eq!(m.engine().discounts().y(3), 0.6);
}

#[test]
fn longer_queries_are_truncated_to_order() {
    let m = model(SmoothingKind::KneserNey);
    let long = m.ngram_probability(&["over", "the", "quick", "brown", "fox"]);
    let trimmed = m.ngram_probability(&["quick", "brown", "fox"]);
    assert_eq!(long, trimmed);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn probabilities_are_bounded_for_random_corpora(
        corpus in prop::collection::vec(
            prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d", "e"]), 1..8),
            1..12,
        ),
        query in prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d", "e", "f"]), 1..5),
        order in 1usize..5,
        kind in prop::sample::select(SmoothingKind::ALL.to_vec()),
    ) {
        let cfg = LmConfig { order, smoothing: kind, ..LmConfig::default() };
        let m = LanguageModel::from_sentences(&corpus, cfg).unwrap();
        let p = m.ngram_probability(&query);
        prop_assert!(p.is_finite());
        prop_assert!(p > 0.0 && p <= 1.0, "{} p({:?}) = {}", kind, query, p);
    }
}
