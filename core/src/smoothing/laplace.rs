// Add-one smoothing over raw counts.

use super::SmoothingEngine;

pub(super) fn score<S: AsRef<str>>(engine: &SmoothingEngine, ngram: &[S]) -> f64 {
    let store = engine.store.as_ref();
    let v = store.vocabulary_size() as f64;
    let n = ngram.len();
    let c = store.quantity(ngram) as f64;
    let denom = if n == 1 {
        store.global_stats().sum(1) as f64
    } else {
        store.quantity(&ngram[..n - 1]) as f64
    };
    (c + 1.0) / (denom + v)
}
