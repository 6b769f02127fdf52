// One-step backoff Kneser-Ney.
//
// The continuation probability of the order-1 suffix is interpolated once
// with the raw-count estimate of the full n-gram. The discount is taken at
// the absolute query length `n`, unlike the recursive variants which index
// by the order being interpolated.

use super::SmoothingEngine;

pub(super) fn score<S: AsRef<str>>(engine: &SmoothingEngine, ngram: &[S]) -> f64 {
    let store = engine.store.as_ref();
    let stats = store.global_stats();
    let n = ngram.len();
    let order = engine.order;
    let floor = engine.unknown.base();

    let start = (n + 1).saturating_sub(order).min(n - 1);
    let suffix = &ngram[start..];
    let nom = store.lookup(suffix).precede.total() as f64;
    if nom == 0.0 {
        return floor;
    }
    let denom = if suffix.len() == 1 || n == 2 {
        stats.num_bigrams() as f64
    } else {
        store.lookup(&ngram[start..n - 1]).follow_precede.total() as f64
    };
    if denom == 0.0 {
        return floor;
    }
    let pkn = nom / denom;
    if n < order {
        return pkn;
    }

    let start = n - order;
    let hist = store.lookup(&ngram[start..n - 1]);
    if hist.count == 0 {
        return pkn;
    }
    let d = engine.discounts.y(n);
    let c = store.quantity(&ngram[start..]) as f64;
    let ch = hist.count as f64;
    (c - d).max(0.0) / ch + hist.follow.total() as f64 * d / ch * pkn
}
