// Stupid backoff: relative frequencies with a fixed penalty, not normalized.

use super::SmoothingEngine;

pub(super) fn score<S: AsRef<str>>(engine: &SmoothingEngine, ngram: &[S]) -> f64 {
    let store = engine.store.as_ref();
    let n = ngram.len();
    let total = store.global_stats().sum(1);
    let count = store.quantity(&ngram[n - 1..]);
    if count == 0 || total == 0 {
        return engine.unknown.base();
    }

    let mut s = count as f64 / total as f64;
    for i in 2..=n {
        let gram = &ngram[n - i..];
        let c = store.quantity(gram);
        let ch = store.quantity(&gram[..i - 1]);
        if c > 0 && ch > 0 {
            s = c as f64 / ch as f64;
        } else {
            s *= engine.backoff_weight;
            break;
        }
    }
    s
}
