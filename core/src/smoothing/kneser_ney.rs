// Iterative interpolated Kneser-Ney.
//
// Walks from the unigram continuation probability up to the query order,
// carrying the previous order's probability instead of recursing:
//
//   p_i = max(N1+(. w_{n-i+1..n}) - D[i], 0) / denom_i
//         + D[i] * N1+(h .) / denom_i * p_{i-1}
//
// Intermediate orders use continuation (precede) counts, the final order
// uses raw counts. `denom_i` is the largest of the follow, precede and
// follow-precede totals of the history: pruned indexes undercount
// follow-precede pairs, and the maximum is a heuristic correction for that.

use super::SmoothingEngine;
use crate::record::NgramRecord;

/// State of the last fully interpolated intermediate order.
struct Carry<'a> {
    lower_prob: f64,
    hist_count: f64,
    follow: f64,
    gram: &'a NgramRecord,
}

impl Carry<'_> {
    /// Redo the carried order with raw counts, as if it were the top order.
    fn reconstruct(&self, discount: f64) -> Option<f64> {
        if self.hist_count > 0.0 && self.lower_prob > 0.0 && self.follow > 0.0 {
            Some(interpolate(
                self.gram.count as f64,
                discount,
                self.hist_count,
                self.follow,
                self.lower_prob,
            ))
        } else {
            None
        }
    }
}

fn interpolate(nom: f64, discount: f64, denom: f64, follow: f64, lower_prob: f64) -> f64 {
    (nom - discount).max(0.0) / denom + discount * follow / denom * lower_prob
}

pub(super) fn score<S: AsRef<str>>(engine: &SmoothingEngine, ngram: &[S]) -> f64 {
    let store = engine.store.as_ref();
    let stats = store.global_stats();
    let n = ngram.len();

    let word = store.lookup(&ngram[n - 1..]);
    let num_bigrams = stats.num_bigrams() as f64;
    let mut pkn = if word.precede.total() > 0 && num_bigrams > 0.0 {
        word.precede.total() as f64 / num_bigrams
    } else if word.count > 0 && stats.sum(1) > 0 {
        // never seen after anything: relative frequency, no interpolation
        return word.count as f64 / stats.sum(1) as f64;
    } else {
        return 1.0 / stats.num_unigrams().max(1) as f64;
    };

    let mut carry: Option<Carry<'_>> = None;
    for i in 2..n.min(engine.order) {
        let d = engine.discounts.y(i);
        let hist = store.lookup(&ngram[n - i..n - 1]);
        let denom = hist
            .follow
            .total()
            .max(hist.precede.total())
            .max(hist.follow_precede.total()) as f64;
        if denom == 0.0 {
            return carry
                .as_ref()
                .and_then(|c| c.reconstruct(d))
                .unwrap_or(pkn);
        }

        let gram = store.lookup(&ngram[n - i..]);
        // pruning can leave a history without recorded followers
        let follow = hist.follow.total().max(1) as f64;
        let lower_prob = pkn;
        let nom = (gram.precede.total() as f64 - d).max(0.0);
        pkn = interpolate(gram.precede.total() as f64, d, denom, follow, lower_prob);
        if nom == 0.0 {
            return pkn;
        }
        carry = Some(Carry {
            lower_prob,
            hist_count: hist.count as f64,
            follow,
            gram,
        });
    }

    let d = engine.discounts.y(n);
    let start = n.saturating_sub(engine.order);
    let hist = store.lookup(&ngram[start..n - 1]);
    if hist.count == 0 {
        return carry
            .as_ref()
            .and_then(|c| c.reconstruct(d))
            .unwrap_or(pkn);
    }
    let gram = store.lookup(&ngram[start..]);
    let follow = hist.follow.total().max(1) as f64;
    interpolate(gram.count as f64, d, hist.count as f64, follow, pkn)
}
