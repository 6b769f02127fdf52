// Recursive Kneser-Ney and its popt / modified variants.
//
// kn(g, lower, budget):
//   top order:   max(c(g) - D, 0) / c(h) + lambda * kn(g[1..], true, budget - 1)
//   lower order: max(N1+(. g) - D, 0) / N1+(. h .) + lambda * kn(g[1..], true, budget - 1)
//   lambda = D * N1+(h .) / denom   (modified: (D1 N1 + D2 N2 + D3+ N3+) / denom)
// An exhausted budget returns the plain ratio without a backoff term.

use super::SmoothingEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Variant {
    Standard,
    /// Full backoff weight when the context was never seen.
    Popt,
    /// Count-class discounts D1 / D2 / D3+.
    Modified,
}

pub(super) fn score<S: AsRef<str>>(engine: &SmoothingEngine, ngram: &[S], variant: Variant) -> f64 {
    kn(engine, ngram, false, engine.recursion_budget, variant)
}

fn kn<S: AsRef<str>>(
    engine: &SmoothingEngine,
    ngram: &[S],
    lower: bool,
    budget: usize,
    variant: Variant,
) -> f64 {
    let n = ngram.len();
    if n == 1 {
        return unigram(engine, ngram, lower, budget, variant);
    }
    let store = engine.store.as_ref();
    let hist = store.lookup(&ngram[..n - 1]);
    let (nom, denom) = if lower {
        (
            store.lookup(ngram).precede.total() as f64,
            hist.follow_precede.total() as f64,
        )
    } else {
        (store.quantity(ngram) as f64, hist.count as f64)
    };

    if budget == 0 {
        return if denom > 0.0 { nom / denom } else { 0.0 };
    }
    let lp = kn(engine, &ngram[1..], true, budget - 1, variant);
    let discount = engine.discounts.get(n);
    if denom == 0.0 {
        return match variant {
            Variant::Popt => lp,
            _ => discount.y * lp,
        };
    }

    let f = &hist.follow;
    let (d, mass) = match variant {
        Variant::Modified => (
            discount.for_count(nom),
            discount.d1 * f.n1 as f64 + discount.d2 * f.n2 as f64 + discount.d3p * f.n3p as f64,
        ),
        _ => (discount.y, discount.y * f.total() as f64),
    };
    (nom - d).max(0.0) / denom + mass / denom * lp
}

fn unigram<S: AsRef<str>>(
    engine: &SmoothingEngine,
    ngram: &[S],
    lower: bool,
    budget: usize,
    variant: Variant,
) -> f64 {
    let store = engine.store.as_ref();
    let stats = store.global_stats();
    let rec = store.lookup(ngram);
    let (nom, denom) = if lower {
        (rec.precede.total() as f64, stats.num_bigrams() as f64)
    } else {
        (rec.count as f64, stats.sum(2) as f64)
    };
    let uniform = 1.0 / (stats.num_unigrams() as f64 + 1.0);
    if denom == 0.0 {
        return uniform;
    }
    if budget == 0 {
        return nom / denom;
    }
    let discount = engine.discounts.get(1);
    let d = match variant {
        Variant::Modified => discount.for_count(nom),
        _ => discount.y,
    };
    (nom - d).max(0.0) / denom + discount.y / denom * uniform
}
