//! Smoothed n-gram probabilities over a [`CountStore`].
//!
//! `SmoothingEngine` owns the discount table and the unknown-word model and
//! dispatches to one of a closed set of algorithms chosen at construction:
//!
//! - `KneserNey` - iterative interpolated Kneser-Ney
//! - `KneserNeyRecursive` - textbook recursive Kneser-Ney
//! - `PoptKneserNeyRecursive` - recursive, full backoff weight on empty contexts
//! - `ModifiedKneserNeyRecursive` - recursive with D1/D2/D3+ discounts
//! - `OneBackoffKneserNey` - one interpolation step over a continuation estimate
//! - `StupidBackoff` - unnormalized backoff score
//! - `Laplace` - add-one on raw counts
//!
//! Every variant shares one contract: `score` returns a finite value in
//! `(0, 1]`, and n-grams ending in an out-of-vocabulary token get the
//! unknown-word probability.
use crate::config::LmConfig;
use crate::discount::{DiscountEstimator, DiscountMode, DiscountSet};
use crate::error::{LmError, Result};
use crate::record::join_key;
use crate::store::CountStore;
use crate::unknown::UnknownProbabilityModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod kneser_ney;
mod laplace;
mod one_backoff;
mod recursive;
mod stupid_backoff;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SmoothingKind {
    #[default]
    KneserNey,
    KneserNeyRecursive,
    PoptKneserNeyRecursive,
    ModifiedKneserNeyRecursive,
    OneBackoffKneserNey,
    StupidBackoff,
    Laplace,
}

impl SmoothingKind {
    pub const ALL: [SmoothingKind; 7] = [
        SmoothingKind::KneserNey,
        SmoothingKind::KneserNeyRecursive,
        SmoothingKind::PoptKneserNeyRecursive,
        SmoothingKind::ModifiedKneserNeyRecursive,
        SmoothingKind::OneBackoffKneserNey,
        SmoothingKind::StupidBackoff,
        SmoothingKind::Laplace,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SmoothingKind::KneserNey => "kneser-ney",
            SmoothingKind::KneserNeyRecursive => "kneser-ney-recursive",
            SmoothingKind::PoptKneserNeyRecursive => "popt-kneser-ney-recursive",
            SmoothingKind::ModifiedKneserNeyRecursive => "modified-kneser-ney-recursive",
            SmoothingKind::OneBackoffKneserNey => "one-backoff-kneser-ney",
            SmoothingKind::StupidBackoff => "stupid-backoff",
            SmoothingKind::Laplace => "laplace",
        }
    }

    /// Discount estimation used when the configuration does not pick one.
    pub fn default_discount_mode(self) -> DiscountMode {
        match self {
            SmoothingKind::ModifiedKneserNeyRecursive => DiscountMode::Modified,
            _ => DiscountMode::Standard,
        }
    }
}

impl fmt::Display for SmoothingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SmoothingKind {
    type Err = LmError;

    fn from_str(s: &str) -> Result<Self> {
        SmoothingKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| LmError::config(format!("unknown smoothing {s:?}")))
    }
}

#[derive(Debug, Clone)]
pub struct SmoothingEngine {
    store: Arc<CountStore>,
    kind: SmoothingKind,
    order: usize,
    discounts: DiscountSet,
    unknown: UnknownProbabilityModel,
    backoff_weight: f64,
    recursion_budget: usize,
}

impl SmoothingEngine {
    pub fn new(store: Arc<CountStore>, config: &LmConfig) -> Result<Self> {
        config.validate()?;
        let order = config.order;
        if order > store.max_order() {
            warn!(
                order,
                index_order = store.max_order(),
                "model order exceeds the highest order in the index"
            );
        }
        let mode = config
            .discount_mode
            .unwrap_or_else(|| config.smoothing.default_discount_mode());
        let discounts =
            DiscountEstimator::estimate(order, store.global_stats(), config.discount, mode)?;
        let unknown = UnknownProbabilityModel::new(
            store.global_stats(),
            &discounts,
            config.unknown_log10_prob,
        )?;
        let recursion_budget = usize::try_from(config.max_backoff_recursions).unwrap_or(order);

        info!(
            smoothing = %config.smoothing,
            order,
            ?mode,
            unknown = unknown.base(),
            "smoothing engine ready"
        );
        for n in 1..=order {
            debug!(order = n, discount = ?discounts.get(n), "discount");
        }
        Ok(Self {
            store,
            kind: config.smoothing,
            order,
            discounts,
            unknown,
            backoff_weight: config.backoff_weight,
            recursion_budget,
        })
    }

    pub fn kind(&self) -> SmoothingKind {
        self.kind
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn store(&self) -> &Arc<CountStore> {
        &self.store
    }

    pub fn discounts(&self) -> &DiscountSet {
        &self.discounts
    }

    pub fn unknown(&self) -> &UnknownProbabilityModel {
        &self.unknown
    }

    /// Unknown-word probability for the last token of `ngram`.
    pub fn unknown_probability<S: AsRef<str>>(&self, ngram: &[S]) -> f64 {
        match ngram.split_last() {
            Some((_, history)) => self.unknown.probability(&self.store, history),
            None => self.unknown.base(),
        }
    }

    /// Conditional probability of the last token given the others.
    ///
    /// Queries longer than the model order keep their trailing `order`
    /// tokens.
    pub fn score<S: AsRef<str>>(&self, ngram: &[S]) -> f64 {
        let Some(last) = ngram.last() else {
            warn!("empty n-gram scored, returning the unknown probability");
            return self.unknown.base();
        };
        let ngram = if ngram.len() > self.order {
            debug!(
                len = ngram.len(),
                order = self.order,
                "n-gram longer than model order, truncating"
            );
            &ngram[ngram.len() - self.order..]
        } else {
            ngram
        };
        let floor = self.unknown_probability(ngram);
        if self.store.is_oov(last.as_ref()) {
            return floor;
        }

        let p = match self.kind {
            SmoothingKind::KneserNey => kneser_ney::score(self, ngram),
            SmoothingKind::KneserNeyRecursive => {
                recursive::score(self, ngram, recursive::Variant::Standard)
            }
            SmoothingKind::PoptKneserNeyRecursive => {
                recursive::score(self, ngram, recursive::Variant::Popt)
            }
            SmoothingKind::ModifiedKneserNeyRecursive => {
                recursive::score(self, ngram, recursive::Variant::Modified)
            }
            SmoothingKind::OneBackoffKneserNey => one_backoff::score(self, ngram),
            SmoothingKind::StupidBackoff => stupid_backoff::score(self, ngram),
            SmoothingKind::Laplace => laplace::score(self, ngram),
        };
        self.bound(p, floor, ngram)
    }

    /// log10 of [`score`](Self::score).
    pub fn log10_score<S: AsRef<str>>(&self, ngram: &[S]) -> f64 {
        self.score(ngram).log10()
    }

    /// Clamp into `[floor, 1]`, where `floor` is what an unknown word would
    /// get after the same history.
    fn bound<S: AsRef<str>>(&self, p: f64, floor: f64, ngram: &[S]) -> f64 {
        if p.is_nan() {
            warn!(ngram = %join_key(ngram), "probability is NaN, using the unknown probability");
            return floor;
        }
        if p > 1.0 {
            if p > 1.1 {
                warn!(ngram = %join_key(ngram), p, "probability above 1.1, counts may be corrupt");
            }
            return 1.0;
        }
        if p < floor {
            if p < 0.0 {
                warn!(ngram = %join_key(ngram), p, "negative probability");
            } else if !self.unknown.is_static() && floor - p > 1e-5 {
                debug!(ngram = %join_key(ngram), p, floor, "probability below unknown floor");
            }
            return floor;
        }
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CountStoreBuilder;
    use crate::discount::Discount;

    fn store(lines: &[&str]) -> Arc<CountStore> {
        let mut b = CountStoreBuilder::new(3).unwrap();
        for l in lines {
            b.add_text(l);
        }
        Arc::new(b.build().unwrap())
    }

    fn toy() -> Arc<CountStore> {
        store(&["the quick brown fox", "the quick brown cat"])
    }

    fn engine(store: &Arc<CountStore>, kind: SmoothingKind, discount: f64) -> SmoothingEngine {
        let cfg = LmConfig {
            smoothing: kind,
            discount,
            ..LmConfig::default()
        };
        SmoothingEngine::new(store.clone(), &cfg).unwrap()
    }

    const FOX: [&str; 3] = ["quick", "brown", "fox"];
    const CAT: [&str; 3] = ["quick", "brown", "cat"];

    #[test]
    fn iterative_kneser_ney_value() {
        let e = engine(&toy(), SmoothingKind::KneserNey, 0.5);
        assert!((e.score(&FOX) - 0.4375).abs() < 1e-12);
        assert!((e.score(&["brown", "fox"]) - 0.375).abs() < 1e-12);
        assert!((e.score(&["fox"]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn recursive_kneser_ney_value() {
        let e = engine(&toy(), SmoothingKind::KneserNeyRecursive, 0.5);
        let unigram = 0.125 + 0.125 / 6.0;
        let bigram = 0.25 + 0.5 * unigram;
        let trigram = 0.25 + 0.5 * bigram;
        assert!((e.score(&FOX) - trigram).abs() < 1e-12);
    }

    #[test]
    fn stupid_backoff_and_laplace_values() {
        let s = toy();
        let e = engine(&s, SmoothingKind::StupidBackoff, -1.0);
        assert!((e.score(&FOX) - 0.5).abs() < 1e-12);
        // "cat fox" never seen: unigram 1/8 then one backoff step
        assert!((e.score(&["cat", "fox"]) - 0.125 * 0.4).abs() < 1e-12);

        let e = engine(&s, SmoothingKind::Laplace, -1.0);
        assert!((e.score(&FOX) - 2.0 / 7.0).abs() < 1e-12);
        assert!((e.score(&["fox"]) - 2.0 / 13.0).abs() < 1e-12);
    }

    #[test]
    fn scores_are_probabilities_for_every_variant() {
        let s = toy();
        for kind in SmoothingKind::ALL {
            let e = engine(&s, kind, -1.0);
            let ngrams: [&[&str]; 5] = [&FOX, &CAT, &["the", "quick"], &["fox", "the", "cat"], &["the"]];
            for ngram in ngrams {
                let p = e.score(ngram);
                assert!(p > 0.0 && p <= 1.0, "{kind}: p({ngram:?}) = {p}");
            }
        }
    }

    #[test]
    fn oov_ending_ngrams_get_unknown_probability() {
        let s = toy();
        for kind in SmoothingKind::ALL {
            let e = engine(&s, kind, -1.0);
            let ngram = ["quick", "brown", "bear"];
            assert_eq!(e.score(&ngram), e.unknown_probability(&ngram), "{kind}");
            assert_eq!(e.score(&["<unk>"]), e.unknown().base(), "{kind}");
        }
    }

    #[test]
    fn higher_count_continuation_is_not_less_likely() {
        let s = store(&[
            "the quick brown fox",
            "the quick brown fox",
            "the quick brown cat",
        ]);
        for kind in SmoothingKind::ALL {
            let e = engine(&s, kind, -1.0);
            assert!(e.score(&FOX) >= e.score(&CAT), "{kind}");
        }
    }

    #[test]
    fn recursive_and_iterative_rank_alike() {
        let s = store(&[
            "the quick brown fox",
            "the quick brown fox",
            "the slow brown cat",
            "a quick brown cat",
        ]);
        let it = engine(&s, SmoothingKind::KneserNey, -1.0);
        let rec = engine(&s, SmoothingKind::KneserNeyRecursive, -1.0);
        let cmp = |e: &SmoothingEngine| e.score(&FOX).partial_cmp(&e.score(&CAT));
        assert_eq!(cmp(&it), cmp(&rec));
    }

    #[test]
    fn overlong_ngrams_are_truncated() {
        let e = engine(&toy(), SmoothingKind::KneserNey, 0.5);
        assert_eq!(e.score(&["the", "quick", "brown", "fox"]), e.score(&FOX));
        assert_eq!(e.score::<&str>(&[]), e.unknown().base());
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        let e = Arc::new(engine(&toy(), SmoothingKind::ModifiedKneserNeyRecursive, -1.0));
        let expected = e.score(&FOX);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let e = e.clone();
                scope.spawn(move || assert_eq!(e.score(&FOX), expected));
            }
        });
    }

    #[test]
    fn static_unknown_probability_is_the_floor() {
        let s = toy();
        let cfg = LmConfig {
            unknown_log10_prob: Some(-2.0),
            ..LmConfig::default()
        };
        let e = SmoothingEngine::new(s, &cfg).unwrap();
        assert!((e.score(&["bear"]) - 0.01).abs() < 1e-15);
        assert!(e.score(&FOX) >= 0.01);
    }

    fn with_discounts(mut e: SmoothingEngine, per_order: Vec<Discount>) -> SmoothingEngine {
        e.discounts = DiscountSet::new(per_order);
        e
    }

    #[test]
    fn known_word_never_scores_below_unknown_in_same_context() {
        let mut b = CountStoreBuilder::new(2).unwrap();
        for _ in 0..99 {
            b.add_text("x a");
        }
        for l in ["x b", "c d", "e f"] {
            b.add_text(l);
        }
        let s = Arc::new(b.build().unwrap());
        for kind in SmoothingKind::ALL {
            let cfg = LmConfig {
                order: 2,
                smoothing: kind,
                ..LmConfig::default()
            };
            let e = SmoothingEngine::new(s.clone(), &cfg).unwrap();
            let unknown = e.score(&["x", "zebra"]);
            for w in ["a", "b", "d", "f"] {
                let p = e.score(&["x", w]);
                assert!(p >= unknown, "{kind}: p({w}|x) = {p} < p(zebra|x) = {unknown}");
            }
        }
    }

    #[test]
    fn iterative_kneser_ney_uses_relative_frequency_for_sentence_initial_words() {
        // "the" never follows anything, so every order gives c(the) / sum(1)
        let e = engine(&toy(), SmoothingKind::KneserNey, 0.5);
        let ngrams: [&[&str]; 3] = [&["quick", "brown", "the"], &["brown", "the"], &["the"]];
        for ngram in ngrams {
            assert!((e.score(ngram) - 0.25).abs() < 1e-12, "{ngram:?}");
        }
    }

    #[test]
    fn modified_kneser_ney_value() {
        let d = Discount {
            y: 0.5,
            d1: 0.3,
            d2: 0.6,
            d3p: 0.9,
        };
        let e = with_discounts(
            engine(&toy(), SmoothingKind::ModifiedKneserNeyRecursive, 0.5),
            vec![d; 4],
        );
        // unigram: (1 - D1) / 4 + Y / 4 * 1/6
        let unigram = 0.7 / 4.0 + 0.5 / 4.0 / 6.0;
        // "brown" has two followers seen once: mass D1 * 2
        let bigram = 0.7 / 2.0 + 0.6 / 2.0 * unigram;
        let trigram = 0.7 / 2.0 + 0.6 / 2.0 * bigram;
        assert!((e.score(&FOX) - trigram).abs() < 1e-12);

        // c(the quick brown) = 2 selects D2; each history has one follower seen twice
        let unigram = 0.7 / 4.0 + 0.5 / 4.0 / 6.0;
        let bigram = 0.7 + 0.6 * unigram;
        let trigram = 1.4 / 2.0 + 0.6 / 2.0 * bigram;
        assert!((e.score(&["the", "quick", "brown"]) - trigram).abs() < 1e-12);
    }

    #[test]
    fn popt_takes_full_backoff_on_unseen_history() {
        let s = toy();
        let standard = engine(&s, SmoothingKind::KneserNeyRecursive, 0.5);
        let popt = engine(&s, SmoothingKind::PoptKneserNeyRecursive, 0.5);
        // c(fox quick) = 0: the whole mass goes to the lower order
        let ngram = ["fox", "quick", "brown"];
        let unigram = 0.125 + 0.125 / 6.0;
        let lower = 0.5 + 0.5 * unigram;
        assert!((popt.score(&ngram) - lower).abs() < 1e-12);
        assert!((standard.score(&ngram) - 0.5 * lower).abs() < 1e-12);
        // seen histories score identically
        assert_eq!(popt.score(&FOX), standard.score(&FOX));
    }

    #[test]
    fn one_backoff_values() {
        let s = store(&[
            "the quick brown fox",
            "the quick brown fox",
            "the quick brown cat",
            "a slow brown fox",
        ]);
        let uniform = |y: f64| Discount {
            y,
            d1: y,
            d2: y,
            d3p: y,
        };
        let e = with_discounts(
            engine(&s, SmoothingKind::OneBackoffKneserNey, 0.5),
            vec![uniform(0.7), uniform(0.1), uniform(0.2), uniform(0.5)],
        );
        // bigram query: N1+(. brown fox) / number of distinct bigrams
        assert!((e.score(&["brown", "fox"]) - 2.0 / 6.0).abs() < 1e-12);
        // full order, discounted with D[3]:
        // (2 - D) / 3 + 2 * D / 3 * (2 / 3)
        let expected = (2.0 - 0.5) / 3.0 + 2.0 * 0.5 / 3.0 * (2.0 / 3.0);
        assert!((e.score(&FOX) - expected).abs() < 1e-12);
    }

    #[test]
    fn kind_names_parse_back() {
        for kind in SmoothingKind::ALL {
            assert_eq!(kind.name().parse::<SmoothingKind>().unwrap(), kind);
        }
        assert!("witten-bell".parse::<SmoothingKind>().is_err());
    }
}
