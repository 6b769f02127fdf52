//! Probability mass for out-of-vocabulary continuations.
//!
//! In static mode a configured log10 value is used as is. Otherwise the
//! estimate is derived from the aggregate statistics:
//!
//! ```text
//! ud = exp(-ln(#bigrams) + ln(D[1]) - ln(#unigrams))
//! ```
//!
//! When the token before the unknown word has been seen as a history, the
//! bigram term is replaced by its follow count: `exp(ln(follow) -
//! ln(#bigrams) + ln(D[1]) - ln(#unigrams))`.
use crate::discount::DiscountSet;
use crate::error::{LmError, Result};
use crate::stats::GlobalStatistics;
use crate::store::CountStore;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnknownProbabilityModel {
    configured: Option<f64>,
    base: f64,
    uw_log: f64,
    ln_bigrams: f64,
}

impl UnknownProbabilityModel {
    /// `configured_log10`: a finite value selects static mode.
    pub fn new(
        stats: &GlobalStatistics,
        discounts: &DiscountSet,
        configured_log10: Option<f64>,
    ) -> Result<Self> {
        let num_unigrams = stats.num_unigrams().max(1) as f64;
        let ln_bigrams = (stats.num_bigrams().max(1) as f64).ln();
        let uw_log = discounts.y(1).ln() - num_unigrams.ln();

        if let Some(v) = configured_log10.filter(|v| v.is_finite()) {
            let p = 10f64.powf(v);
            if v > 0.0 || p <= 0.0 {
                return Err(LmError::config(format!(
                    "unknown log10 probability {v} does not map into (0, 1]"
                )));
            }
            return Ok(Self {
                configured: Some(p),
                base: p,
                uw_log,
                ln_bigrams,
            });
        }

        let mut base = (uw_log - ln_bigrams).exp();
        if !is_probability(base) {
            let fallback = 1.0 / (num_unigrams + 1.0);
            warn!(
                estimate = base,
                fallback, "unknown probability estimate out of range, using 1/(V+1)"
            );
            base = fallback;
        }
        debug!(base, "dynamic unknown probability");
        Ok(Self {
            configured: None,
            base,
            uw_log,
            ln_bigrams,
        })
    }

    pub fn is_static(&self) -> bool {
        self.configured.is_some()
    }

    /// Context-free estimate, used when there is no history to refine it.
    pub fn base(&self) -> f64 {
        self.base
    }

    /// Probability of an unknown word following `history`. Only the last
    /// history token is consulted.
    pub fn probability<S: AsRef<str>>(&self, store: &CountStore, history: &[S]) -> f64 {
        if self.configured.is_some() || history.is_empty() {
            return self.base;
        }
        let follow = store.lookup(&history[history.len() - 1..]).follow.total();
        if follow == 0 {
            return self.base;
        }
        let p = ((follow as f64).ln() - self.ln_bigrams + self.uw_log).exp();
        if is_probability(p) {
            p
        } else {
            self.base
        }
    }
}

fn is_probability(p: f64) -> bool {
    p.is_finite() && p > 0.0 && p <= 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CountStoreBuilder;
    use crate::discount::{DiscountEstimator, DiscountMode};

    fn toy() -> CountStore {
        let mut b = CountStoreBuilder::new(3).unwrap();
        b.add_text("the quick brown fox");
        b.add_text("the quick brown cat");
        b.build().unwrap()
    }

    #[test]
    fn static_mode() {
        let s = toy();
        let d = DiscountSet::uniform(3, 0.5);
        let u = UnknownProbabilityModel::new(s.global_stats(), &d, Some(-3.0)).unwrap();
        assert!(u.is_static());
        assert!((u.base() - 1e-3).abs() < 1e-15);
        assert_eq!(u.probability(&s, &["brown"]), u.base());
    }

    #[test]
    fn non_finite_configuration_means_dynamic() {
        let s = toy();
        let d = DiscountSet::uniform(3, 0.5);
        for v in [None, Some(f64::NAN), Some(f64::NEG_INFINITY)] {
            let u = UnknownProbabilityModel::new(s.global_stats(), &d, v).unwrap();
            assert!(!u.is_static());
        }
    }

    #[test]
    fn dynamic_base_and_context_refinement() {
        let s = toy();
        let d = DiscountSet::uniform(3, 0.5);
        let u = UnknownProbabilityModel::new(s.global_stats(), &d, None).unwrap();
        // 0.5 / (4 bigrams * 5 unigrams)
        assert!((u.base() - 0.025).abs() < 1e-12);
        // "brown" is followed by 2 distinct words: 2/4 * 0.5/5
        assert!((u.probability(&s, &["quick", "brown"]) - 0.05).abs() < 1e-12);
        // "fox" never acts as a history
        assert_eq!(u.probability(&s, &["fox"]), u.base());
        assert_eq!(u.probability::<&str>(&s, &[]), u.base());
    }

    #[test]
    fn zero_discount_falls_back() {
        let s = toy();
        let d = DiscountSet::uniform(3, 0.0);
        let u = UnknownProbabilityModel::new(s.global_stats(), &d, None).unwrap();
        assert!((u.base() - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(u.probability(&s, &["brown"]), u.base());
    }

    #[test]
    fn rejects_positive_log_probability() {
        let s = toy();
        let d = DiscountEstimator::estimate(3, s.global_stats(), -1.0, DiscountMode::Standard)
            .unwrap();
        assert!(UnknownProbabilityModel::new(s.global_stats(), &d, Some(0.5)).is_err());
        assert!(UnknownProbabilityModel::new(s.global_stats(), &d, Some(-400.0)).is_err());
    }
}
