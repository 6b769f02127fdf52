//! Running log-probability and perplexity over many n-grams.
//!
//! A `SequenceScorer` borrows a [`LanguageModel`] and keeps its own
//! accumulators, so it is single-owner; run one scorer per thread when
//! scoring a corpus in parallel. Log-probabilities are memoized in an LRU
//! cache, which survives `reset()` since scores are deterministic.
use crate::lm::LanguageModel;
use crate::record::join_key;
use crate::vocab::UNKNOWN_WORD;
use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::trace;

pub struct SequenceScorer<'m> {
    model: &'m LanguageModel,
    skip_oov: bool,
    log10_sum: f64,
    num_ngrams: u64,
    oov_log10_sum: f64,
    num_oov: u64,
    base_perplexity: f64,
    cache: Option<LruCache<String, f64>>,
}

impl<'m> SequenceScorer<'m> {
    pub fn new(model: &'m LanguageModel) -> Self {
        let unk = vec![UNKNOWN_WORD; model.order()];
        let base_perplexity = 10f64.powf(-model.ngram_log_probability(&unk));
        let cache = NonZeroUsize::new(model.config().score_cache_size).map(LruCache::new);
        Self {
            model,
            skip_oov: false,
            log10_sum: 0.0,
            num_ngrams: 0,
            oov_log10_sum: 0.0,
            num_oov: 0,
            base_perplexity,
            cache,
        }
    }

    /// Keep n-grams ending in an unknown word out of the perplexity.
    pub fn skip_oov(mut self, skip: bool) -> Self {
        self.skip_oov = skip;
        self
    }

    fn log10_prob<S: AsRef<str>>(&mut self, ngram: &[S]) -> f64 {
        let Some(cache) = self.cache.as_mut() else {
            return self.model.ngram_log_probability(ngram);
        };
        let key = join_key(ngram);
        if let Some(&lp) = cache.get(&key) {
            return lp;
        }
        let lp = self.model.ngram_log_probability(ngram);
        cache.put(key, lp);
        lp
    }

    /// Score one n-gram and accumulate it. Returns its log10 probability.
    pub fn add_log10_prob<S: AsRef<str>>(&mut self, ngram: &[S]) -> f64 {
        let lp = self.log10_prob(ngram);
        if self.model.ngram_ends_with_oov(ngram) {
            self.oov_log10_sum += lp;
            self.num_oov += 1;
            if self.skip_oov {
                trace!(ngram = %join_key(ngram), "oov n-gram left out");
                return lp;
            }
        }
        self.log10_sum += lp;
        self.num_ngrams += 1;
        lp
    }

    /// Score every n-gram of a sequence; returns the summed log10 probability.
    pub fn add_sequence<S: AsRef<str>>(&mut self, ngrams: &[Vec<S>]) -> f64 {
        ngrams.iter().map(|g| self.add_log10_prob(g)).sum()
    }

    /// `10^(-sum / N)`; the all-`<unk>` perplexity when nothing usable was
    /// accumulated.
    pub fn perplexity(&self) -> f64 {
        if self.num_ngrams == 0 || !self.log10_sum.is_finite() {
            return self.base_perplexity;
        }
        10f64.powf(-self.log10_sum / self.num_ngrams as f64)
    }

    pub fn reset(&mut self) {
        self.log10_sum = 0.0;
        self.num_ngrams = 0;
        self.oov_log10_sum = 0.0;
        self.num_oov = 0;
    }

    pub fn log10_sum(&self) -> f64 {
        self.log10_sum
    }

    pub fn num_ngrams(&self) -> u64 {
        self.num_ngrams
    }

    pub fn oov_log10_sum(&self) -> f64 {
        self.oov_log10_sum
    }

    pub fn num_oov(&self) -> u64 {
        self.num_oov
    }

    pub fn base_perplexity(&self) -> f64 {
        self.base_perplexity
    }
}

/// Perplexity of `ngrams` under `model`.
pub fn perplexity_of<S: AsRef<str>>(model: &LanguageModel, ngrams: &[Vec<S>], skip_oov: bool) -> f64 {
    let mut scorer = SequenceScorer::new(model).skip_oov(skip_oov);
    scorer.add_sequence(ngrams);
    scorer.perplexity()
}
