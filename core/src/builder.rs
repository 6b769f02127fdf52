// core/src/builder.rs
//
// In-memory counting pipeline: tokenized sentences -> CountStore.
//
// Mirrors what the external joined-counts pipeline produces, for small
// corpora and tests:
// - raw counts of every n-gram up to `order`, pruned by `min_count`
// - follow(h):        distinct w with c(h w) > 0, bucketed by c(h w)
// - precede(g):       distinct x with c(x g) > 0, bucketed by c(x g)
// - follow_precede(m): distinct (x, y) with c(x m y) > 0, bucketed by c(x m y)
// - per-order count-class histograms and occurrence sums

use crate::error::{LmError, Result};
use crate::record::{join_key, ExtensionStats, NgramRecord};
use crate::stats::GlobalStatistics;
use crate::store::CountStore;
use ahash::AHashMap;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone)]
pub struct CountStoreBuilder {
    order: usize,
    min_count: u64,
    normalize_unicode: bool,
    counts: AHashMap<Vec<String>, u64>,
    sentences: usize,
}

impl CountStoreBuilder {
    pub fn new(order: usize) -> Result<Self> {
        if order == 0 {
            return Err(LmError::config("order must be at least 1"));
        }
        Ok(Self {
            order,
            min_count: 1,
            normalize_unicode: false,
            counts: AHashMap::new(),
            sentences: 0,
        })
    }

    /// N-grams seen fewer than `min_count` times are dropped before the
    /// extension statistics are derived.
    pub fn min_count(mut self, min_count: u64) -> Self {
        self.min_count = min_count.max(1);
        self
    }

    pub fn normalize_unicode(mut self, on: bool) -> Self {
        self.normalize_unicode = on;
        self
    }

    pub fn add_sentence<S: AsRef<str>>(&mut self, tokens: &[S]) {
        let tokens: Vec<String> = tokens
            .iter()
            .map(|t| {
                if self.normalize_unicode {
                    t.as_ref().nfc().collect()
                } else {
                    t.as_ref().to_string()
                }
            })
            .filter(|t| !t.is_empty())
            .collect();
        for n in 1..=self.order.min(tokens.len()) {
            for window in tokens.windows(n) {
                *self.counts.entry(window.to_vec()).or_insert(0) += 1;
            }
        }
        self.sentences += 1;
    }

    /// Whitespace-tokenize `line` and add it as one sentence.
    pub fn add_text(&mut self, line: &str) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        self.add_sentence(&tokens);
    }

    /// Derive records and statistics from the accumulated counts.
    pub fn records(&self) -> (Vec<NgramRecord>, GlobalStatistics) {
        let kept: Vec<(&Vec<String>, u64)> = self
            .counts
            .iter()
            .filter(|(_, c)| **c >= self.min_count)
            .map(|(g, c)| (g, *c))
            .collect();

        let mut follow: AHashMap<&[String], ExtensionStats> = AHashMap::new();
        let mut precede: AHashMap<&[String], ExtensionStats> = AHashMap::new();
        let mut follow_precede: AHashMap<&[String], ExtensionStats> = AHashMap::new();
        let mut stats = GlobalStatistics::new(self.order);

        for &(g, c) in &kept {
            let k = g.len();
            stats.record(k, c);
            if k >= 2 {
                follow.entry(&g[..k - 1]).or_default().add(c);
                precede.entry(&g[1..]).or_default().add(c);
            }
            if k >= 3 {
                follow_precede.entry(&g[1..k - 1]).or_default().add(c);
            }
        }

        let mut records: Vec<NgramRecord> = kept
            .iter()
            .map(|&(g, c)| {
                let key = g.as_slice();
                NgramRecord {
                    key: join_key(g),
                    count: c,
                    follow: follow.get(key).copied().unwrap_or_default(),
                    precede: precede.get(key).copied().unwrap_or_default(),
                    follow_precede: follow_precede.get(key).copied().unwrap_or_default(),
                }
            })
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(
            sentences = self.sentences,
            distinct = self.counts.len(),
            kept = records.len(),
            "counted n-grams"
        );
        (records, stats)
    }

    pub fn build(self) -> Result<CountStore> {
        let (records, stats) = self.records();
        CountStore::from_records(records, Some(stats), self.normalize_unicode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> CountStore {
        let mut b = CountStoreBuilder::new(3).unwrap();
        b.add_text("the quick brown fox");
        b.add_text("the quick brown cat");
        b.build().unwrap()
    }

    #[test]
    fn raw_counts() {
        let s = toy();
        assert_eq!(s.quantity(&["the"]), 2);
        assert_eq!(s.quantity(&["brown", "fox"]), 1);
        assert_eq!(s.quantity(&["the", "quick", "brown"]), 2);
        assert_eq!(s.quantity(&["the", "quick", "brown", "fox"]), 0);
        assert_eq!(s.vocabulary_size(), 5);
    }

    #[test]
    fn extension_statistics() {
        let s = toy();
        let brown = s.lookup(&["brown"]);
        assert_eq!(brown.follow.total(), 2);
        assert_eq!(brown.follow.n1, 2);
        assert_eq!(brown.precede.total(), 1);
        assert_eq!(brown.precede.n2, 1);
        // quick brown {fox, cat}
        assert_eq!(brown.follow_precede.total(), 2);
        assert_eq!(s.lookup(&["quick"]).follow_precede.total(), 1);
        assert_eq!(s.lookup(&["quick", "brown"]).follow.sum, 2);
        assert_eq!(s.lookup(&["fox"]).precede.total(), 1);
    }

    #[test]
    fn global_statistics() {
        let s = toy();
        let g = s.global_stats();
        assert_eq!(g.histogram(1), Some(&[5, 2, 3, 0, 0, 0]));
        assert_eq!(g.num_bigrams(), 4);
        assert_eq!(g.sum(2), 6);
        assert_eq!(g.count_classes(3), [3, 2, 1, 0]);
    }

    #[test]
    fn min_count_prunes_before_statistics() {
        let mut b = CountStoreBuilder::new(2).unwrap().min_count(2);
        b.add_text("a b");
        b.add_text("a b");
        b.add_text("a c");
        let s = b.build().unwrap();
        assert_eq!(s.quantity(&["a", "c"]), 0);
        assert_eq!(s.quantity(&["c"]), 0);
        assert_eq!(s.lookup(&["a"]).follow.total(), 1);
    }

    #[test]
    fn zero_order_is_rejected() {
        assert!(CountStoreBuilder::new(0).is_err());
    }
}
