//! Per-order aggregate statistics and the `__sum_ngrams__` sidecar format.
//!
//! For every order `n` the index keeps a count-class histogram
//! `[N0, N1, N2, N3, N4, N5+]` where `N0` is the number of distinct n-grams
//! and `Nk` the number of n-grams seen exactly `k` times (the last class is
//! open-ended), plus the total number of occurrences `S[n]`.
//!
//! Sidecar example:
//!
//! ```text
//! # n-gram statistics
//! max_n=3
//! max_c=6
//! n1=5,2,3,0,0,0
//! s1=8
//! ```
use crate::error::{LmError, Result};
use crate::record::NgramRecord;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, warn};

/// Number of histogram slots: distinct total plus count classes 1..=5+.
pub const COUNT_CLASSES: usize = 6;

pub type Histogram = [u64; COUNT_CLASSES];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStatistics {
    // index 0 unused so that orders index directly
    histograms: Vec<Histogram>,
    sums: Vec<u64>,
}

impl GlobalStatistics {
    pub fn new(max_order: usize) -> Self {
        Self {
            histograms: vec![[0; COUNT_CLASSES]; max_order + 1],
            sums: vec![0; max_order + 1],
        }
    }

    /// Highest order with statistics.
    pub fn max_order(&self) -> usize {
        self.histograms.len().saturating_sub(1)
    }

    fn ensure_order(&mut self, n: usize) {
        if n >= self.histograms.len() {
            self.histograms.resize(n + 1, [0; COUNT_CLASSES]);
            self.sums.resize(n + 1, 0);
        }
    }

    /// Count an n-gram of order `n` seen `count` times.
    pub fn record(&mut self, n: usize, count: u64) {
        if n == 0 || count == 0 {
            return;
        }
        self.ensure_order(n);
        let h = &mut self.histograms[n];
        h[0] += 1;
        h[(count as usize).min(COUNT_CLASSES - 1)] += 1;
        self.sums[n] += count;
    }

    /// Recompute statistics from loaded records.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a NgramRecord>) -> Self {
        let mut stats = Self::default();
        for r in records {
            stats.record(r.cardinality(), r.count);
        }
        stats
    }

    pub fn histogram(&self, n: usize) -> Option<&Histogram> {
        if n == 0 {
            return None;
        }
        self.histograms.get(n)
    }

    /// Total occurrences of order-`n` n-grams.
    pub fn sum(&self, n: usize) -> u64 {
        self.sums.get(n).copied().unwrap_or(0)
    }

    /// Number of distinct order-`n` n-grams.
    pub fn distinct(&self, n: usize) -> u64 {
        self.histogram(n).map(|h| h[0]).unwrap_or(0)
    }

    /// `[distinct, N1, N2, N3+]` for order `n`.
    pub fn count_classes(&self, n: usize) -> [u64; 4] {
        match self.histogram(n) {
            Some(h) => [h[0], h[1], h[2], h[3..].iter().sum()],
            None => [0; 4],
        }
    }

    pub fn num_unigrams(&self) -> u64 {
        self.distinct(1)
    }

    pub fn num_bigrams(&self) -> u64 {
        self.distinct(2)
    }

    pub fn parse_sidecar(text: &str) -> Self {
        let mut stats = Self::default();
        let mut max_n = 0usize;
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!(lineno = lineno + 1, line, "sidecar line without '=', skipped");
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if let Err(msg) = stats.apply_sidecar_entry(key, value, &mut max_n) {
                warn!(lineno = lineno + 1, line, "{msg}, skipped");
            }
        }
        if max_n > 0 {
            stats.ensure_order(max_n);
        }
        stats
    }

    fn apply_sidecar_entry(
        &mut self,
        key: &str,
        value: &str,
        max_n: &mut usize,
    ) -> std::result::Result<(), String> {
        let order_of = |suffix: &str| {
            suffix
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| format!("bad order in key {key:?}"))
        };
        match key {
            "max_n" => {
                *max_n = value.parse().map_err(|_| "bad max_n".to_string())?;
            }
            "max_c" => {
                debug!(max_c = value, "sidecar count classes");
            }
            _ if key.starts_with('n') => {
                let n = order_of(&key[1..])?;
                let values = value
                    .split(',')
                    .map(|v| v.trim().parse::<u64>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| format!("bad histogram for {key}"))?;
                self.ensure_order(n);
                let h = &mut self.histograms[n];
                *h = [0; COUNT_CLASSES];
                for (i, v) in values.into_iter().enumerate() {
                    // classes past the last slot fold into the open-ended one
                    h[i.min(COUNT_CLASSES - 1)] += v;
                }
            }
            _ if key.starts_with('s') => {
                let n = order_of(&key[1..])?;
                let sum = value.parse().map_err(|_| format!("bad sum for {key}"))?;
                self.ensure_order(n);
                self.sums[n] = sum;
            }
            _ => debug!(key, "unknown sidecar key ignored"),
        }
        Ok(())
    }

    pub fn load_sidecar<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| LmError::io(path, e))?;
        Ok(Self::parse_sidecar(&text))
    }

    pub fn to_sidecar_string(&self) -> String {
        let mut out = String::from("# n-gram count-class histograms and occurrence sums\n");
        let _ = writeln!(out, "max_n={}", self.max_order());
        let _ = writeln!(out, "max_c={}", COUNT_CLASSES);
        for n in 1..=self.max_order() {
            let h = &self.histograms[n];
            let joined: Vec<String> = h.iter().map(|v| v.to_string()).collect();
            let _ = writeln!(out, "n{}={}", n, joined.join(","));
            let _ = writeln!(out, "s{}={}", n, self.sums[n]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sidecar_reads_histograms_and_sums() {
        let text = "# comment\nmax_n=2\nmax_c=6\nn1=5,2,3,0,0,0\ns1=8\nn2=4,2,2,0,0,0\ns2=6\n";
        let s = GlobalStatistics::parse_sidecar(text);
        assert_eq!(s.max_order(), 2);
        assert_eq!(s.num_unigrams(), 5);
        assert_eq!(s.num_bigrams(), 4);
        assert_eq!(s.sum(1), 8);
        assert_eq!(s.count_classes(2), [4, 2, 2, 0]);
        assert!(s.histogram(3).is_none());
    }

    #[test]
    fn extra_count_classes_fold_into_last_slot() {
        let s = GlobalStatistics::parse_sidecar("n1=10,1,1,1,1,1,3,2\n");
        assert_eq!(s.histogram(1), Some(&[10, 1, 1, 1, 1, 6]));
        assert_eq!(s.count_classes(1), [10, 1, 1, 8]);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let s = GlobalStatistics::parse_sidecar("garbage\nn1=1,x\ns1=3\nn0=1,1\n");
        assert_eq!(s.sum(1), 3);
        assert_eq!(s.histogram(1), Some(&[0; COUNT_CLASSES]));
    }

    #[test]
    fn record_and_sidecar_round_trip() {
        let mut s = GlobalStatistics::new(2);
        s.record(1, 1);
        s.record(1, 7);
        s.record(2, 2);
        assert_eq!(s.histogram(1), Some(&[2, 1, 0, 0, 0, 1]));
        let again = GlobalStatistics::parse_sidecar(&s.to_sidecar_string());
        assert_eq!(again, s);
    }
}
