//! Kneser-Ney discount estimation from count-class histograms.
//!
//! A discount is either broadcast from a manual value in `[0, 1]` or
//! estimated per order:
//!
//! - standard: `Y = N1 / (N1 + 2 N2)`, used for every count class
//! - modified: `Y` clamped to `[0.05, 0.5]`, then
//!   `D1 = 1 - 2Y N2/N1`, `D2 = 2 - 3Y N3/N2`, `D3+ = 3 - 4Y N4/N3`,
//!   rescaled to sum to `Y` and clamped to `[0.05, 0.95]`
//!
//! Histograms are repaired first so the weighted counts `i * N[i]` are
//! strictly decreasing, which keeps every estimate inside `(0, 1)`.
use crate::error::{LmError, Result};
use crate::stats::{GlobalStatistics, Histogram, COUNT_CLASSES};
use serde::{Deserialize, Serialize};

/// Fill value for orders that were not estimated.
pub const DEFAULT_DISCOUNT: f64 = 0.7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscountMode {
    #[default]
    Standard,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discount {
    pub y: f64,
    pub d1: f64,
    pub d2: f64,
    pub d3p: f64,
}

impl Discount {
    pub fn uniform(v: f64) -> Self {
        Self {
            y: v,
            d1: v,
            d2: v,
            d3p: v,
        }
    }

    /// Class-conditional discount for an n-gram seen `count` times.
    pub fn for_count(&self, count: f64) -> f64 {
        if count <= 0.0 {
            0.0
        } else if count < 2.0 {
            self.d1
        } else if count < 3.0 {
            self.d2
        } else {
            self.d3p
        }
    }
}

/// Per-order discounts, indexed directly by order (slot 0 holds the fill value).
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountSet {
    per_order: Vec<Discount>,
}

impl DiscountSet {
    pub fn uniform(order: usize, v: f64) -> Self {
        Self {
            per_order: vec![Discount::uniform(v); order + 1],
        }
    }

    /// Explicit per-order discounts; `per_order[n]` applies to order `n` and
    /// slot 0 is unused.
    pub fn new(per_order: Vec<Discount>) -> Self {
        Self { per_order }
    }

    pub fn get(&self, n: usize) -> Discount {
        self.per_order
            .get(n)
            .copied()
            .unwrap_or_else(|| Discount::uniform(DEFAULT_DISCOUNT))
    }

    pub fn y(&self, n: usize) -> f64 {
        self.get(n).y
    }

    pub fn order(&self) -> usize {
        self.per_order.len().saturating_sub(1)
    }
}

pub struct DiscountEstimator;

impl DiscountEstimator {
    /// Build the discount table for orders `1..=order`.
    ///
    /// `manual` in `[0, 1]` is broadcast; any other finite value requests
    /// estimation from `stats`, which then must carry a histogram for every
    /// order.
    pub fn estimate(
        order: usize,
        stats: &GlobalStatistics,
        manual: f64,
        mode: DiscountMode,
    ) -> Result<DiscountSet> {
        if manual.is_nan() {
            return Err(LmError::config("discount must not be NaN"));
        }
        if (0.0..=1.0).contains(&manual) {
            return Ok(DiscountSet::uniform(order, manual));
        }

        let mut per_order = vec![Discount::uniform(DEFAULT_DISCOUNT); order + 1];
        for (n, slot) in per_order.iter_mut().enumerate().skip(1) {
            let h = stats.histogram(n).ok_or_else(|| {
                LmError::config(format!(
                    "discount {manual} requests estimation but there is no count-class histogram for order {n}"
                ))
            })?;
            let repaired = repair_histogram(h);
            *slot = match mode {
                DiscountMode::Standard => Discount::uniform(standard_y(&repaired)),
                DiscountMode::Modified => modified(&repaired),
            };
        }
        Ok(DiscountSet { per_order })
    }
}

/// Force `N[i] >= 1` and `i*N[i] < (i-1)*N[i-1]`, walking down from the
/// highest count class. `N0` is left untouched.
pub fn repair_histogram(h: &Histogram) -> [f64; COUNT_CLASSES] {
    let mut n = h.map(|v| v as f64);
    for i in (2..COUNT_CLASSES).rev() {
        if n[i] == 0.0 {
            n[i] = 1.0;
        }
        let fi = i as f64;
        if fi * n[i] >= (fi - 1.0) * n[i - 1] {
            n[i - 1] = fi * n[i] + 1.0;
        }
    }
    n
}

fn standard_y(n: &[f64; COUNT_CLASSES]) -> f64 {
    n[1] / (n[1] + 2.0 * n[2])
}

fn modified(n: &[f64; COUNT_CLASSES]) -> Discount {
    let y = standard_y(n).clamp(0.05, 0.5);
    let d1 = 1.0 - 2.0 * y * (n[2] / n[1]);
    let d2 = 2.0 - 3.0 * y * (n[3] / n[2]);
    let d3p = 3.0 - 4.0 * y * (n[4] / n[3]);
    let s = d1 + d2 + d3p;
    let scale = |d: f64| (d / s * y).clamp(0.05, 0.95);
    Discount {
        y,
        d1: scale(d1),
        d2: scale(d2),
        d3p: scale(d3p),
    }
}
