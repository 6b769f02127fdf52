//! Model configuration.
//!
//! An explicit struct handed to every constructor, loadable from TOML:
//!
//! ```toml
//! order = 3
//! smoothing = "modified-kneser-ney-recursive"
//! discount = -1.0
//! unknown_log10_prob = -7.0
//! boundary = "grow"
//! ```
//!
//! Missing keys take their default value.
use crate::discount::DiscountMode;
use crate::error::{LmError, Result};
use crate::sequence::{BoundaryHandling, SentenceTags};
use crate::smoothing::SmoothingKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LmConfig {
    /// Model order (maximum n-gram length scored), at least 1.
    pub order: usize,

    /// Smoothing algorithm.
    pub smoothing: SmoothingKind,

    /// Discount in [0, 1] applied to every order and count class. Any other
    /// value estimates the discounts from the count-class histograms.
    pub discount: f64,

    /// Estimation formula; `None` follows the smoothing kind.
    pub discount_mode: Option<DiscountMode>,

    /// Multiplier applied once by stupid backoff when it backs off.
    pub backoff_weight: f64,

    /// Minimum count of n-grams kept when counting in memory.
    pub min_count: u64,

    /// Fixed log10 probability of unknown words. `None` or a non-finite
    /// value derives it from the index statistics.
    pub unknown_log10_prob: Option<f64>,

    /// Recursion depth of the recursive Kneser-Ney variants; negative means
    /// the model order.
    pub max_backoff_recursions: i32,

    pub boundary: BoundaryHandling,
    pub sentence_tags: SentenceTags,

    /// NFC-normalize index keys and query tokens.
    pub normalize_unicode: bool,

    /// Capacity of the per-scorer log-probability cache.
    pub score_cache_size: usize,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            order: 3,
            smoothing: SmoothingKind::default(),
            discount: -1.0,
            discount_mode: None,
            backoff_weight: 0.4,
            min_count: 1,
            unknown_log10_prob: None,
            max_backoff_recursions: -1,
            boundary: BoundaryHandling::default(),
            sentence_tags: SentenceTags::default(),
            normalize_unicode: false,
            score_cache_size: 1024,
        }
    }
}

impl LmConfig {
    /// Reject values no model can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.order == 0 {
            return Err(LmError::config("order must be at least 1"));
        }
        if self.discount.is_nan() {
            return Err(LmError::config("discount must not be NaN"));
        }
        if !(self.backoff_weight > 0.0 && self.backoff_weight <= 1.0) {
            return Err(LmError::config(format!(
                "backoff_weight {} is outside (0, 1]",
                self.backoff_weight
            )));
        }
        if let Some(v) = self.unknown_log10_prob.filter(|v| v.is_finite()) {
            if v > 0.0 {
                return Err(LmError::config(format!(
                    "unknown_log10_prob {v} is a log10 probability and must be <= 0"
                )));
            }
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).map_err(|e| LmError::Toml(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LmError::Toml(e.to_string()))
    }

    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|e| LmError::io(path, e))?;
        Self::from_toml_str(&s)
    }

    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let s = self.to_toml_string()?;
        std::fs::write(path, s).map_err(|e| LmError::io(path, e))
    }
}
