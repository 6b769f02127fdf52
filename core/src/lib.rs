//! ngramlm-core
//!
//! Scoring engine for n-gram language models backed by a precomputed count
//! index: per-n-gram counts with continuation annotations, global count-class
//! histograms, discount estimation and a family of Kneser-Ney / backoff
//! smoothing algorithms.
//!
//! Indexes are read from the joined-counts text format (optionally gzipped)
//! or from a binary snapshot made of an FST key index plus bincode payloads.
//!
//! Public API:
//! - `CountStore` - read-only n-gram index with global statistics
//! - `CountStoreBuilder` - counts tokenized sentences in memory
//! - `DiscountEstimator` / `DiscountSet` - per-order discounts
//! - `UnknownProbabilityModel` - probability of out-of-vocabulary words
//! - `SmoothingEngine` - smoothed probabilities, one algorithm per instance
//! - `LanguageModel` - vocabulary, sequence scoring and prediction facade
//! - `SequenceScorer` - running log-probability and perplexity
//! - `LmConfig` - configuration, loadable from TOML

pub mod error;
pub use error::{LmError, Result};

pub mod record;
pub use record::{ExtensionStats, NgramRecord, ParseError};

pub mod stats;
pub use stats::{GlobalStatistics, Histogram, COUNT_CLASSES};

pub mod vocab;
pub use vocab::{Vocabulary, SENTENCE_END, SENTENCE_START, UNKNOWN_WORD};

pub mod store;
pub use store::CountStore;

pub mod builder;
pub use builder::CountStoreBuilder;

pub mod discount;
pub use discount::{Discount, DiscountEstimator, DiscountMode, DiscountSet};

pub mod unknown;
pub use unknown::UnknownProbabilityModel;

pub mod smoothing;
pub use smoothing::{SmoothingEngine, SmoothingKind};

pub mod sequence;
pub use sequence::{ngram_sequence, BoundaryHandling, SentenceTags};

pub mod config;
pub use config::LmConfig;

pub mod lm;
pub use lm::LanguageModel;

pub mod scorer;
pub use scorer::{perplexity_of, SequenceScorer};
