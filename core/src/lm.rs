// core/src/lm.rs
//
// LanguageModel: the scoring surface used by services and tools.
//
// Wraps a shared CountStore and one SmoothingEngine, and adds the vocabulary
// <-> id mapping, OOV predicates, sequence scoring with the configured
// boundary handling, iteration over the model-order n-grams and next-word
// prediction.

use crate::builder::CountStoreBuilder;
use crate::config::LmConfig;
use crate::error::Result;
use crate::sequence::ngram_sequence;
use crate::smoothing::SmoothingEngine;
use crate::store::CountStore;
use crate::vocab::{SENTENCE_START, UNKNOWN_WORD};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LanguageModel {
    engine: SmoothingEngine,
    config: LmConfig,
}

impl LanguageModel {
    pub fn new(store: Arc<CountStore>, config: LmConfig) -> Result<Self> {
        let engine = SmoothingEngine::new(store, &config)?;
        Ok(Self { engine, config })
    }

    /// Load the index in `dir` (snapshot or joined counts) and build the model.
    pub fn open<P: AsRef<Path>>(dir: P, config: LmConfig) -> Result<Self> {
        config.validate()?;
        let store = CountStore::open(dir, config.normalize_unicode)?;
        Self::new(Arc::new(store), config)
    }

    /// Count the given tokenized sentences in memory and build the model.
    /// Sentence tags from the configuration are applied before counting.
    pub fn from_sentences<I, T, S>(sentences: I, config: LmConfig) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[S]>,
        S: AsRef<str>,
    {
        config.validate()?;
        let mut builder = CountStoreBuilder::new(config.order)?
            .min_count(config.min_count)
            .normalize_unicode(config.normalize_unicode);
        for sentence in sentences {
            builder.add_sentence(&config.sentence_tags.apply(sentence.as_ref()));
        }
        Self::new(Arc::new(builder.build()?), config)
    }

    pub fn engine(&self) -> &SmoothingEngine {
        &self.engine
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    pub fn store(&self) -> &CountStore {
        self.engine.store()
    }

    pub fn order(&self) -> usize {
        self.engine.order()
    }

    pub fn word(&self, id: u32) -> Option<&str> {
        self.store().vocabulary().word(id)
    }

    /// Vocabulary id, `None` for out-of-vocabulary words.
    pub fn word_index(&self, word: &str) -> Option<u32> {
        if self.is_unknown_word(word) {
            return None;
        }
        self.store().vocabulary().id(word)
    }

    pub fn is_unknown_word(&self, word: &str) -> bool {
        self.store().is_oov(word)
    }

    pub fn ngram_as_ids<S: AsRef<str>>(&self, ngram: &[S]) -> Vec<Option<u32>> {
        ngram.iter().map(|w| self.word_index(w.as_ref())).collect()
    }

    /// Words for `ids`; unknown ids map to `<unk>`.
    pub fn ngram_as_words(&self, ids: &[u32]) -> Vec<&str> {
        ids.iter()
            .map(|&id| self.word(id).unwrap_or(UNKNOWN_WORD))
            .collect()
    }

    pub fn ngram_contains_oov<S: AsRef<str>>(&self, ngram: &[S]) -> bool {
        ngram.iter().any(|w| self.is_unknown_word(w.as_ref()))
    }

    pub fn ngram_ends_with_oov<S: AsRef<str>>(&self, ngram: &[S]) -> bool {
        ngram
            .last()
            .map_or(true, |w| self.is_unknown_word(w.as_ref()))
    }

    /// p(w_n | w_1 .. w_n-1).
    pub fn ngram_probability<S: AsRef<str>>(&self, ngram: &[S]) -> f64 {
        self.engine.score(ngram)
    }

    /// log10 p(w_n | w_1 .. w_n-1).
    pub fn ngram_log_probability<S: AsRef<str>>(&self, ngram: &[S]) -> f64 {
        self.engine.log10_score(ngram)
    }

    pub fn ngram_log_probability_ids(&self, ids: &[u32]) -> f64 {
        self.ngram_log_probability(&self.ngram_as_words(ids))
    }

    /// Sum of the log10 probabilities of every n-gram.
    pub fn sequence_log_probability<S: AsRef<str>>(&self, ngrams: &[Vec<S>]) -> f64 {
        ngrams
            .iter()
            .map(|g| self.ngram_log_probability(g))
            .sum()
    }

    /// N-grams to score for a tokenized sentence, after sentence tags and
    /// boundary handling.
    pub fn ngram_sequence<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<Vec<String>> {
        let tagged = self.config.sentence_tags.apply(tokens);
        ngram_sequence(&tagged, self.order(), self.config.boundary)
    }

    pub fn sentence_log_probability<S: AsRef<str>>(&self, tokens: &[S]) -> f64 {
        self.sequence_log_probability(&self.ngram_sequence(tokens))
    }

    /// Every stored n-gram of the model order.
    pub fn ngrams(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        self.store()
            .ngrams(self.order())
            .map(|r| r.tokens().collect::<Vec<_>>())
    }

    /// Like [`ngrams`](Self::ngrams) as vocabulary ids. N-grams with a token
    /// missing from the vocabulary are skipped.
    pub fn ngram_ids(&self) -> impl Iterator<Item = Vec<u32>> + '_ {
        let vocab = self.store().vocabulary();
        self.store()
            .ngrams(self.order())
            .filter_map(move |r| r.tokens().map(|t| vocab.id(t)).collect::<Option<Vec<u32>>>())
    }

    /// Most probable next word after `history`. Ties go to the lowest id.
    pub fn predict_next_word<S: AsRef<str>>(&self, history: &[S]) -> Option<&str> {
        let keep = self.order().saturating_sub(1).min(history.len());
        let mut ngram: Vec<&str> = history[history.len() - keep..]
            .iter()
            .map(|t| t.as_ref())
            .collect();
        ngram.push("");
        let last = ngram.len() - 1;

        let mut best: Option<(&str, f64)> = None;
        for w in self.store().vocabulary().iter() {
            if w == SENTENCE_START || w == UNKNOWN_WORD {
                continue;
            }
            ngram[last] = w;
            let p = self.engine.score(&ngram);
            if best.map_or(true, |(_, bp)| p > bp) {
                best = Some((w, p));
            }
        }
        best.map(|(w, _)| w)
    }
}
