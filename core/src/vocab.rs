//! Vocabulary: word <-> dense id mapping backed by an fst map.
//!
//! Ids are assigned in lexicographic byte order, which is also the fst's
//! stream order, so the id -> word table can be rebuilt from the fst alone.
use crate::error::{LmError, Result};
use fst::{Map, MapBuilder, Streamer};
use std::collections::BTreeSet;

/// Sentence start marker.
pub const SENTENCE_START: &str = "<s>";
/// Sentence end marker.
pub const SENTENCE_END: &str = "</s>";
/// Out-of-vocabulary marker.
pub const UNKNOWN_WORD: &str = "<unk>";

#[derive(Debug, Clone)]
pub struct Vocabulary {
    map: Map<Vec<u8>>,
    words: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            map: Map::default(),
            words: Vec::new(),
        }
    }
}

impl Vocabulary {
    pub fn from_words<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sorted: BTreeSet<String> = words.into_iter().map(Into::into).collect();
        let mut builder = MapBuilder::memory();
        for (id, w) in sorted.iter().enumerate() {
            builder.insert(w, id as u64)?;
        }
        let map = Map::new(builder.into_inner()?)?;
        Ok(Self {
            map,
            words: sorted.into_iter().collect(),
        })
    }

    /// Rebuild from serialized fst bytes.
    pub fn from_fst_bytes(bytes: Vec<u8>) -> Result<Self> {
        let map = Map::new(bytes)?;
        let mut words = Vec::with_capacity(map.len());
        let mut stream = map.stream();
        while let Some((k, v)) = stream.next() {
            if v as usize != words.len() {
                return Err(LmError::Snapshot(format!(
                    "vocabulary ids out of order at id {v}"
                )));
            }
            let w = std::str::from_utf8(k)
                .map_err(|e| LmError::Snapshot(format!("vocabulary entry not utf-8: {e}")))?;
            words.push(w.to_string());
        }
        drop(stream);
        Ok(Self { map, words })
    }

    pub fn as_fst_bytes(&self) -> &[u8] {
        self.map.as_fst().as_bytes()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn id(&self, word: &str) -> Option<u32> {
        self.map.get(word).map(|v| v as u32)
    }

    pub fn word(&self, id: u32) -> Option<&str> {
        self.words.get(id as usize).map(String::as_str)
    }

    /// True for the `<unk>` marker and for words never seen as unigrams.
    pub fn is_oov(&self, word: &str) -> bool {
        word == UNKNOWN_WORD || !self.map.contains_key(word)
    }

    /// Words in id order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }
}
