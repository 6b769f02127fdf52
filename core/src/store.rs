//! Read-only n-gram count index.
//!
//! `CountStore` owns every [`NgramRecord`] together with the per-order
//! [`GlobalStatistics`] and the [`Vocabulary`]. Records are sorted by key and
//! addressed through an fst map (key -> record index), the same layout the
//! binary snapshot uses on disk:
//!
//! - `ngrams.fst`      key -> index
//! - `ngrams.bincode`  `Vec<NgramRecord>`
//! - `stats.bincode`   snapshot header with the global statistics
//! - `vocab.fst`       word -> id
//!
//! An index directory produced by the counting pipeline instead holds
//! `ngram.counts.joined.txt.gz` (or the uncompressed `.txt`) and the
//! `__sum_ngrams__` sidecar. Lookups never fail: absent n-grams resolve to
//! the UNKNOWN sentinel. Once built the store is immutable, so it can be
//! shared across threads behind an `Arc` without locking.
use crate::error::{LmError, Result};
use crate::record::{join_key, parse_joined_line, NgramRecord};
use crate::stats::GlobalStatistics;
use crate::vocab::Vocabulary;
use flate2::read::MultiGzDecoder;
use fst::{Map, MapBuilder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

pub const JOINED_COUNTS_GZ: &str = "ngram.counts.joined.txt.gz";
pub const JOINED_COUNTS_TXT: &str = "ngram.counts.joined.txt";
pub const SIDECAR_FILE: &str = "__sum_ngrams__";

const SNAPSHOT_INDEX: &str = "ngrams.fst";
const SNAPSHOT_RECORDS: &str = "ngrams.bincode";
const SNAPSHOT_HEADER: &str = "stats.bincode";
const SNAPSHOT_VOCAB: &str = "vocab.fst";
const SNAPSHOT_VERSION: u32 = 1;

static UNKNOWN_RECORD: NgramRecord = NgramRecord::UNKNOWN;

fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let f = File::create(path).map_err(|e| LmError::io(path, e))?;
    let mut writer = BufWriter::new(f);
    bincode::serialize_into(&mut writer, value)?;
    writer.flush().map_err(|e| LmError::io(path, e))
}

#[derive(Serialize, Deserialize)]
struct SnapshotHeader {
    version: u32,
    normalize_unicode: bool,
    stats: GlobalStatistics,
}

#[derive(Debug, Clone)]
pub struct CountStore {
    index: Map<Vec<u8>>,
    records: Vec<NgramRecord>,
    stats: GlobalStatistics,
    vocab: Vocabulary,
    max_order: usize,
    normalize_unicode: bool,
}

impl CountStore {
    /// Build a store from loose records.
    ///
    /// Duplicate keys keep the first occurrence. When `stats` is `None` the
    /// global statistics are recomputed from the records.
    pub fn from_records(
        mut records: Vec<NgramRecord>,
        stats: Option<GlobalStatistics>,
        normalize_unicode: bool,
    ) -> Result<Self> {
        if normalize_unicode {
            for r in records.iter_mut() {
                r.key = r.key.nfc().collect();
            }
        }
        records.sort_by(|a, b| a.key.as_bytes().cmp(b.key.as_bytes()));
        let before = records.len();
        records.dedup_by(|later, first| {
            let dup = later.key == first.key;
            if dup {
                warn!(key = %later.key, "duplicate n-gram record, keeping first");
            }
            dup
        });
        if records.len() != before {
            debug!(dropped = before - records.len(), "duplicate records removed");
        }

        let mut builder = MapBuilder::memory();
        for (i, r) in records.iter().enumerate() {
            builder.insert(r.key.as_bytes(), i as u64)?;
        }
        let index = Map::new(builder.into_inner()?)?;

        let stats = stats.unwrap_or_else(|| GlobalStatistics::from_records(&records));
        let vocab = Vocabulary::from_words(
            records
                .iter()
                .filter(|r| r.cardinality() == 1)
                .map(|r| r.key.clone()),
        )?;
        let max_order = records
            .iter()
            .map(NgramRecord::cardinality)
            .max()
            .unwrap_or(0)
            .max(stats.max_order());

        info!(
            records = records.len(),
            vocabulary = vocab.len(),
            max_order,
            "count store ready"
        );
        Ok(Self {
            index,
            records,
            stats,
            vocab,
            max_order,
            normalize_unicode,
        })
    }

    /// Parse a joined-counts stream. Malformed lines are logged and skipped.
    pub fn parse_joined_counts<R: BufRead>(reader: R, source: &Path) -> Result<Vec<NgramRecord>> {
        let mut records = Vec::new();
        let mut skipped = 0usize;
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LmError::io(source, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_joined_line(&line) {
                Ok(r) => records.push(r),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        file = %source.display(),
                        lineno = lineno + 1,
                        error = %e,
                        "malformed index record skipped"
                    );
                }
            }
        }
        if skipped > 0 {
            warn!(file = %source.display(), skipped, "index loaded with skipped records");
        }
        Ok(records)
    }

    /// Load a joined-counts file (gzip when the name ends in `.gz`) and an
    /// optional statistics sidecar.
    pub fn load_joined_counts<P: AsRef<Path>>(
        counts: P,
        sidecar: Option<&Path>,
        normalize_unicode: bool,
    ) -> Result<Self> {
        let counts = counts.as_ref();
        let file = File::open(counts).map_err(|e| LmError::io(counts, e))?;
        let reader: Box<dyn Read> = if counts.extension().is_some_and(|e| e == "gz") {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let records = Self::parse_joined_counts(BufReader::new(reader), counts)?;

        let stats = match sidecar {
            Some(p) if p.exists() => Some(GlobalStatistics::load_sidecar(p)?),
            Some(p) => {
                warn!(sidecar = %p.display(), "statistics sidecar missing, recomputing from records");
                None
            }
            None => None,
        };
        Self::from_records(records, stats, normalize_unicode)
    }

    /// Open an index directory: a binary snapshot if present, otherwise the
    /// joined-counts file and sidecar.
    pub fn open<P: AsRef<Path>>(dir: P, normalize_unicode: bool) -> Result<Self> {
        let dir = dir.as_ref();
        if dir.join(SNAPSHOT_INDEX).exists() {
            let store = Self::load_snapshot(dir)?;
            if store.normalize_unicode != normalize_unicode {
                return Err(LmError::config(format!(
                    "snapshot in {} was built with normalize_unicode={}",
                    dir.display(),
                    store.normalize_unicode
                )));
            }
            return Ok(store);
        }
        let counts: PathBuf = [JOINED_COUNTS_GZ, JOINED_COUNTS_TXT]
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.exists())
            .ok_or_else(|| {
                LmError::config(format!("no count index found in {}", dir.display()))
            })?;
        Self::load_joined_counts(counts, Some(&dir.join(SIDECAR_FILE)), normalize_unicode)
    }

    pub fn save_snapshot<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| LmError::io(dir, e))?;

        let write_bytes = |name: &str, bytes: &[u8]| {
            let p = dir.join(name);
            std::fs::write(&p, bytes).map_err(|e| LmError::io(p, e))
        };
        write_bytes(SNAPSHOT_INDEX, self.index.as_fst().as_bytes())?;
        write_bytes(SNAPSHOT_VOCAB, self.vocab.as_fst_bytes())?;

        let p = dir.join(SNAPSHOT_RECORDS);
        write_bincode(&p, &self.records)?;

        let header = SnapshotHeader {
            version: SNAPSHOT_VERSION,
            normalize_unicode: self.normalize_unicode,
            stats: self.stats.clone(),
        };
        let p = dir.join(SNAPSHOT_HEADER);
        write_bincode(&p, &header)?;
        info!(dir = %dir.display(), records = self.records.len(), "snapshot written");
        Ok(())
    }

    pub fn load_snapshot<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let read_bytes = |name: &str| {
            let p = dir.join(name);
            std::fs::read(&p).map_err(|e| LmError::io(p, e))
        };
        let index = Map::new(read_bytes(SNAPSHOT_INDEX)?)?;
        let vocab = Vocabulary::from_fst_bytes(read_bytes(SNAPSHOT_VOCAB)?)?;

        let p = dir.join(SNAPSHOT_RECORDS);
        let f = File::open(&p).map_err(|e| LmError::io(&p, e))?;
        let records: Vec<NgramRecord> = bincode::deserialize_from(BufReader::new(f))?;

        let p = dir.join(SNAPSHOT_HEADER);
        let f = File::open(&p).map_err(|e| LmError::io(&p, e))?;
        let header: SnapshotHeader = bincode::deserialize_from(BufReader::new(f))?;
        if header.version != SNAPSHOT_VERSION {
            return Err(LmError::Snapshot(format!(
                "unsupported snapshot version {}",
                header.version
            )));
        }
        if index.len() != records.len() {
            return Err(LmError::Snapshot(format!(
                "index has {} keys but {} records",
                index.len(),
                records.len()
            )));
        }
        let max_order = records
            .iter()
            .map(NgramRecord::cardinality)
            .max()
            .unwrap_or(0)
            .max(header.stats.max_order());
        Ok(Self {
            index,
            records,
            stats: header.stats,
            vocab,
            max_order,
            normalize_unicode: header.normalize_unicode,
        })
    }

    fn key_of<S: AsRef<str>>(&self, ngram: &[S]) -> String {
        let key = join_key(ngram);
        if self.normalize_unicode {
            key.nfc().collect()
        } else {
            key
        }
    }

    /// Statistics of `ngram`, or the UNKNOWN sentinel when absent.
    pub fn lookup<S: AsRef<str>>(&self, ngram: &[S]) -> &NgramRecord {
        if ngram.is_empty() {
            return &UNKNOWN_RECORD;
        }
        self.index
            .get(self.key_of(ngram))
            .and_then(|i| self.records.get(i as usize))
            .unwrap_or(&UNKNOWN_RECORD)
    }

    /// Raw occurrence count, 0 when absent.
    pub fn quantity<S: AsRef<str>>(&self, ngram: &[S]) -> u64 {
        self.lookup(ngram).count
    }

    pub fn vocabulary_size(&self) -> u64 {
        self.vocab.len() as u64
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn global_stats(&self) -> &GlobalStatistics {
        &self.stats
    }

    /// Highest n-gram order present in the index.
    pub fn max_order(&self) -> usize {
        self.max_order
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True if the token is `<unk>` or not part of the vocabulary.
    pub fn is_oov(&self, word: &str) -> bool {
        if self.normalize_unicode {
            let w: String = word.nfc().collect();
            self.vocab.is_oov(&w)
        } else {
            self.vocab.is_oov(word)
        }
    }

    /// All records of the given order, in key order.
    pub fn ngrams(&self, order: usize) -> impl Iterator<Item = &NgramRecord> + '_ {
        self.records
            .iter()
            .filter(move |r| r.cardinality() == order)
    }

    pub fn records(&self) -> &[NgramRecord] {
        &self.records
    }
}
