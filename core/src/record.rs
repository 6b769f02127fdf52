// core/src/record.rs
//
// Immutable per-n-gram statistics and the joined-counts line format.
//
// A joined-counts line looks like
//
//   the quick brown<TAB>2<TAB>n_f:2,2,0,0<TAB>n_p:...<TAB>n_fp:...
//
// where column 1 is the space-joined n-gram, column 2 the raw count and the
// remaining columns optional extension annotations. Annotation values are
// either `N1,N2,N3+` or `sum,N1,N2,N3+`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of distinct extensions of an n-gram, bucketed by the count of the
/// extended n-gram (exactly 1, exactly 2, 3 or more), plus the summed count
/// of all extensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionStats {
    pub sum: u64,
    pub n1: u64,
    pub n2: u64,
    pub n3p: u64,
}

impl ExtensionStats {
    pub const EMPTY: ExtensionStats = ExtensionStats {
        sum: 0,
        n1: 0,
        n2: 0,
        n3p: 0,
    };

    /// Total number of distinct extensions.
    pub fn total(&self) -> u64 {
        self.n1 + self.n2 + self.n3p
    }

    /// Record one distinct extension that occurred `count` times.
    pub fn add(&mut self, count: u64) {
        match count {
            0 => return,
            1 => self.n1 += 1,
            2 => self.n2 += 1,
            _ => self.n3p += 1,
        }
        self.sum += count;
    }

    fn parse(values: &str) -> Result<Self, ParseError> {
        let nums = values
            .split(',')
            .map(|v| v.trim().parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ParseError::BadAnnotation(values.to_string()))?;
        match nums.as_slice() {
            [n1, n2, n3p] => Ok(Self {
                sum: 0,
                n1: *n1,
                n2: *n2,
                n3p: *n3p,
            }),
            [sum, n1, n2, n3p] => Ok(Self {
                sum: *sum,
                n1: *n1,
                n2: *n2,
                n3p: *n3p,
            }),
            _ => Err(ParseError::BadAnnotation(values.to_string())),
        }
    }

    fn format(&self) -> String {
        format!("{},{},{},{}", self.sum, self.n1, self.n2, self.n3p)
    }
}

/// Statistics of one distinct n-gram.
///
/// Records are created once while loading or building an index and never
/// mutated afterwards. Absent n-grams resolve to [`NgramRecord::UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NgramRecord {
    /// Space-joined token sequence.
    pub key: String,
    pub count: u64,
    /// Right extensions (this n-gram used as a history).
    pub follow: ExtensionStats,
    /// Left extensions.
    pub precede: ExtensionStats,
    /// Pairs of tokens flanking this n-gram on both sides.
    pub follow_precede: ExtensionStats,
}

impl NgramRecord {
    /// Sentinel for absent n-grams: empty key, all counts zero.
    pub const UNKNOWN: NgramRecord = NgramRecord {
        key: String::new(),
        count: 0,
        follow: ExtensionStats::EMPTY,
        precede: ExtensionStats::EMPTY,
        follow_precede: ExtensionStats::EMPTY,
    };

    pub fn new(key: impl Into<String>, count: u64) -> Self {
        Self {
            key: key.into(),
            count,
            ..Self::UNKNOWN
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.key.is_empty()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.key.split(' ').filter(|t| !t.is_empty())
    }

    pub fn cardinality(&self) -> usize {
        self.tokens().count()
    }

    /// Render the record back into the joined-counts line format.
    pub fn to_joined_line(&self) -> String {
        let mut line = format!("{}\t{}", self.key, self.count);
        for (tag, stats) in [
            ("n_f", &self.follow),
            ("n_p", &self.precede),
            ("n_fp", &self.follow_precede),
        ] {
            if *stats != ExtensionStats::EMPTY {
                line.push('\t');
                line.push_str(tag);
                line.push(':');
                line.push_str(&stats.format());
            }
        }
        line
    }
}

/// Reasons a joined-counts line is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty n-gram column")]
    EmptyNgram,
    #[error("missing count column")]
    MissingCount,
    #[error("invalid count {0:?}")]
    BadCount(String),
    #[error("invalid annotation {0:?}")]
    BadAnnotation(String),
}

/// Join tokens the way index keys are stored.
pub fn join_key<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut key = String::new();
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 {
            key.push(' ');
        }
        key.push_str(t.as_ref());
    }
    key
}

/// Parse one joined-counts line into a record.
pub fn parse_joined_line(line: &str) -> Result<NgramRecord, ParseError> {
    let mut cols = line.trim_end_matches(['\r', '\n']).split('\t');

    let ngram = cols.next().unwrap_or_default();
    let tokens: Vec<&str> = ngram.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(ParseError::EmptyNgram);
    }

    let count_col = cols.next().ok_or(ParseError::MissingCount)?.trim();
    let count = count_col
        .parse::<u64>()
        .map_err(|_| ParseError::BadCount(count_col.to_string()))?;

    let mut record = NgramRecord::new(join_key(&tokens), count);
    for col in cols {
        let col = col.trim();
        if col.is_empty() {
            continue;
        }
        let (tag, values) = col
            .split_once(':')
            .ok_or_else(|| ParseError::BadAnnotation(col.to_string()))?;
        let stats = ExtensionStats::parse(values)?;
        match tag {
            "n_f" => record.follow = stats,
            "n_p" => record.precede = stats,
            "n_fp" => record.follow_precede = stats,
            _ => return Err(ParseError::BadAnnotation(col.to_string())),
        }
    }
    Ok(record)
}
