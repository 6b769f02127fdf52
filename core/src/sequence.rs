//! Turning a token sequence into the n-grams that get scored.
use crate::vocab::{SENTENCE_END, SENTENCE_START};
use serde::{Deserialize, Serialize};

/// How sequences shorter than the model order, and the first tokens of
/// longer ones, are turned into n-grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryHandling {
    /// Sequences shorter than the order produce nothing.
    Omit,
    /// A sequence no longer than the order is a single n-gram.
    #[default]
    Keep,
    /// The first token is repeated `order - 2` times at the front.
    Pad,
    /// Leading n-grams grow from two tokens up to the order.
    Grow,
}

/// Which sentence markers to wrap around the tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SentenceTags {
    #[default]
    None,
    Start,
    End,
    Both,
}

impl SentenceTags {
    /// Wrap `tokens` with `<s>` / `</s>`. Empty input stays empty.
    pub fn apply<S: AsRef<str>>(self, tokens: &[S]) -> Vec<String> {
        let mut out = Vec::with_capacity(tokens.len() + 2);
        if tokens.is_empty() {
            return out;
        }
        if matches!(self, SentenceTags::Start | SentenceTags::Both) {
            out.push(SENTENCE_START.to_string());
        }
        out.extend(tokens.iter().map(|t| t.as_ref().to_string()));
        if matches!(self, SentenceTags::End | SentenceTags::Both) {
            out.push(SENTENCE_END.to_string());
        }
        out
    }
}

/// Split `tokens` into the n-grams of length `order` to score.
pub fn ngram_sequence<T: Clone>(
    tokens: &[T],
    order: usize,
    boundary: BoundaryHandling,
) -> Vec<Vec<T>> {
    if tokens.is_empty() || order == 0 {
        return Vec::new();
    }
    let padded: Vec<T>;
    let tokens = if boundary == BoundaryHandling::Pad && order > 2 {
        padded = std::iter::repeat(tokens[0].clone())
            .take(order - 2)
            .chain(tokens.iter().cloned())
            .collect();
        &padded[..]
    } else {
        tokens
    };

    if boundary == BoundaryHandling::Omit && tokens.len() < order {
        return Vec::new();
    }
    if tokens.len() == 1 || (tokens.len() <= order && boundary != BoundaryHandling::Grow) {
        return vec![tokens.to_vec()];
    }

    let o = order.min(tokens.len());
    let mut out = Vec::with_capacity(tokens.len());
    if boundary == BoundaryHandling::Grow {
        for len in 2..o {
            out.push(tokens[..len].to_vec());
        }
    }
    out.extend(tokens.windows(o).map(<[T]>::to_vec));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<&str> {
        s.split_whitespace().collect()
    }

    #[test]
    fn windows_for_long_sequences() {
        let seq = ngram_sequence(&toks("a b c d"), 3, BoundaryHandling::Keep);
        assert_eq!(seq, vec![toks("a b c"), toks("b c d")]);
    }

    #[test]
    fn short_sequences_by_mode() {
        let t = toks("a b");
        assert!(ngram_sequence(&t, 3, BoundaryHandling::Omit).is_empty());
        assert_eq!(ngram_sequence(&t, 3, BoundaryHandling::Keep), vec![t.clone()]);
        assert_eq!(ngram_sequence(&t, 2, BoundaryHandling::Omit), vec![t.clone()]);
        assert_eq!(
            ngram_sequence(&t, 3, BoundaryHandling::Grow),
            vec![toks("a b")]
        );
    }

    #[test]
    fn pad_repeats_first_token() {
        let seq = ngram_sequence(&toks("a b c"), 4, BoundaryHandling::Pad);
        assert_eq!(seq, vec![toks("a a a b"), toks("a a b c")]);
    }

    #[test]
    fn grow_adds_leading_prefixes() {
        let seq = ngram_sequence(&toks("a b c d e"), 4, BoundaryHandling::Grow);
        assert_eq!(
            seq,
            vec![toks("a b"), toks("a b c"), toks("a b c d"), toks("b c d e")]
        );
    }

    #[test]
    fn single_token_and_empty() {
        assert_eq!(
            ngram_sequence(&toks("a"), 3, BoundaryHandling::Omit),
            Vec::<Vec<&str>>::new()
        );
        assert_eq!(
            ngram_sequence(&toks("a"), 3, BoundaryHandling::Grow),
            vec![toks("a")]
        );
        assert!(ngram_sequence::<&str>(&[], 3, BoundaryHandling::Keep).is_empty());
    }

    #[test]
    fn sentence_tags() {
        assert_eq!(SentenceTags::Both.apply(&["x"]), vec!["<s>", "x", "</s>"]);
        assert_eq!(SentenceTags::Start.apply(&["x"]), vec!["<s>", "x"]);
        assert_eq!(SentenceTags::End.apply(&["x"]), vec!["x", "</s>"]);
        assert!(SentenceTags::Both.apply::<&str>(&[]).is_empty());
    }
}
