//! Corpus preprocessing: whitespace tokenization, sentence boundary markers
//! and folding of rare tokens into the unknown-word class.
use ahash::{AHashMap, AHashSet};

/// Start-of-sequence marker.
pub const START: &str = "<s>";
/// End-of-sequence marker.
pub const END: &str = "</s>";
/// Unknown-word marker.
pub const UNKNOWN: &str = "<UNK>";

/// Default frequency at or below which a token is folded into `<UNK>`.
pub const DEFAULT_LOW_THRESHOLD: u64 = 3;

/// Turns raw text into a bounded-vocabulary token sequence.
///
/// The output always starts with [`START`], ends with [`END`] and contains at
/// least one [`UNKNOWN`], so every model built on it has probability mass for
/// unseen words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
    low_threshold: u64,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_LOW_THRESHOLD)
    }
}

impl Preprocessor {
    pub fn new(low_threshold: u64) -> Self {
        Self { low_threshold }
    }

    pub fn low_threshold(&self) -> u64 {
        self.low_threshold
    }

    /// Tokenize `raw` and normalize it into a model-ready sequence.
    ///
    /// Frequencies are computed over the sequence itself (boundary markers
    /// included), never against a trained vocabulary. A token seen exactly
    /// `low_threshold` times is folded too.
    pub fn process(&self, raw: &str) -> Vec<String> {
        let mut tokens: Vec<String> = raw.split_whitespace().map(str::to_string).collect();

        if tokens.is_empty() {
            tokens = vec![START.to_string(), END.to_string()];
        } else {
            if tokens[0] != START {
                tokens.insert(0, START.to_string());
            }
            if tokens[tokens.len() - 1] != END {
                tokens.push(END.to_string());
            }
        }

        self.replace_low_frequency(&mut tokens);

        if !tokens.iter().any(|t| t == UNKNOWN) {
            // two positions before the end, but never ahead of the start marker
            let at = tokens.len().saturating_sub(2).max(1);
            tokens.insert(at, UNKNOWN.to_string());
        }
        tokens
    }

    fn replace_low_frequency(&self, tokens: &mut [String]) {
        let mut freq: AHashMap<&str, u64> = AHashMap::new();
        for t in tokens.iter() {
            *freq.entry(t.as_str()).or_default() += 1;
        }
        let rare: AHashSet<String> = freq
            .into_iter()
            .filter(|(t, c)| *t != START && *t != END && *c <= self.low_threshold)
            .map(|(t, _)| t.to_string())
            .collect();

        for t in tokens.iter_mut() {
            if rare.contains(t.as_str()) {
                *t = UNKNOWN.to_string();
            }
        }
    }
}

/// Replace every token missing from `vocabulary` by [`UNKNOWN`].
pub fn mask_unknown(tokens: &mut [String], vocabulary: &AHashSet<String>) {
    for t in tokens.iter_mut() {
        if !vocabulary.contains(t.as_str()) {
            *t = UNKNOWN.to_string();
        }
    }
}
