//! N-gram counting and maximum-likelihood estimation shared by every
//! smoothing strategy.
use ahash::{AHashMap, AHashSet};

/// An ordered tuple of 1..=degree consecutive tokens.
pub type NGramKey = Vec<String>;

/// Frequency and maximum-likelihood tables for all orders `1..=degree`.
///
/// Built once from a token sequence and read-only afterwards. Keys are owned
/// `Vec<String>` but every lookup takes a borrowed `&[String]` slice.
///
/// # Invariants
/// - every key of length `L > 1` has its length `L-1` prefix counted too, so
///   the conditional table never divides by a missing history
/// - `order_totals[i]` is the number of windows of order `i + 1`
#[derive(Debug, Clone, Default)]
pub struct NGramCounts {
    degree: usize,

    /// raw occurrence count per key
    freq: AHashMap<NGramKey, u64>,

    /// number of windows counted per order (index 0 = unigrams)
    order_totals: Vec<u64>,

    /// P(w) for unigrams, P(w_n | w_1..w_{n-1}) for longer keys
    prob: AHashMap<NGramKey, f64>,

    vocabulary: AHashSet<String>,
}

impl NGramCounts {
    /// Tables with nothing counted; every lookup misses.
    pub fn empty(degree: usize) -> Self {
        Self {
            degree,
            order_totals: vec![0; degree],
            ..Default::default()
        }
    }

    /// Slide windows of every order `1..=degree` over `tokens` and derive the
    /// maximum-likelihood tables.
    ///
    /// Windows run across the whole sequence and simply stop at its end.
    pub fn count(tokens: &[String], degree: usize) -> Self {
        let mut counts = Self::empty(degree);

        for start in 0..tokens.len() {
            for order in 1..=degree {
                let end = start + order;
                if end > tokens.len() {
                    break;
                }
                *counts.freq.entry(tokens[start..end].to_vec()).or_default() += 1;
                counts.order_totals[order - 1] += 1;
            }
        }

        let unigram_total = counts.unigram_total() as f64;
        let mut prob = AHashMap::with_capacity(counts.freq.len());
        for (key, &c) in counts.freq.iter() {
            let p = if key.len() == 1 {
                c as f64 / unigram_total
            } else {
                // prefix was counted from the same window start
                let history = counts.freq.get(&key[..key.len() - 1]).copied().unwrap_or(c);
                c as f64 / history as f64
            };
            prob.insert(key.clone(), p);
        }
        counts.prob = prob;
        counts.vocabulary = tokens.iter().cloned().collect();

        tracing::debug!(
            "counted {} distinct n-grams up to order {} over {} tokens",
            counts.freq.len(),
            degree,
            tokens.len()
        );
        counts
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Raw count of `key`, if it was ever seen.
    pub fn frequency(&self, key: &[String]) -> Option<u64> {
        self.freq.get(key).copied()
    }

    /// Maximum-likelihood probability of `key`, if it was ever seen.
    pub fn ml_probability(&self, key: &[String]) -> Option<f64> {
        self.prob.get(key).copied()
    }

    /// Number of windows counted at `order` (1-based); 0 outside `1..=degree`.
    pub fn order_total(&self, order: usize) -> u64 {
        order
            .checked_sub(1)
            .and_then(|i| self.order_totals.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// Total unigram count, i.e. the length of the counted sequence.
    pub fn unigram_total(&self) -> u64 {
        self.order_total(1)
    }

    pub fn vocabulary(&self) -> &AHashSet<String> {
        &self.vocabulary
    }

    pub fn contains_token(&self, token: &str) -> bool {
        self.vocabulary.contains(token)
    }

    /// Every counted key with its raw frequency.
    pub fn iter(&self) -> impl Iterator<Item = (&NGramKey, u64)> {
        self.freq.iter().map(|(k, &c)| (k, c))
    }

    pub fn is_empty(&self) -> bool {
        self.freq.is_empty()
    }
}
