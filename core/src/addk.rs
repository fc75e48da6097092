//! Additive ("add-k") smoothing over the shared n-gram tables.
use std::str::FromStr;

use crate::error::{ModelError, ModelResult};
use crate::model::{check_context, check_degree, LanguageModel};
use crate::ngram::NGramCounts;
use crate::preprocess::Preprocessor;
use crate::Config;

/// Additive smoothing constant, always in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing(f64);

impl Smoothing {
    pub fn new(k: f64) -> ModelResult<Self> {
        if !k.is_finite() || k <= 0.0 || k > 1.0 {
            return Err(ModelError::InvalidArgument(format!(
                "value of k should fall in (0, 1], got {}",
                k
            )));
        }
        Ok(Self(k))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Smoothing {
    fn default() -> Self {
        Self(1.0)
    }
}

impl TryFrom<f64> for Smoothing {
    type Error = ModelError;

    fn try_from(k: f64) -> ModelResult<Self> {
        Self::new(k)
    }
}

impl FromStr for Smoothing {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        let k: f64 = s.trim().parse().map_err(|_| {
            ModelError::InvalidArgument(format!("k should be a number, got {:?}", s))
        })?;
        Self::new(k)
    }
}

/// N-gram model with add-k smoothing for orders above one.
///
/// Unigrams keep their raw maximum-likelihood probability. For a longer
/// context `h w`:
///
/// ```text
/// P(w | h) = (count(h w) + k) / (count(h) + k * unigram_total)
/// ```
///
/// Scoring does not map out-of-vocabulary tokens to `<UNK>`; unseen tokens
/// only get the add-k floor at orders above one.
#[derive(Debug, Clone)]
pub struct AddKModel {
    preprocessor: Preprocessor,
    counts: NGramCounts,
    k: Smoothing,
}

impl AddKModel {
    /// Build a model of order `degree` from `text` with the default rare-word
    /// threshold and `k = 1`.
    pub fn new(degree: usize, text: &str) -> ModelResult<Self> {
        Self::with_config(text, &Config { degree, ..Config::default() })
    }

    /// Build a model using degree, threshold and `k` from `config`.
    pub fn with_config(text: &str, config: &Config) -> ModelResult<Self> {
        check_degree(config.degree)?;
        let k = Smoothing::new(config.k)?;
        let preprocessor = Preprocessor::new(config.low_threshold);
        let tokens = preprocessor.process(text);
        let counts = NGramCounts::count(&tokens, config.degree);
        tracing::info!(
            "add-k model: degree {}, {} tokens, vocabulary {}",
            config.degree,
            counts.unigram_total(),
            counts.vocabulary().len()
        );
        Ok(Self { preprocessor, counts, k })
    }

    /// Change the smoothing constant; rejects anything outside `(0, 1]`.
    pub fn set_k(&mut self, k: f64) -> ModelResult<()> {
        self.k = Smoothing::new(k)?;
        Ok(())
    }

    pub fn set_smoothing(&mut self, k: Smoothing) {
        self.k = k;
    }

    pub fn k(&self) -> f64 {
        self.k.value()
    }

    pub fn counts(&self) -> &NGramCounts {
        &self.counts
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Smoothed probability of the last token of `context` given the rest.
    ///
    /// # Errors
    /// `InvalidArgument` if `context` is empty or longer than the degree.
    pub fn probability<S: AsRef<str>>(&self, context: &[S]) -> ModelResult<f64> {
        let context = check_context(context, self.counts.degree())?;
        Ok(self.smoothed(&context))
    }

    /// [`probability`](Self::probability) of a space-separated context.
    pub fn probability_of(&self, context: &str) -> ModelResult<f64> {
        let tokens: Vec<&str> = context.split_whitespace().collect();
        self.probability(tokens.as_slice())
    }

    fn smoothed(&self, context: &[String]) -> f64 {
        if context.len() == 1 {
            return self.counts.ml_probability(context).unwrap_or(0.0);
        }
        let k = self.k.value();
        let count = self.counts.frequency(context).unwrap_or(0) as f64;
        let history = self
            .counts
            .frequency(&context[..context.len() - 1])
            .unwrap_or(0) as f64;
        (count + k) / (history + k * self.counts.unigram_total() as f64)
    }
}

impl LanguageModel for AddKModel {
    fn degree(&self) -> usize {
        self.counts.degree()
    }

    fn prepare(&self, text: &str) -> ModelResult<Vec<String>> {
        Ok(self.preprocessor.process(text))
    }

    fn window_probability(&self, window: &[String]) -> f64 {
        self.smoothed(window)
    }
}
