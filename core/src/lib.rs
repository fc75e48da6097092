//! ngramlm-core
//!
//! Smoothed n-gram language models estimated from raw text and scored by
//! perplexity on held-out text.
//!
//! Public API:
//! - `Preprocessor` - Whitespace tokenization, boundary markers, rare-word folding
//! - `NGramCounts` - Frequency and maximum-likelihood tables for orders 1..=degree
//! - `AddKModel` - Additive smoothing
//! - `InterpolationModel` - Recursive interpolation with per-group trained weights
//! - `LanguageModel` - Shared perplexity scoring
//! - `Config` - Model options, loadable from TOML
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{ModelError, ModelResult};

pub mod preprocess;
pub use preprocess::{Preprocessor, END, START, UNKNOWN};

pub mod ngram;
pub use ngram::{NGramCounts, NGramKey};

pub mod model;
pub use model::LanguageModel;

pub mod addk;
pub use addk::{AddKModel, Smoothing};

pub mod interpolation;
pub use interpolation::{InterpolationModel, Lambdas, LevelReport, TrainingReport};

/// Options shared by both model kinds.
///
/// Missing fields take their defaults when deserialized, so a TOML file only
/// needs the values it changes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Maximum n-gram order (must be positive)
    pub degree: usize,

    /// Tokens seen at most this many times in a text become `<UNK>`
    pub low_threshold: u64,

    /// Add-k smoothing constant, in (0, 1]
    pub k: f64,

    /// Bracket width at which weight search stops
    pub epsilon: f64,
    /// Epoch cap per order for the weight search
    pub max_iterations: usize,
    /// Log training progress at info level
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            degree: 2,
            low_threshold: preprocess::DEFAULT_LOW_THRESHOLD,
            k: 1.0,
            epsilon: 1e-5,
            max_iterations: 1000,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check every field against the range the models accept.
    pub fn validate(&self) -> ModelResult<()> {
        model::check_degree(self.degree)?;
        Smoothing::new(self.k)?;
        model::check_iterations(self.max_iterations)?;
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ModelError::InvalidArgument(format!(
                "epsilon should be positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}
