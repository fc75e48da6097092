//! Recursive linear interpolation with per-group mixing weights.
//!
//! An n-gram's *group* is the raw training frequency of its history, so
//! histories with equal evidence share one mixing weight. Weights are fitted
//! per order on held-out text by ternary search, independently per group,
//! assuming the held-out log-likelihood is unimodal in each weight.
use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;

use crate::error::{ModelError, ModelResult};
use crate::model::{check_context, check_degree, check_iterations, LanguageModel};
use crate::ngram::NGramCounts;
use crate::preprocess::{mask_unknown, Preprocessor};
use crate::Config;

/// Group used while training for histories never seen in the training text.
pub const UNSEEN_GROUP: u64 = 0;

/// Weight used at query time when a history or its group has no trained
/// weight: all mass goes to the lower-order estimate.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Trained mixing weights, one table per interpolated order `2..=degree`.
///
/// A weight `w` for group `g` at order `n` mixes
/// `w * P_{n-1}(suffix) + (1 - w) * P_ml(n-gram)`.
#[derive(Debug, Clone, Default)]
pub struct Lambdas {
    levels: Vec<AHashMap<u64, f64>>,
}

impl Lambdas {
    fn untrained(degree: usize) -> Self {
        Self {
            levels: vec![AHashMap::new(); degree.saturating_sub(1)],
        }
    }

    /// Weight for `group` at `order`, if one was trained.
    pub fn get(&self, order: usize, group: u64) -> Option<f64> {
        self.level(order)?.get(&group).copied()
    }

    /// Every trained weight at `order`, keyed by group.
    pub fn level(&self, order: usize) -> Option<&AHashMap<u64, f64>> {
        order.checked_sub(2).and_then(|i| self.levels.get(i))
    }

    /// `(order, group, weight)` for every trained weight.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u64, f64)> + '_ {
        self.levels
            .iter()
            .enumerate()
            .flat_map(|(i, level)| level.iter().map(move |(&g, &w)| (i + 2, g, w)))
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(|l| l.is_empty())
    }

    fn set_level(&mut self, order: usize, weights: AHashMap<u64, f64>) {
        if let Some(slot) = order.checked_sub(2).and_then(|i| self.levels.get_mut(i)) {
            *slot = weights;
        }
    }
}

/// Outcome of fitting the weights of one order.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelReport {
    pub order: usize,
    pub groups: usize,
    pub epochs: usize,
    /// Widest remaining bracket when the search stopped.
    pub max_gap: f64,
    /// `false` when the iteration cap stopped the search first.
    pub converged: bool,
}

/// Per-order summary returned by [`InterpolationModel::train`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub levels: Vec<LevelReport>,
}

impl TrainingReport {
    pub fn converged(&self) -> bool {
        self.levels.iter().all(|l| l.converged)
    }
}

/// One held-out window, reduced to what the weight search needs.
#[derive(Debug, Clone, Copy)]
struct Sample {
    group: u64,
    /// fully interpolated probability of the window suffix
    lower: f64,
    /// maximum-likelihood probability of the whole window
    direct: f64,
}

impl Sample {
    fn log_likelihood(&self, weight: f64) -> f64 {
        (weight * self.lower + (1.0 - weight) * self.direct).ln()
    }
}

#[derive(Debug, Clone, Copy)]
struct Bracket {
    lo: f64,
    hi: f64,
}

impl Bracket {
    fn thirds(&self) -> (f64, f64) {
        let third = (self.hi - self.lo) / 3.0;
        (self.lo + third, self.hi - third)
    }

    fn width(&self) -> f64 {
        self.hi - self.lo
    }

    fn midpoint(&self) -> f64 {
        (self.lo + self.hi) / 2.0
    }
}

/// N-gram model mixing every order with the one below it.
///
/// ```text
/// P_1(w)       = P_ml(w)
/// P_n(h w)     = l * P_{n-1}(h[1..] w) + (1 - l) * P_ml(h w)
/// l            = lambdas[n][count(h)]
/// ```
///
/// Lifecycle: built untrained from training text; [`train`](Self::train)
/// fits the weights on held-out text; [`clear`](Self::clear) wipes every
/// table. Perplexity is only available once trained.
#[derive(Debug, Clone)]
pub struct InterpolationModel {
    preprocessor: Preprocessor,
    counts: NGramCounts,
    degree: usize,
    /// distinct history frequencies per history length (index 0 = unigram
    /// histories, i.e. order 2)
    group_sets: Vec<BTreeSet<u64>>,
    lambdas: Lambdas,
    trained: bool,
    max_iterations: usize,
}

impl InterpolationModel {
    /// Build an untrained model of order `degree` from `text` with the
    /// default rare-word threshold.
    pub fn new(degree: usize, text: &str) -> ModelResult<Self> {
        Self::with_config(text, &Config { degree, ..Config::default() })
    }

    /// Build an untrained model using degree, threshold and iteration cap
    /// from `config`.
    pub fn with_config(text: &str, config: &Config) -> ModelResult<Self> {
        check_degree(config.degree)?;
        check_iterations(config.max_iterations)?;
        let mut model = Self {
            preprocessor: Preprocessor::new(config.low_threshold),
            counts: NGramCounts::empty(config.degree),
            degree: config.degree,
            group_sets: Vec::new(),
            lambdas: Lambdas::untrained(config.degree),
            trained: false,
            max_iterations: config.max_iterations,
        };
        model.rebuild(text);
        tracing::info!(
            "interpolation model: degree {}, {} tokens, vocabulary {}",
            model.degree,
            model.counts.unigram_total(),
            model.counts.vocabulary().len()
        );
        Ok(model)
    }

    /// Recount the tables from `text`, dropping any trained weights.
    pub fn rebuild(&mut self, text: &str) {
        let tokens = self.preprocessor.process(text);
        self.counts = NGramCounts::count(&tokens, self.degree);
        self.group_sets = Self::collect_groups(&self.counts, self.degree);
        self.reset_weights();
    }

    /// Wipe counts, groups and weights. The model scores nothing useful
    /// until [`rebuild`](Self::rebuild) is called.
    pub fn clear(&mut self) {
        self.counts = NGramCounts::empty(self.degree);
        self.group_sets = Self::collect_groups(&self.counts, self.degree);
        self.reset_weights();
    }

    /// Drop trained weights only; counts stay.
    pub fn reset_weights(&mut self) {
        self.lambdas = Lambdas::untrained(self.degree);
        self.trained = false;
    }

    fn collect_groups(counts: &NGramCounts, degree: usize) -> Vec<BTreeSet<u64>> {
        // only keys shorter than `degree` can be histories
        let mut sets: Vec<BTreeSet<u64>> = (0..degree.saturating_sub(1))
            .map(|i| {
                let mut s = BTreeSet::new();
                if i > 0 {
                    s.insert(UNSEEN_GROUP);
                }
                s
            })
            .collect();
        for (key, c) in counts.iter() {
            if let Some(set) = sets.get_mut(key.len() - 1) {
                set.insert(c);
            }
        }
        sets
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn counts(&self) -> &NGramCounts {
        &self.counts
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Group ids whose weights are fitted for `order` (2..=degree).
    pub fn group_ids(&self, order: usize) -> Option<&BTreeSet<u64>> {
        order.checked_sub(2).and_then(|i| self.group_sets.get(i))
    }

    /// Group of `history`: its raw training frequency.
    pub fn group_of(&self, history: &[String]) -> Option<u64> {
        self.counts.frequency(history)
    }

    /// Trained weights.
    ///
    /// # Errors
    /// `PreconditionViolation` before [`train`](Self::train).
    pub fn lambdas(&self) -> ModelResult<&Lambdas> {
        self.ensure_trained()?;
        Ok(&self.lambdas)
    }

    /// Trained weight for `group` at `order`, `None` if that group has none.
    pub fn lambda(&self, order: usize, group: u64) -> ModelResult<Option<f64>> {
        Ok(self.lambdas()?.get(order, group))
    }

    fn ensure_trained(&self) -> ModelResult<()> {
        if !self.trained {
            return Err(ModelError::PreconditionViolation(
                "model should be trained before prediction".into(),
            ));
        }
        Ok(())
    }

    /// Replace tokens missing from the training vocabulary by `<UNK>`.
    pub fn mask_unknown(&self, tokens: &mut [String]) {
        mask_unknown(tokens, self.counts.vocabulary());
    }

    /// Interpolated probability of the last token of `context` given the
    /// rest. Out-of-vocabulary tokens count as `<UNK>`.
    ///
    /// Works before training too, with every weight at its default of 1.
    ///
    /// # Errors
    /// `InvalidArgument` if `context` is empty or longer than the degree.
    pub fn probability<S: AsRef<str>>(&self, context: &[S]) -> ModelResult<f64> {
        let mut context = check_context(context, self.degree)?;
        self.mask_unknown(&mut context);
        Ok(self.interpolated(&context))
    }

    /// [`probability`](Self::probability) of a space-separated context.
    pub fn probability_of(&self, context: &str) -> ModelResult<f64> {
        let tokens: Vec<&str> = context.split_whitespace().collect();
        self.probability(tokens.as_slice())
    }

    fn interpolated(&self, context: &[String]) -> f64 {
        let direct = self.counts.ml_probability(context).unwrap_or(0.0);
        if context.len() == 1 {
            return direct;
        }
        let lower = self.interpolated(&context[1..]);
        let weight = self.weight_for(context);
        weight * lower + (1.0 - weight) * direct
    }

    fn weight_for(&self, context: &[String]) -> f64 {
        let history = &context[..context.len() - 1];
        self.group_of(history)
            .and_then(|g| self.lambdas.get(context.len(), g))
            .unwrap_or(DEFAULT_WEIGHT)
    }

    /// Fit the mixing weights of every order `2..=degree` on `text`.
    ///
    /// Each group's weight is searched in `[0, 1]` until the widest bracket of
    /// the order is at most `epsilon`, or `max_iterations` epochs have run.
    /// `verbose` logs per-epoch progress at `info` instead of `debug`.
    ///
    /// # Errors
    /// `InvalidArgument` for a non-positive `epsilon`; `InconsistentState` if a
    /// masked token is still outside the vocabulary, e.g. after [`clear`](Self::clear).
    pub fn train(
        &mut self,
        text: &str,
        epsilon: f64,
        verbose: bool,
    ) -> ModelResult<TrainingReport> {
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(ModelError::InvalidArgument(format!(
                "epsilon should be positive, got {}",
                epsilon
            )));
        }
        let mut tokens = self.preprocessor.process(text);
        self.mask_unknown(&mut tokens);
        if let Some(t) = tokens.iter().find(|t| !self.counts.contains_token(t)) {
            return Err(ModelError::InconsistentState(format!(
                "unknown word {:?} shown in context",
                t
            )));
        }

        self.reset_weights();
        let mut report = TrainingReport::default();
        for order in 2..=self.degree {
            if verbose {
                tracing::info!("training for degree {}", order);
            }
            let level = self.train_order(order, &tokens, epsilon, verbose)?;
            if verbose {
                tracing::info!("training for degree {} ends", order);
            }
            report.levels.push(level);
        }
        self.trained = true;
        Ok(report)
    }

    fn train_order(
        &mut self,
        order: usize,
        tokens: &[String],
        epsilon: f64,
        verbose: bool,
    ) -> ModelResult<LevelReport> {
        // lower orders are already fitted, so both estimates stay fixed
        let samples: Vec<Sample> = tokens
            .windows(order)
            .map(|window| Sample {
                group: self
                    .group_of(&window[..order - 1])
                    .unwrap_or(UNSEEN_GROUP),
                lower: self.interpolated(&window[1..]),
                direct: self.counts.ml_probability(window).unwrap_or(0.0),
            })
            .collect();

        let mut brackets: BTreeMap<u64, Bracket> = self
            .group_ids(order)
            .map(|ids| ids.iter().map(|&g| (g, Bracket { lo: 0.0, hi: 1.0 })).collect())
            .unwrap_or_default();

        // every bracket narrows at least once, then the gap is checked
        let mut epochs = 0;
        let mut max_gap: f64;
        loop {
            let mut scores: AHashMap<u64, (f64, f64)> = AHashMap::new();
            for s in &samples {
                let bracket = brackets.get(&s.group).ok_or_else(|| {
                    ModelError::InconsistentState(format!(
                        "group {} has no weight at order {}",
                        s.group, order
                    ))
                })?;
                let (lmid, rmid) = bracket.thirds();
                let entry = scores.entry(s.group).or_insert((0.0, 0.0));
                entry.0 += s.log_likelihood(lmid);
                entry.1 += s.log_likelihood(rmid);
            }

            max_gap = 0.0;
            for (group, bracket) in brackets.iter_mut() {
                let (lmid, rmid) = bracket.thirds();
                let (left, right) = scores.get(group).copied().unwrap_or((0.0, 0.0));
                if left > right {
                    bracket.hi = rmid;
                } else {
                    bracket.lo = lmid;
                }
                max_gap = f64::max(max_gap, bracket.width());
            }

            if verbose {
                tracing::info!("order {} epoch {} ends with max gap {}", order, epochs, max_gap);
            } else {
                tracing::debug!("order {} epoch {} ends with max gap {}", order, epochs, max_gap);
            }
            epochs += 1;

            if max_gap <= epsilon {
                break;
            }
            if epochs >= self.max_iterations {
                tracing::warn!(
                    "order {}: stopped after {} epochs with max gap {}",
                    order,
                    epochs,
                    max_gap
                );
                break;
            }
        }

        let weights: AHashMap<u64, f64> =
            brackets.iter().map(|(&g, b)| (g, b.midpoint())).collect();
        let groups = weights.len();
        self.lambdas.set_level(order, weights);

        Ok(LevelReport {
            order,
            groups,
            epochs,
            max_gap,
            converged: max_gap <= epsilon,
        })
    }
}

impl LanguageModel for InterpolationModel {
    fn degree(&self) -> usize {
        self.degree
    }

    fn prepare(&self, text: &str) -> ModelResult<Vec<String>> {
        self.ensure_trained()?;
        let mut tokens = self.preprocessor.process(text);
        self.mask_unknown(&mut tokens);
        Ok(tokens)
    }

    fn window_probability(&self, window: &[String]) -> f64 {
        self.interpolated(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRAIN: &str = "the cat sat on the mat . the dog sat on the rug . \
                         the cat ate the rat . the dog ate the cat .";
    const DEV: &str = "the cat sat on the rug . the dog ate the mat .";

    fn small_config(degree: usize) -> Config {
        Config { degree, low_threshold: 1, ..Config::default() }
    }

    #[test]
    fn groups_are_history_frequencies() {
        let m = InterpolationModel::with_config(TRAIN, &small_config(3)).unwrap();
        let the = vec!["the".to_string()];
        let f = m.counts().frequency(&the).unwrap();
        assert_eq!(m.group_of(&the), Some(f));
        assert!(m.group_ids(2).unwrap().contains(&f));
        // unseen-history bucket only from bigram histories upward
        assert!(!m.group_ids(2).unwrap().contains(&UNSEEN_GROUP));
        assert!(m.group_ids(3).unwrap().contains(&UNSEEN_GROUP));
        assert!(m.group_ids(4).is_none());
    }

    #[test]
    fn untrained_model_falls_back_to_unigrams() {
        let m = InterpolationModel::with_config(TRAIN, &small_config(2)).unwrap();
        let bigram = m.probability(&["the", "cat"]).unwrap();
        let unigram = m.probability(&["cat"]).unwrap();
        assert_eq!(bigram, unigram);
        assert!(matches!(m.lambdas(), Err(ModelError::PreconditionViolation(_))));
    }

    #[test]
    fn training_fits_every_group() {
        let mut m = InterpolationModel::with_config(TRAIN, &small_config(3)).unwrap();
        let report = m.train(DEV, 1e-4, false).unwrap();
        assert!(report.converged());
        assert_eq!(report.levels.len(), 2);
        for level in &report.levels {
            assert!(level.max_gap <= 1e-4);
            assert_eq!(level.groups, m.group_ids(level.order).unwrap().len());
        }
        for (_, _, w) in m.lambdas().unwrap().iter() {
            assert!((0.0..=1.0).contains(&w));
        }
    }

    #[test]
    fn trained_probability_mixes_orders() {
        let mut m = InterpolationModel::with_config(TRAIN, &small_config(2)).unwrap();
        m.train(DEV, 1e-5, false).unwrap();
        let ctx = ["the", "cat"];
        let history = vec!["the".to_string()];
        let g = m.group_of(&history).unwrap();
        let w = m.lambda(2, g).unwrap().unwrap();
        let key: Vec<String> = ctx.iter().map(|s| s.to_string()).collect();
        let expected = w * m.counts().ml_probability(&key[1..]).unwrap()
            + (1.0 - w) * m.counts().ml_probability(&key).unwrap();
        assert!((m.probability(&ctx).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn unseen_history_uses_default_weight() {
        let mut m = InterpolationModel::with_config(TRAIN, &small_config(3)).unwrap();
        m.train(DEV, 1e-3, false).unwrap();
        // "rat the" never occurs in training, so the trigram falls back fully
        let tri = m.probability(&["rat", "the", "dog"]).unwrap();
        let bi = m.probability(&["the", "dog"]).unwrap();
        assert_eq!(tri, bi);
    }

    #[test]
    fn unknown_words_are_masked() {
        let m = InterpolationModel::with_config(TRAIN, &small_config(2)).unwrap();
        let a = m.probability(&["zebra"]).unwrap();
        let b = m.probability(&["<UNK>"]).unwrap();
        assert_eq!(a, b);
        assert!(a > 0.0);
    }

    #[test]
    fn non_positive_epsilon_is_rejected() {
        let mut m = InterpolationModel::with_config(TRAIN, &small_config(2)).unwrap();
        assert!(matches!(m.train(DEV, 0.0, false), Err(ModelError::InvalidArgument(_))));
        assert!(!m.is_trained());
    }

    #[test]
    fn iteration_cap_stops_the_search() {
        let cfg = Config { max_iterations: 2, ..small_config(2) };
        let mut m = InterpolationModel::with_config(TRAIN, &cfg).unwrap();
        let report = m.train(DEV, 1e-9, false).unwrap();
        assert!(!report.converged());
        assert_eq!(report.levels[0].epochs, 2);
        assert!(m.is_trained());
    }

    #[test]
    fn coarse_epsilon_still_runs_one_epoch() {
        let mut m = InterpolationModel::with_config(TRAIN, &small_config(2)).unwrap();
        let report = m.train(DEV, 1.0, false).unwrap();
        assert_eq!(report.levels[0].epochs, 1);
        assert!(report.converged());
        for (_, _, w) in m.lambdas().unwrap().iter() {
            assert_ne!(w, 0.5);
            assert!((w - 1.0 / 3.0).abs() < 1e-12 || (w - 2.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn training_after_clear_is_inconsistent() {
        let mut m = InterpolationModel::with_config(TRAIN, &small_config(2)).unwrap();
        m.clear();
        assert!(matches!(
            m.train(DEV, 1e-3, false),
            Err(ModelError::InconsistentState(_))
        ));
        assert!(!m.is_trained());
    }

    #[test]
    fn zero_iteration_cap_is_rejected() {
        let cfg = Config { max_iterations: 0, ..small_config(2) };
        assert!(matches!(
            InterpolationModel::with_config(TRAIN, &cfg),
            Err(ModelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn degree_one_trains_nothing() {
        let mut m = InterpolationModel::with_config(TRAIN, &small_config(1)).unwrap();
        let report = m.train(DEV, 1e-3, false).unwrap();
        assert!(report.levels.is_empty());
        assert!(m.lambdas().unwrap().is_empty());
    }
}
