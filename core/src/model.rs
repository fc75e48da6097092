//! Shared scoring surface for the smoothed models.
use crate::error::{ModelError, ModelResult};

/// A smoothed n-gram model that can score held-out text.
///
/// Implementors supply the per-window probability and the way raw text is
/// turned into tokens; the sliding-window perplexity is shared.
pub trait LanguageModel {
    /// Maximum n-gram order tracked by the model.
    fn degree(&self) -> usize;

    /// Turn raw text into the token sequence the model scores, failing if the
    /// model is not ready to score.
    fn prepare(&self, text: &str) -> ModelResult<Vec<String>>;

    /// Probability of the last token of `window` given the tokens before it.
    /// `window` is never empty nor longer than [`degree`](Self::degree).
    fn window_probability(&self, window: &[String]) -> f64;

    /// Exponential of the negative average log-probability of `text`.
    ///
    /// Every position after the start marker is scored with the longest
    /// window (at most `degree` tokens) ending there, so the first
    /// `degree - 1` positions use shorter windows anchored at the start.
    /// A window of probability 0 makes the result `+inf`.
    fn perplexity(&self, text: &str) -> ModelResult<f64> {
        let tokens = self.prepare(text)?;
        Ok(sliding_perplexity(&tokens, self.degree(), |w| {
            self.window_probability(w)
        }))
    }
}

pub(crate) fn check_degree(degree: usize) -> ModelResult<()> {
    if degree == 0 {
        return Err(ModelError::invalid("degree of model should be positive"));
    }
    Ok(())
}

pub(crate) fn check_iterations(max_iterations: usize) -> ModelResult<()> {
    if max_iterations == 0 {
        return Err(ModelError::invalid("max_iterations should be positive"));
    }
    Ok(())
}

/// Reject contexts that are empty or longer than the model degree.
pub(crate) fn check_context<S: AsRef<str>>(
    context: &[S],
    degree: usize,
) -> ModelResult<Vec<String>> {
    if context.is_empty() {
        return Err(ModelError::invalid("context should hold at least one token"));
    }
    if context.len() > degree {
        return Err(ModelError::InvalidArgument(format!(
            "context has higher order ({}) than model ({})",
            context.len(),
            degree
        )));
    }
    Ok(context.iter().map(|t| t.as_ref().to_string()).collect())
}

pub(crate) fn sliding_perplexity<F>(tokens: &[String], degree: usize, mut prob: F) -> f64
where
    F: FnMut(&[String]) -> f64,
{
    if tokens.len() < 2 {
        return f64::NAN;
    }
    let mut log_sum = 0.0f64;
    for end in 1..tokens.len() {
        let start = (end + 1).saturating_sub(degree);
        let window = &tokens[start..=end];
        let p = prob(window);
        if p <= 0.0 {
            tracing::warn!("zero probability for window {:?}; perplexity is infinite", window);
            return f64::INFINITY;
        }
        log_sum += p.ln();
    }
    (-log_sum / (tokens.len() - 1) as f64).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn windows_grow_then_slide() {
        let mut seen = Vec::new();
        sliding_perplexity(&toks("a b c d"), 3, |w| {
            seen.push(w.join(" "));
            0.5
        });
        assert_eq!(seen, vec!["a b", "a b c", "b c d"]);
    }

    #[test]
    fn unigram_windows_skip_the_start_marker() {
        let mut seen = Vec::new();
        sliding_perplexity(&toks("a b c"), 1, |w| {
            seen.push(w.join(" "));
            0.5
        });
        assert_eq!(seen, vec!["b", "c"]);
    }

    #[test]
    fn uniform_probability_gives_its_inverse() {
        let ppl = sliding_perplexity(&toks("a b c d e"), 2, |_| 0.25);
        assert!((ppl - 4.0).abs() < 1e-9);
    }

    #[test]
    fn zero_probability_is_infinite() {
        let ppl = sliding_perplexity(&toks("a b c"), 2, |w| if w[1] == "c" { 0.0 } else { 0.5 });
        assert!(ppl.is_infinite() && ppl > 0.0);
    }
}
