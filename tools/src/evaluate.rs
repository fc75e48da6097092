use anyhow::Result;
use ngramlm_core::{AddKModel, Config, InterpolationModel, LanguageModel, ModelResult};
use std::io::{self, BufRead, Write};

use crate::corpus::Corpora;
use crate::ModelKind;

/// Build the requested model, fit it if needed and print perplexities.
pub fn run(kind: ModelKind, config: &Config, corpora: &Corpora, query: bool) -> Result<()> {
    match kind {
        ModelKind::Interpolation => {
            let mut model = InterpolationModel::with_config(&corpora.train, config)?;
            tracing::info!("model init done");

            let report = model.train(&corpora.dev, config.epsilon, config.verbose)?;
            for level in &report.levels {
                tracing::info!(
                    "order {}: {} groups, {} epochs, max gap {:e}{}",
                    level.order,
                    level.groups,
                    level.epochs,
                    level.max_gap,
                    if level.converged { "" } else { " (iteration cap)" }
                );
            }

            report_perplexity(&model, corpora)?;
            if query {
                query_loop(|line| model.probability_of(line))?;
            }
        }
        ModelKind::Addk => {
            let model = AddKModel::with_config(&corpora.train, config)?;
            tracing::info!("model init done (k = {})", model.k());

            report_perplexity(&model, corpora)?;
            if query {
                query_loop(|line| model.probability_of(line))?;
            }
        }
    }
    Ok(())
}

fn report_perplexity<M: LanguageModel>(model: &M, corpora: &Corpora) -> Result<()> {
    println!("dev perplexity: {}", model.perplexity(&corpora.dev)?);
    if let Some(test) = &corpora.test {
        println!("test perplexity: {}", model.perplexity(test)?);
    }
    Ok(())
}

/// Read contexts from stdin, one per line, and print their probability.
fn query_loop<F>(probability: F) -> Result<()>
where
    F: Fn(&str) -> ModelResult<f64>,
{
    let stdin = io::stdin();
    let mut out = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match probability(line) {
            Ok(p) => writeln!(out, "{}", p)?,
            Err(e) => writeln!(out, "error: {}", e)?,
        }
        out.flush()?;
    }
    Ok(())
}
