mod corpus;
mod evaluate;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ngramlm_core::{Config, Smoothing};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    Interpolation,
    Addk,
}

/// Train a smoothed n-gram model and report perplexity on held-out text.
#[derive(Parser)]
struct Args {
    /// training corpus
    #[arg(long)]
    train: PathBuf,
    /// held-out corpus (fits interpolation weights, always scored)
    #[arg(long)]
    dev: PathBuf,
    /// optional test corpus to score
    #[arg(long)]
    test: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ModelKind::Interpolation)]
    model: ModelKind,

    /// TOML file with model options; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    degree: Option<usize>,
    /// rare-word threshold
    #[arg(long)]
    threshold: Option<u64>,
    /// add-k smoothing constant in (0, 1]
    #[arg(long)]
    k: Option<Smoothing>,
    /// bracket width at which weight search stops
    #[arg(long)]
    eps: Option<f64>,

    #[arg(long)]
    verbose: bool,
    /// after scoring, read contexts from stdin and print their probability
    #[arg(long)]
    query: bool,
}

impl Args {
    fn config(&self) -> Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => Config::load_toml(path)
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("load config {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(d) = self.degree {
            cfg.degree = d;
        }
        if let Some(t) = self.threshold {
            cfg.low_threshold = t;
        }
        if let Some(k) = self.k {
            cfg.k = k.value();
        }
        if let Some(eps) = self.eps {
            cfg.epsilon = eps;
        }
        cfg.verbose |= self.verbose;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config()?;

    let level = if config.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let corpora = corpus::read_corpora(&args.train, &args.dev, args.test.as_deref())?;
    evaluate::run(args.model, &config, &corpora, args.query)
}
