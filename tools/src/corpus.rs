use anyhow::{Context, Result};
use std::path::Path;

/// Raw text of the three corpora a run needs.
#[derive(Debug, Clone)]
pub struct Corpora {
    pub train: String,
    pub dev: String,
    pub test: Option<String>,
}

/// Read the training, held-out and (optional) test corpora whole.
pub fn read_corpora(train: &Path, dev: &Path, test: Option<&Path>) -> Result<Corpora> {
    Ok(Corpora {
        train: read(train)?,
        dev: read(dev)?,
        test: test.map(read).transpose()?,
    })
}

fn read(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    tracing::debug!("read {} bytes from {}", text.len(), path.display());
    Ok(text)
}
