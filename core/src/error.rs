//! Error type shared by the preprocessing, counting and smoothing layers.

/// Errors raised by model construction, training and scoring.
///
/// Every variant is raised at the call that breaks the contract; nothing is
/// retried and no partial result is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// Non-positive degree, smoothing constant outside `(0, 1]`, a context
    /// longer than the model degree, and similar caller mistakes.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Scoring an interpolation model whose mixing weights were never trained.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// An internal invariant does not hold (e.g. a masked token that is still
    /// outside the vocabulary).
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
}

impl ModelError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ModelError::InvalidArgument(msg.into())
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
