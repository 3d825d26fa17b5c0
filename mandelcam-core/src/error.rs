use thiserror::Error;

/// Errors originating from the core fractal engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid parameters: {reason}")]
    InvalidParameters { reason: String },
}

impl CoreError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            reason: reason.into(),
        }
    }
}
