use thiserror::Error;

/// Failure taxonomy for pipeline transitions. Precondition failures are
/// detected locally before any request is issued; the rest map onto what the
/// backend or the wire gave back.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("{0}")]
    Precondition(String),

    #[error("Error from backend: {0}")]
    Backend(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl PipelineError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// True when no request was issued for this failure.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}
