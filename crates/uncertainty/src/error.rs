//! Error types shared by behaviours, predicates and the dispatcher.

/// Errors raised while building or invoking behaviours.
///
/// `Configuration` errors are only produced while behaviours are being
/// constructed. Everything else surfaces at request time and is handed back to
/// the host untouched.
#[derive(Debug, thiserror::Error)]
pub enum BehaviourError {
    #[error("Invalid behaviour configuration: {0}")]
    Configuration(String),
    #[error("Failed to serialize response body: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Predicate failed: {0}")]
    Predicate(String),
    #[error("Downstream handler failed: {0}")]
    Downstream(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BehaviourError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        BehaviourError::Configuration(msg.into())
    }

    pub fn predicate(msg: impl Into<String>) -> Self {
        BehaviourError::Predicate(msg.into())
    }

    pub fn downstream(msg: impl Into<String>) -> Self {
        BehaviourError::Downstream(msg.into())
    }
}

impl From<hyper::http::Error> for BehaviourError {
    fn from(e: hyper::http::Error) -> Self {
        BehaviourError::InvalidResponse(e.to_string())
    }
}

pub type Result<T, E = BehaviourError> = std::result::Result<T, E>;
