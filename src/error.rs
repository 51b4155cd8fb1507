use thiserror::Error;

/// Error taxonomy shared by every core operation.
///
/// `NotFound` and `InvalidArgument` are caller faults; `Conflict` signals a
/// lost concurrent update on a (user, card) key and may be retried;
/// `Storage` wraps opaque database failures and is not retried internally.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl CoreError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Whether a caller-side retry can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Storage(_))
    }
}
