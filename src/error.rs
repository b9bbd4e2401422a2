//! Error types
//!
//! Insufficient data is never an error: those paths return `None`, an empty
//! list or a neutral default. What lives here are collaborator failures and
//! refused requests.

use thiserror::Error;

/// Failure reported by a storage collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("record not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Failure reported by the text-generation collaborator.
///
/// Never escapes the core: callers turn it into a skipped item or a
/// fallback text.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service unavailable: {0}")]
    Unavailable(String),

    #[error("generation output unusable: {0}")]
    Unusable(String),

    #[error("generation timed out after {0}s")]
    Timeout(u64),
}

/// Errors surfaced by the core operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("requested {requested} suggestions with {already} already issued today but the daily limit is {allowed}")]
    LimitExceeded { requested: usize, already: usize, allowed: u32 },

    #[error("persona update for user {user_id} lost the race {attempts} times")]
    Conflict { user_id: String, attempts: u32 },

    #[error("invalid pattern key: {0}")]
    InvalidPatternKey(String),

    #[error("invalid category slug: {0}")]
    InvalidSlug(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
