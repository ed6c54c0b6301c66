//! Error taxonomy shared by the storage, domain, and service layers.
//!
//! Every request fails independently: a `Validation` or `NotFound` error
//! leaves the store untouched (transactions roll back on drop), and nothing
//! here is fatal to the process. The REST layer owns the mapping to HTTP
//! status codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or rule-violating input (e.g. leader not a member).
    /// The message is safe to return to the caller verbatim.
    #[error("{0}")]
    Validation(String),

    /// Unknown id for the named entity.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Missing or invalid bearer token.
    #[error("authentication required")]
    Unauthorized,

    /// Authenticated caller lacks permission for the action.
    #[error("permission denied")]
    Forbidden,

    /// Underlying store failure. Never surfaced to the caller verbatim.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Infrastructure fault: query timeout, migration or filesystem
    /// failure. Never surfaced to the caller verbatim.
    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
