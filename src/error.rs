//! # Structured Error Handling
//!
//! Crate-wide error taxonomy. Usage errors are programmer mistakes and are
//! never retried; `Rollback` is a control-flow sentinel recognized by
//! [`crate::database::ConnectionManager::transaction`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuarryError {
    /// A programmer mistake: invalid builder input, wrong lock state,
    /// conflicting pagination cursors, and the like.
    #[error("usage error: {0}")]
    Usage(String),

    /// A by-key lookup matched zero rows.
    #[error("record not found: {0}")]
    NotFound(String),

    /// An insert or update was rejected by the database; carries the
    /// driver's original message.
    #[error("record not saved: {0}")]
    NotSaved(String),

    /// A resource could not be obtained before its deadline, e.g. an
    /// advisory lock that stayed contended past the timeout.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Sentinel raised inside a transaction block to request a silent
    /// rollback. Swallowed at the transaction boundary, never propagated.
    #[error("transaction rollback requested")]
    Rollback,

    /// Errors surfaced verbatim from the underlying driver.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl QuarryError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn not_saved(message: impl Into<String>) -> Self {
        Self::NotSaved(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// True for the rollback sentinel only.
    pub fn is_rollback(&self) -> bool {
        matches!(self, Self::Rollback)
    }
}

pub type Result<T> = std::result::Result<T, QuarryError>;
