//! Error taxonomy for the marketplace.
//!
//! The workflow errors (`NotFound`, `Policy`, `InvalidRequest`, `Conflict`,
//! `Adapter`) are surfaced to callers verbatim; the rest cover ambient
//! concerns (persistence, configuration, actor resolution).

use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Connection(err.to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Duplicate(err.to_string())
            }
            _ => Self::Query(err.to_string()),
        }
    }
}

/// External collaborator errors (payment, blockchain, notification)
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Payment provider unavailable: {0}")]
    PaymentUnavailable(String),

    #[error("Blockchain adapter error: {0}")]
    Blockchain(String),

    #[error("Adapter timeout: {0}")]
    Timeout(String),

    #[error("Notification emitter error: {0}")]
    Notification(String),
}

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    /// Entity missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Role or ownership rule broken
    #[error("Policy violation: {0}")]
    Policy(String),

    /// Malformed or incomplete request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Entity not in the expected state, including lost check-and-set races
    #[error("Conflicting state: {0}")]
    Conflict(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Actor could not be resolved from the request
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(DatabaseError::from(err))
    }
}
