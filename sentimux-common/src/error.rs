//! Common error types for SENTIMUX

use thiserror::Error;

/// Common result type for SENTIMUX operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SENTIMUX crates
///
/// Every variant is recoverable from the ingestion pipeline's point of view:
/// components swallow their own faults into logs and degrade (previous config
/// snapshot retained, subscriber evicted, trend write dropped). Nothing here
/// is allowed to halt processing of subsequent events.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration failed validation; the last-known-good snapshot stays active
    #[error("Configuration error: {0}")]
    ConfigValidation(String),

    /// Delivery to a subscriber queue failed; one retry, then eviction
    #[error("Subscriber delivery failed: {0}")]
    SubscriberDelivery(String),

    /// Trend persistence failed; one retry, then the write is dropped
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
