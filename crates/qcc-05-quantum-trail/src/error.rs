//! Ledger error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by ledger operations.
#[derive(Debug, Clone, Error)]
pub enum TrailError {
    /// A block failed structural validation.
    #[error("block validation failed at index {index}: {reason}")]
    BlockValidation { index: u64, reason: String },

    /// A transaction failed signature or structural validation. The
    /// transaction is poisoned, never retried.
    #[error("transaction validation failed for {tx_id}: {reason}")]
    TransactionValidation { tx_id: Uuid, reason: String },

    /// The pending queue is at its back-pressure bound.
    #[error("pending queue full: {pending} transactions, limit {limit}")]
    BackPressure { pending: usize, limit: usize },

    /// Disk failure while persisting or loading.
    #[error("ledger i/o failure on '{path}': {detail}")]
    Io { path: String, detail: String },

    /// Serialization failure.
    #[error("ledger serialization failure: {0}")]
    Serde(String),
}
