//! Security gate error types.

use crate::domain::policy::SecurityLevel;
use shared_types::VerificationStage;
use thiserror::Error;

/// Errors raised by the security gate. None of these are retryable.
#[derive(Debug, Clone, Error)]
pub enum SecurityError {
    /// The signature fails the format check.
    #[error("malformed signature: {reason}")]
    MalformedSignature { reason: String },

    /// A member cell's signature does not share the solution prefix.
    #[error("cell '{cell_id}' signature does not share the solution signature prefix")]
    PrefixMismatch { cell_id: String },

    /// The connection policy denied an edge.
    #[error("connection '{source_cell}' -> '{target}' denied at level {level}")]
    ConnectionDenied {
        source_cell: String,
        target: String,
        level: SecurityLevel,
    },
}

impl SecurityError {
    /// The verification stage this error belongs to.
    pub fn stage(&self) -> VerificationStage {
        match self {
            SecurityError::MalformedSignature { .. } => VerificationStage::Signature,
            SecurityError::PrefixMismatch { .. } => VerificationStage::Prefix,
            SecurityError::ConnectionDenied { .. } => VerificationStage::Connection,
        }
    }
}
