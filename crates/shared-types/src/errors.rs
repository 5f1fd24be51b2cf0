//! # Error Taxonomy
//!
//! The cross-subsystem error surface of the orchestrator. Every error that
//! reaches a caller carries a machine-readable code via [`AssemblyError::code`];
//! free-text detail is supplementary.
//!
//! Recovery policy:
//!
//! | Variant | Policy |
//! |---------|--------|
//! | `CellRequest` | retried across providers; terminal when all exhausted |
//! | `SecurityVerification` | never retried; aborts with cleanup |
//! | `CellActivation` / `CellConnection` | abort current assembly with cleanup |
//! | `ResourceExhaustion` | surfaced; no partial state |
//! | `Timeout` | per-provider retry, then fail over |

use thiserror::Error;
use uuid::Uuid;

/// Resource classes tracked by the runtime's accounting table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Memory,
    Cpu,
    Storage,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Memory => "memory",
            ResourceKind::Cpu => "cpu",
            ResourceKind::Storage => "storage",
        };
        f.write_str(s)
    }
}

/// Stage at which the security gate rejected an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    /// Well-formedness of the solution signature.
    Signature,
    /// First-10-characters prefix match of a cell signature.
    Prefix,
    /// Permission derivation from the capability template.
    Permissions,
    /// Connection-policy authorization of an edge.
    Connection,
}

impl std::fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VerificationStage::Signature => "signature",
            VerificationStage::Prefix => "prefix",
            VerificationStage::Permissions => "permissions",
            VerificationStage::Connection => "connection",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by assembly-pipeline operations.
#[derive(Debug, Clone, Error)]
pub enum AssemblyError {
    /// No provider could supply a cell for the capability.
    #[error("cell request failed for capability '{capability}' (providers tried: {providers_tried:?})")]
    CellRequest {
        capability: String,
        providers_tried: Vec<String>,
    },

    /// The security gate rejected a cell or the solution signature.
    #[error("security verification failed for cell '{cell_id}' at stage {stage}")]
    SecurityVerification {
        cell_id: String,
        stage: VerificationStage,
    },

    /// The runtime could not activate a cell.
    #[error("activation failed for cell '{cell_id}': {reason}")]
    CellActivation { cell_id: String, reason: String },

    /// The runtime could not install a connection edge.
    #[error("connection '{source_cell}' -> '{target}' failed: {reason}")]
    CellConnection {
        source_cell: String,
        target: String,
        reason: String,
    },

    /// The resource table would go negative.
    #[error("{resource} exhausted: limit {limit}, requested {requested}")]
    ResourceExhaustion {
        resource: ResourceKind,
        limit: u64,
        requested: u64,
    },

    /// A provider RPC exceeded its deadline.
    #[error("operation '{operation}' timed out after {timeout_secs}s")]
    Timeout {
        operation: String,
        timeout_secs: u64,
    },

    /// The solution id is not in the active map.
    #[error("unknown solution: {0}")]
    UnknownSolution(Uuid),

    /// The cell id does not belong to any active solution.
    #[error("unknown cell: '{0}'")]
    UnknownCell(String),

    /// A cell is not in a state that permits the operation.
    #[error("cell '{cell_id}' is {state}, expected {expected}")]
    InvalidCellState {
        cell_id: String,
        state: String,
        expected: String,
    },

    /// Ledger-side failure surfaced through the assembler.
    #[error("ledger error: {0}")]
    Ledger(String),
}

impl AssemblyError {
    /// Stable machine-readable code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            AssemblyError::CellRequest { .. } => "CELL_REQUEST_FAILED",
            AssemblyError::SecurityVerification { .. } => "SECURITY_VERIFICATION_FAILED",
            AssemblyError::CellActivation { .. } => "CELL_ACTIVATION_FAILED",
            AssemblyError::CellConnection { .. } => "CELL_CONNECTION_FAILED",
            AssemblyError::ResourceExhaustion { .. } => "RESOURCE_EXHAUSTED",
            AssemblyError::Timeout { .. } => "TIMEOUT",
            AssemblyError::UnknownSolution(_) => "UNKNOWN_SOLUTION",
            AssemblyError::UnknownCell(_) => "UNKNOWN_CELL",
            AssemblyError::InvalidCellState { .. } => "INVALID_CELL_STATE",
            AssemblyError::Ledger(_) => "LEDGER_ERROR",
        }
    }

    /// Whether the assembler may retry the failed operation against another
    /// provider. Security failures are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AssemblyError::CellRequest { .. } | AssemblyError::Timeout { .. }
        )
    }
}
