//! Conversions from subsystem errors into the shared taxonomy.

use qcc_02_security::SecurityError;
use qcc_03_runtime::RuntimeError;
use qcc_05_quantum_trail::TrailError;
use shared_types::AssemblyError;

/// Map a runtime failure to the caller-facing taxonomy. Resource shortfalls
/// keep their typed shape; everything else that can interrupt the pipeline
/// is an activation or connection failure.
pub fn from_runtime(err: RuntimeError) -> AssemblyError {
    match err {
        RuntimeError::ResourceExhaustion {
            resource,
            available,
            requested,
            ..
        } => AssemblyError::ResourceExhaustion {
            resource,
            limit: available,
            requested,
        },
        RuntimeError::UnknownCell(cell_id) => AssemblyError::UnknownCell(cell_id),
        RuntimeError::NotActive { cell_id, state } => AssemblyError::InvalidCellState {
            cell_id,
            state: state.to_string(),
            expected: "active".to_string(),
        },
        RuntimeError::MissingEdge { source_cell, target } => AssemblyError::CellConnection {
            source_cell,
            target,
            reason: "edge not installed".to_string(),
        },
        other @ (RuntimeError::AlreadyRegistered(_)
        | RuntimeError::InvalidTransition { .. }
        | RuntimeError::Body { .. }) => {
            let cell_id = match &other {
                RuntimeError::AlreadyRegistered(id) => id.clone(),
                RuntimeError::InvalidTransition { cell_id, .. } => cell_id.clone(),
                RuntimeError::Body { cell_id, .. } => cell_id.clone(),
                _ => String::new(),
            };
            AssemblyError::CellActivation {
                cell_id,
                reason: other.to_string(),
            }
        }
    }
}

/// Map a security rejection; the stage names which check failed.
pub fn from_security(err: SecurityError) -> AssemblyError {
    let stage = err.stage();
    let cell_id = match err {
        SecurityError::PrefixMismatch { cell_id } => cell_id,
        SecurityError::ConnectionDenied { source_cell, .. } => source_cell,
        SecurityError::MalformedSignature { .. } => "solution".to_string(),
    };
    AssemblyError::SecurityVerification { cell_id, stage }
}

pub fn from_trail(err: TrailError) -> AssemblyError {
    AssemblyError::Ledger(err.to_string())
}
