//! Runtime error types.

use shared_types::{CellState, ResourceKind};
use thiserror::Error;

/// Error reported by a cell body behind the [`crate::ports::CellHandle`]
/// contract.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CellBodyError {
    pub message: String,
}

impl CellBodyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised by runtime operations.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// The cell id is not registered.
    #[error("unknown cell '{0}'")]
    UnknownCell(String),

    /// A cell with this id is already registered.
    #[error("cell '{0}' already registered")]
    AlreadyRegistered(String),

    /// The requested lifecycle action is not legal from the current state.
    #[error("cannot {action} cell '{cell_id}' from state {from}")]
    InvalidTransition {
        cell_id: String,
        from: CellState,
        action: &'static str,
    },

    /// The resource table cannot cover the reservation.
    #[error("{resource} exhausted for cell '{cell_id}': available {available}, requested {requested}")]
    ResourceExhaustion {
        cell_id: String,
        resource: ResourceKind,
        available: u64,
        requested: u64,
    },

    /// Dispatch or relay against a cell that is not active.
    #[error("cell '{cell_id}' is {state}, expected active")]
    NotActive { cell_id: String, state: CellState },

    /// Relay over an edge that was never installed.
    #[error("no connection '{source_cell}' -> '{target}'")]
    MissingEdge {
        source_cell: String,
        target: String,
    },

    /// The cell body rejected a contract call.
    #[error("cell body failure for '{cell_id}' during {operation}: {source}")]
    Body {
        cell_id: String,
        operation: &'static str,
        source: CellBodyError,
    },
}
