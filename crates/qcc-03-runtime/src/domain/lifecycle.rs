//! The cell lifecycle state machine.
//!
//! ```text
//!  initialized ──activate──▶ active ──suspend──▶ suspended
//!                               │                    │
//!                               │                    └──resume──▶ active
//!                               │
//!                               └──deactivate──▶ deactivated ──release──▶ released
//! ```
//!
//! Deactivate and release are idempotent from any state; `released` is
//! terminal and absorbs both. Activation is additionally legal from
//! `deactivated` (a cached cell coming back into service).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::CellState;

/// Lifecycle actions a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Activate,
    Suspend,
    Resume,
    Deactivate,
    Release,
}

impl LifecycleAction {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleAction::Activate => "activate",
            LifecycleAction::Suspend => "suspend",
            LifecycleAction::Resume => "resume",
            LifecycleAction::Deactivate => "deactivate",
            LifecycleAction::Release => "release",
        }
    }
}

/// Compute the successor state, or `None` when the action is illegal from
/// the given state. Idempotent actions return the absorbing state.
pub fn apply(from: CellState, action: LifecycleAction) -> Option<CellState> {
    use CellState::*;
    use LifecycleAction::*;

    match (from, action) {
        (Initialized, Activate) | (Deactivated, Activate) => Some(Active),
        (Active, Suspend) => Some(Suspended),
        (Suspended, Resume) => Some(Active),
        // Released is terminal and absorbs the idempotent actions.
        (Released, Deactivate) | (Released, Release) => Some(Released),
        (_, Deactivate) => Some(Deactivated),
        (_, Release) => Some(Released),
        _ => None,
    }
}

/// Opaque snapshot token produced by suspension and consumed by resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendSnapshot {
    pub cell_id: String,
    pub taken_at: DateTime<Utc>,
    /// Whatever the cell body handed back; the runtime never inspects it.
    pub body_state: serde_json::Value,
}
