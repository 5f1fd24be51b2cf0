//! Ports layer: the cell contract.

use crate::error::CellBodyError;
use async_trait::async_trait;
use shared_types::{CapabilityResult, CellParameters};

/// What a cell body must expose to the runtime.
///
/// Lifecycle calls mirror the runtime state machine; `execute` dispatches
/// one of the cell's declared capability handlers. A body reports failures
/// either as `Err` (contract violation, transport fault) or as a result
/// with `status == error` and a single string output named `error`.
#[async_trait]
pub trait CellHandle: Send + Sync {
    async fn initialize(&self, params: &CellParameters) -> Result<(), CellBodyError>;

    async fn activate(&self) -> Result<(), CellBodyError>;

    async fn deactivate(&self) -> Result<(), CellBodyError>;

    /// Capture the body's state for suspension. The returned value is
    /// opaque to the runtime.
    async fn suspend(&self) -> Result<serde_json::Value, CellBodyError>;

    async fn resume(&self, snapshot: serde_json::Value) -> Result<(), CellBodyError>;

    async fn release(&self) -> Result<(), CellBodyError>;

    /// Dispatch one capability handler.
    async fn execute(
        &self,
        capability: &str,
        params: serde_json::Value,
    ) -> Result<CapabilityResult, CellBodyError>;
}
