//! An in-process cell body.
//!
//! Implements the cell contract with a name-keyed map of handler function
//! values. Used by the node wiring for built-in cells and by tests as a
//! stand-in for provider-hosted bodies.

use crate::error::CellBodyError;
use crate::ports::CellHandle;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{CapabilityResult, CellParameters, ExecutionMetrics, OutputValue};
use std::collections::HashMap;
use std::sync::Arc;

/// A capability handler: parameters in, contract-shaped result out.
pub type CapabilityHandler =
    Arc<dyn Fn(serde_json::Value) -> CapabilityResult + Send + Sync + 'static>;

#[derive(Debug, Default)]
struct BodyState {
    active: bool,
    invocations: u64,
}

/// An in-process cell body with value-level capability handlers.
pub struct LocalCell {
    handlers: HashMap<String, CapabilityHandler>,
    state: Mutex<BodyState>,
}

impl LocalCell {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            state: Mutex::new(BodyState::default()),
        }
    }

    /// Register a handler under a capability name.
    pub fn with_handler(
        mut self,
        capability: impl Into<String>,
        handler: CapabilityHandler,
    ) -> Self {
        self.handlers.insert(capability.into(), handler);
        self
    }

    /// A body with a single handler that echoes its parameters back.
    pub fn echo(capability: &str) -> Self {
        let name = capability.to_string();
        Self::new().with_handler(
            capability,
            Arc::new(move |params| {
                CapabilityResult::success(
                    vec![OutputValue {
                        name: "result".to_string(),
                        value: serde_json::json!({ "capability": name, "params": params }),
                        value_type: "object".to_string(),
                    }],
                    ExecutionMetrics {
                        execution_time_ms: 1,
                        memory_used_mb: 1.0,
                    },
                )
            }),
        )
    }

    /// How many dispatches this body has served.
    pub fn invocations(&self) -> u64 {
        self.state.lock().invocations
    }
}

impl Default for LocalCell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CellHandle for LocalCell {
    async fn initialize(&self, _params: &CellParameters) -> Result<(), CellBodyError> {
        Ok(())
    }

    async fn activate(&self) -> Result<(), CellBodyError> {
        self.state.lock().active = true;
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), CellBodyError> {
        self.state.lock().active = false;
        Ok(())
    }

    async fn suspend(&self) -> Result<serde_json::Value, CellBodyError> {
        let mut state = self.state.lock();
        state.active = false;
        Ok(serde_json::json!({ "invocations": state.invocations }))
    }

    async fn resume(&self, snapshot: serde_json::Value) -> Result<(), CellBodyError> {
        let mut state = self.state.lock();
        if let Some(invocations) = snapshot.get("invocations").and_then(|v| v.as_u64()) {
            state.invocations = invocations;
        }
        state.active = true;
        Ok(())
    }

    async fn release(&self) -> Result<(), CellBodyError> {
        self.state.lock().active = false;
        Ok(())
    }

    async fn execute(
        &self,
        capability: &str,
        params: serde_json::Value,
    ) -> Result<CapabilityResult, CellBodyError> {
        let Some(handler) = self.handlers.get(capability) else {
            return Ok(CapabilityResult::error(format!(
                "no handler for capability '{}'",
                capability
            )));
        };
        self.state.lock().invocations += 1;
        Ok(handler(params))
    }
}
