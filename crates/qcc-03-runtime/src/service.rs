//! Cell Runtime - the single owner of cell state.
//!
//! Holds the lifecycle table, resource accounting, connection registry, and
//! dispatch registry as inner structures behind one lock each. Lifecycle
//! transitions on a cell are serialized through a per-cell gate held across
//! the body call; dispatches are serialized through a separate per-cell gate
//! unless the cell opted into concurrent dispatch.

use crate::domain::connections::{CellConnections, ConnectionRegistry};
use crate::domain::lifecycle::{self, LifecycleAction, SuspendSnapshot};
use crate::domain::resources::{default_requirements, ResourceTable, Shortfall};
use crate::error::RuntimeError;
use crate::ports::CellHandle;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use shared_types::{
    CapabilityResult, Cell, CellState, ConnectionMap, ResourceAllocation, ResourceSnapshot,
    UsageMetrics,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Runtime configuration: the totals of the process-wide resource table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub memory_total_mb: u64,
    pub cpu_cores: u64,
    pub storage_total_mb: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            memory_total_mb: 8192,
            cpu_cores: 8,
            storage_total_mb: 102_400,
        }
    }
}

impl RuntimeConfig {
    fn totals(&self) -> ResourceAllocation {
        ResourceAllocation {
            memory_mb: self.memory_total_mb,
            cpu_percent: self.cpu_cores * 100,
            storage_mb: self.storage_total_mb,
        }
    }
}

/// How a state commit touches the cell's recorded allocation.
enum AllocationUpdate {
    Keep,
    Clear,
    Set(ResourceAllocation),
}

struct CellEntry {
    cell: Cell,
    handle: Arc<dyn CellHandle>,
    /// Serializes lifecycle transitions on this cell.
    lifecycle_gate: Arc<AsyncMutex<()>>,
    /// Serializes dispatches unless the cell is `concurrent_safe`.
    dispatch_gate: Arc<AsyncMutex<()>>,
    transitions: Vec<(CellState, DateTime<Utc>)>,
}

/// The runtime.
pub struct CellRuntime {
    cells: RwLock<HashMap<String, CellEntry>>,
    resources: Mutex<ResourceTable>,
    connections: Mutex<ConnectionRegistry>,
}

impl CellRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        info!(
            memory_total_mb = config.memory_total_mb,
            cpu_cores = config.cpu_cores,
            storage_total_mb = config.storage_total_mb,
            "cell runtime initialized"
        );
        Self {
            cells: RwLock::new(HashMap::new()),
            resources: Mutex::new(ResourceTable::new(config.totals())),
            connections: Mutex::new(ConnectionRegistry::new()),
        }
    }

    // === REGISTRATION ===

    /// Register an acquired cell and initialize its body. The cell enters
    /// the table in `initialized` state.
    pub async fn register_cell(
        &self,
        mut cell: Cell,
        handle: Arc<dyn CellHandle>,
    ) -> Result<(), RuntimeError> {
        if self.cells.read().contains_key(&cell.cell_id) {
            return Err(RuntimeError::AlreadyRegistered(cell.cell_id));
        }

        handle
            .initialize(&cell.parameters)
            .await
            .map_err(|source| RuntimeError::Body {
                cell_id: cell.cell_id.clone(),
                operation: "initialize",
                source,
            })?;

        cell.status = CellState::Initialized;
        let cell_id = cell.cell_id.clone();
        let entry = CellEntry {
            cell,
            handle,
            lifecycle_gate: Arc::new(AsyncMutex::new(())),
            dispatch_gate: Arc::new(AsyncMutex::new(())),
            transitions: vec![(CellState::Initialized, Utc::now())],
        };

        let mut cells = self.cells.write();
        if cells.contains_key(&cell_id) {
            return Err(RuntimeError::AlreadyRegistered(cell_id));
        }
        cells.insert(cell_id.clone(), entry);
        debug!(cell_id = %cell_id, "cell registered");
        Ok(())
    }

    // === LIFECYCLE ===

    /// Activate a cell: reserve resources, then bring the body up. Legal
    /// from `initialized` and `deactivated`.
    pub async fn activate(&self, cell_id: &str) -> Result<ResourceAllocation, RuntimeError> {
        let (handle, gate, capability, requested) = {
            let cells = self.cells.read();
            let entry = self.entry(&cells, cell_id)?;
            (
                entry.handle.clone(),
                entry.lifecycle_gate.clone(),
                entry.cell.capability.clone(),
                entry.cell.parameters.resources,
            )
        };
        let _guard = gate.lock().await;

        self.check_transition(cell_id, LifecycleAction::Activate)?;

        let requested = requested.unwrap_or_else(|| default_requirements(&capability));
        let reserved = self
            .resources
            .lock()
            .allocate(cell_id, requested)
            .map_err(|shortfall| self.exhaustion(cell_id, shortfall))?;

        if let Err(source) = handle.activate().await {
            // The reservation must not leak when the body refuses to start.
            self.resources.lock().release(cell_id);
            return Err(RuntimeError::Body {
                cell_id: cell_id.to_string(),
                operation: "activate",
                source,
            });
        }

        self.commit(cell_id, CellState::Active, AllocationUpdate::Set(reserved));
        debug!(cell_id = %cell_id, memory_mb = reserved.memory_mb, "cell activated");
        Ok(reserved)
    }

    /// Suspend an active cell: capture its state, then shrink its
    /// reservation to 20% memory / 10% CPU.
    pub async fn suspend(&self, cell_id: &str) -> Result<SuspendSnapshot, RuntimeError> {
        let (handle, gate) = self.handles(cell_id)?;
        let _guard = gate.lock().await;

        self.check_transition(cell_id, LifecycleAction::Suspend)?;

        let body_state = handle
            .suspend()
            .await
            .map_err(|source| RuntimeError::Body {
                cell_id: cell_id.to_string(),
                operation: "suspend",
                source,
            })?;

        let reduced = self.resources.lock().reduce_for_suspend(cell_id);
        self.commit(
            cell_id,
            CellState::Suspended,
            match reduced {
                Some(reduced) => AllocationUpdate::Set(reduced),
                None => AllocationUpdate::Keep,
            },
        );

        Ok(SuspendSnapshot {
            cell_id: cell_id.to_string(),
            taken_at: Utc::now(),
            body_state,
        })
    }

    /// Resume a suspended cell, re-reserving its full original allocation.
    pub async fn resume(
        &self,
        cell_id: &str,
        snapshot: SuspendSnapshot,
    ) -> Result<ResourceAllocation, RuntimeError> {
        let (handle, gate) = self.handles(cell_id)?;
        let _guard = gate.lock().await;

        self.check_transition(cell_id, LifecycleAction::Resume)?;

        let restored = self
            .resources
            .lock()
            .restore_for_resume(cell_id)
            .ok_or_else(|| RuntimeError::UnknownCell(cell_id.to_string()))?
            .map_err(|shortfall| self.exhaustion(cell_id, shortfall))?;

        if let Err(source) = handle.resume(snapshot.body_state).await {
            // Fall back to the reduced reservation; the cell stays suspended.
            self.resources.lock().reduce_for_suspend(cell_id);
            return Err(RuntimeError::Body {
                cell_id: cell_id.to_string(),
                operation: "resume",
                source,
            });
        }

        self.commit(cell_id, CellState::Active, AllocationUpdate::Set(restored));
        Ok(restored)
    }

    /// Deactivate a cell and return its resources. Idempotent from any
    /// state; a released cell stays released.
    pub async fn deactivate(&self, cell_id: &str) -> Result<(), RuntimeError> {
        let (handle, gate) = self.handles(cell_id)?;
        let _guard = gate.lock().await;

        let from = self.state_of(cell_id)?;
        if matches!(from, CellState::Released | CellState::Deactivated) {
            return Ok(());
        }

        if matches!(from, CellState::Active | CellState::Suspended) {
            handle
                .deactivate()
                .await
                .map_err(|source| RuntimeError::Body {
                    cell_id: cell_id.to_string(),
                    operation: "deactivate",
                    source,
                })?;
        }

        self.resources.lock().release(cell_id);
        self.commit(cell_id, CellState::Deactivated, AllocationUpdate::Clear);
        debug!(cell_id = %cell_id, "cell deactivated");
        Ok(())
    }

    /// Release a cell for good: resources reclaimed, connections dropped,
    /// state terminal. Idempotent; releasing an unknown cell is a no-op.
    pub async fn release(&self, cell_id: &str) -> Result<(), RuntimeError> {
        let Ok((handle, gate)) = self.handles(cell_id) else {
            return Ok(());
        };
        let _guard = gate.lock().await;

        if self.state_of(cell_id)? == CellState::Released {
            return Ok(());
        }

        if let Err(source) = handle.release().await {
            // Resources are reclaimed regardless of what the body thinks.
            warn!(cell_id = %cell_id, error = %source, "cell body failed during release");
        }

        self.resources.lock().release(cell_id);
        self.connections.lock().remove_cell(cell_id);
        self.commit(cell_id, CellState::Released, AllocationUpdate::Clear);
        info!(cell_id = %cell_id, "cell released");
        Ok(())
    }

    // === CONNECTIONS ===

    /// Install a directed edge between two registered, non-released cells.
    pub fn connect(&self, source: &str, target: &str) -> Result<(), RuntimeError> {
        {
            let cells = self.cells.read();
            for cell_id in [source, target] {
                let entry = self.entry(&cells, cell_id)?;
                if entry.cell.status == CellState::Released {
                    return Err(RuntimeError::NotActive {
                        cell_id: cell_id.to_string(),
                        state: CellState::Released,
                    });
                }
            }
        }
        self.connections.lock().connect(source, target);
        debug!(source = %source, target = %target, "connection installed");
        Ok(())
    }

    /// Remove an edge. Removing a non-existent edge returns `false`.
    pub fn disconnect(&self, source: &str, target: &str) -> bool {
        self.connections.lock().disconnect(source, target)
    }

    /// Edges touching a cell, both directions.
    pub fn get_connections(&self, cell_id: &str) -> CellConnections {
        self.connections.lock().connections_of(cell_id)
    }

    /// Relay a message across an installed edge. The transport itself is
    /// the provider's concern; the runtime validates the edge and counts
    /// the relay.
    pub fn relay(
        &self,
        source: &str,
        target: &str,
        message: &serde_json::Value,
    ) -> Result<(), RuntimeError> {
        if !self.connections.lock().record_relay(source, target) {
            return Err(RuntimeError::MissingEdge {
                source_cell: source.to_string(),
                target: target.to_string(),
            });
        }
        debug!(
            source = %source,
            target = %target,
            bytes = message.to_string().len(),
            "message relayed"
        );
        Ok(())
    }

    /// The installed adjacency, keyed by source cell id.
    pub fn connection_map(&self) -> ConnectionMap {
        self.connections.lock().as_connection_map()
    }

    // === DISPATCH ===

    /// Dispatch a capability handler on an active cell. Serialized per cell
    /// unless the cell's parameters set `concurrent_safe`.
    pub async fn execute(
        &self,
        cell_id: &str,
        capability: &str,
        params: serde_json::Value,
    ) -> Result<CapabilityResult, RuntimeError> {
        let (handle, dispatch_gate, concurrent_safe) = {
            let cells = self.cells.read();
            let entry = self.entry(&cells, cell_id)?;
            if entry.cell.status != CellState::Active {
                return Err(RuntimeError::NotActive {
                    cell_id: cell_id.to_string(),
                    state: entry.cell.status,
                });
            }
            (
                entry.handle.clone(),
                entry.dispatch_gate.clone(),
                entry.cell.parameters.concurrent_safe,
            )
        };

        let result = if concurrent_safe {
            handle.execute(capability, params).await
        } else {
            let _guard = dispatch_gate.lock().await;
            handle.execute(capability, params).await
        }
        .map_err(|source| RuntimeError::Body {
            cell_id: cell_id.to_string(),
            operation: "execute",
            source,
        })?;

        self.resources.lock().update_usage(
            cell_id,
            result.performance_metrics.memory_used_mb,
            None,
        );

        Ok(result)
    }

    // === QUERIES ===

    pub fn contains(&self, cell_id: &str) -> bool {
        self.cells.read().contains_key(cell_id)
    }

    /// Re-stamp a cell's signature when it moves from the cache into a new
    /// solution.
    pub fn set_quantum_signature(
        &self,
        cell_id: &str,
        signature: &str,
    ) -> Result<(), RuntimeError> {
        let mut cells = self.cells.write();
        let entry = cells
            .get_mut(cell_id)
            .ok_or_else(|| RuntimeError::UnknownCell(cell_id.to_string()))?;
        entry.cell.quantum_signature = signature.to_string();
        Ok(())
    }

    /// Current snapshot of a cell's record.
    pub fn cell(&self, cell_id: &str) -> Option<Cell> {
        self.cells.read().get(cell_id).map(|entry| entry.cell.clone())
    }

    pub fn cell_state(&self, cell_id: &str) -> Option<CellState> {
        self.cells.read().get(cell_id).map(|entry| entry.cell.status)
    }

    /// Transition history of a cell, oldest first.
    pub fn transitions(&self, cell_id: &str) -> Vec<(CellState, DateTime<Utc>)> {
        self.cells
            .read()
            .get(cell_id)
            .map(|entry| entry.transitions.clone())
            .unwrap_or_default()
    }

    pub fn usage(&self, cell_id: &str) -> Option<(ResourceAllocation, UsageMetrics)> {
        self.resources.lock().usage(cell_id)
    }

    pub fn resource_snapshot(&self) -> ResourceSnapshot {
        self.resources.lock().snapshot()
    }

    // === INTERNAL ===

    fn entry<'a>(
        &self,
        cells: &'a HashMap<String, CellEntry>,
        cell_id: &str,
    ) -> Result<&'a CellEntry, RuntimeError> {
        cells
            .get(cell_id)
            .ok_or_else(|| RuntimeError::UnknownCell(cell_id.to_string()))
    }

    fn handles(
        &self,
        cell_id: &str,
    ) -> Result<(Arc<dyn CellHandle>, Arc<AsyncMutex<()>>), RuntimeError> {
        let cells = self.cells.read();
        let entry = self.entry(&cells, cell_id)?;
        Ok((entry.handle.clone(), entry.lifecycle_gate.clone()))
    }

    fn state_of(&self, cell_id: &str) -> Result<CellState, RuntimeError> {
        self.cell_state(cell_id)
            .ok_or_else(|| RuntimeError::UnknownCell(cell_id.to_string()))
    }

    fn check_transition(
        &self,
        cell_id: &str,
        action: LifecycleAction,
    ) -> Result<CellState, RuntimeError> {
        let from = self.state_of(cell_id)?;
        lifecycle::apply(from, action).ok_or(RuntimeError::InvalidTransition {
            cell_id: cell_id.to_string(),
            from,
            action: action.name(),
        })
    }

    fn exhaustion(&self, cell_id: &str, shortfall: Shortfall) -> RuntimeError {
        warn!(
            cell_id = %cell_id,
            resource = %shortfall.resource,
            available = shortfall.available,
            requested = shortfall.requested,
            "resource shortfall"
        );
        RuntimeError::ResourceExhaustion {
            cell_id: cell_id.to_string(),
            resource: shortfall.resource,
            available: shortfall.available,
            requested: shortfall.requested,
        }
    }

    fn commit(&self, cell_id: &str, state: CellState, allocation: AllocationUpdate) {
        let mut cells = self.cells.write();
        if let Some(entry) = cells.get_mut(cell_id) {
            entry.cell.status = state;
            entry.transitions.push((state, Utc::now()));
            match allocation {
                AllocationUpdate::Keep => {}
                AllocationUpdate::Clear => entry.cell.allocation = None,
                AllocationUpdate::Set(reserved) => entry.cell.allocation = Some(reserved),
            }
        }
    }
}
