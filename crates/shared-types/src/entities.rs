//! # Core Domain Entities
//!
//! Defines the entities shared across orchestrator subsystems.
//!
//! ## Clusters
//!
//! - **Cells & Solutions**: `Cell`, `CellState`, `Solution`, `SolutionStatus`
//! - **Configurations**: `CellConfiguration`, `CellSpec`
//! - **Intent**: `IntentAnalysis`, `RequiredCapability`
//! - **Context & Telemetry**: `DeviceInfo`, `AssemblyContext`,
//!   `AssemblerStatus`, `ResourceSnapshot`
//! - **Cell Contract**: `CapabilityResult`, `OutputValue`, `ExecutionMetrics`

use crate::capability::{CapabilityOptions, CellParameters};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Directed adjacency map over capability names or cell ids.
pub type ConnectionMap = BTreeMap<String, Vec<String>>;

// =============================================================================
// CLUSTER A: CELLS & SOLUTIONS
// =============================================================================

/// Lifecycle state of a cell.
///
/// Transitions are enforced by the runtime: `Initialized → Active`,
/// `Active ⇄ Suspended`, `Active → Deactivated → Released`. `Released` is
/// terminal; a released cell is never reactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    Initialized,
    Active,
    Suspended,
    Deactivated,
    Released,
}

impl std::fmt::Display for CellState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CellState::Initialized => "initialized",
            CellState::Active => "active",
            CellState::Suspended => "suspended",
            CellState::Deactivated => "deactivated",
            CellState::Released => "released",
        };
        f.write_str(s)
    }
}

/// Resources reserved for a cell in the runtime's accounting table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub memory_mb: u64,
    pub cpu_percent: u64,
    pub storage_mb: u64,
}

/// Observed resource usage of a cell, updated from dispatch results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub memory_peak_mb: f64,
    pub cpu_peak_percent: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// A remote compute module instance.
///
/// Cell ids are minted as `<capability>-<uuid>` so a configuration
/// reconstructed from the ledger can recover the capability from the id
/// alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_id: String,
    pub cell_type: String,
    pub capability: String,
    pub version: String,
    pub provider_url: String,
    /// Derived signature stamped at acquisition; shares its first 10
    /// characters with the owning solution's signature.
    pub quantum_signature: String,
    pub status: CellState,
    pub created_at: DateTime<Utc>,
    pub parameters: CellParameters,
    /// Reservation snapshot, present once the runtime has allocated.
    pub allocation: Option<ResourceAllocation>,
}

impl Cell {
    /// Mint a cell id carrying its capability as a prefix.
    pub fn mint_id(capability: &str) -> String {
        format!("{}-{}", capability, Uuid::new_v4())
    }

    /// Recover the capability prefix from a cell id, if present.
    pub fn capability_of_id(cell_id: &str) -> Option<&str> {
        // The uuid suffix is 36 chars plus the joining '-'.
        let end = cell_id.len().checked_sub(37)?;
        if end == 0 || cell_id.as_bytes()[end] != b'-' {
            return None;
        }
        Some(&cell_id[..end])
    }
}

/// Aggregate status of a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionStatus {
    Initializing,
    Active,
    Suspended,
    Released,
    Error,
}

/// Performance record attached to a solution and to ledger transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceMetrics {
    pub assembly_time_ms: u64,
    pub memory_peak_mb: f64,
    pub cpu_usage_avg: f64,
    /// Zero means "not yet released".
    pub total_usage_time_ms: u64,
}

/// An assembled, active set of cells satisfying one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub solution_id: Uuid,
    /// Signature shared by every member cell (first 10 characters).
    pub quantum_signature: String,
    pub cells: BTreeMap<String, Cell>,
    /// The connection edges actually installed, keyed by source cell id.
    pub connection_map: ConnectionMap,
    /// The interpreter output this solution was assembled from.
    pub intent: IntentAnalysis,
    pub status: SolutionStatus,
    pub created_at: DateTime<Utc>,
    pub metrics: PerformanceMetrics,
    /// Set when step 4 of the pipeline reused a ledger configuration.
    pub used_prior_configuration: bool,
}

// =============================================================================
// CLUSTER B: CONFIGURATIONS
// =============================================================================

/// One cell of a reusable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSpec {
    pub cell_type: String,
    pub capability: String,
    pub version: String,
    pub provider_url: String,
    #[serde(default)]
    pub parameters: CellParameters,
}

/// A reusable recipe reconstructed from past successful assemblies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellConfiguration {
    pub config_id: Uuid,
    pub cell_specs: Vec<CellSpec>,
    /// Directed graph over the cell types in `cell_specs`; no dangling nodes.
    pub connection_map: ConnectionMap,
    /// Quality score in `[0, 100]`.
    pub performance_score: f64,
    pub use_count: u32,
    pub last_used_at: DateTime<Utc>,
}

// =============================================================================
// CLUSTER C: INTENT
// =============================================================================

/// One capability the interpreter decided the request needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredCapability {
    pub name: String,
    pub options: CapabilityOptions,
    /// Lower is earlier in acquisition order.
    pub priority: u8,
    pub confidence: f64,
}

/// Output of `IntentInterpreter::analyze`. A pure function of its inputs;
/// an unintelligible request yields the fallback capability, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub original_request: String,
    pub normalized_request: String,
    pub required_capabilities: Vec<RequiredCapability>,
    /// Hints keyed by source capability name; endpoints are always members
    /// of `required_capabilities`.
    pub suggested_connections: ConnectionMap,
    pub analyzed_at: DateTime<Utc>,
    pub context_used: bool,
    /// Arithmetic mean of per-capability confidences.
    pub confidence_score: f64,
    pub use_previous_configurations: bool,
}

impl IntentAnalysis {
    /// Capability names in priority order.
    pub fn capability_names(&self) -> Vec<String> {
        self.required_capabilities
            .iter()
            .map(|cap| cap.name.clone())
            .collect()
    }
}

// =============================================================================
// CLUSTER D: CONTEXT & TELEMETRY
// =============================================================================

/// Client platform classification used by device adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Mobile,
    Web,
    Desktop,
}

/// What the orchestrator knows about the requesting device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub platform: Platform,
    pub memory_gb: u32,
    pub cpu_cores: u32,
    pub gpu_available: bool,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            platform: Platform::Desktop,
            memory_gb: 8,
            cpu_cores: 4,
            gpu_available: false,
        }
    }
}

/// Request context, enriched by the assembler before interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyContext {
    pub user_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub device_info: Option<DeviceInfo>,
    pub assembler_id: Option<Uuid>,
}

/// Point-in-time view of the runtime's resource accounting table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub memory_total_mb: u64,
    pub memory_available_mb: u64,
    pub cpu_total_percent: u64,
    pub cpu_available_percent: u64,
    pub storage_total_mb: u64,
    pub storage_available_mb: u64,
    pub active_allocations: usize,
}

impl ResourceSnapshot {
    pub fn memory_usage_percent(&self) -> f64 {
        usage_percent(self.memory_total_mb, self.memory_available_mb)
    }

    pub fn cpu_usage_percent(&self) -> f64 {
        usage_percent(self.cpu_total_percent, self.cpu_available_percent)
    }

    pub fn storage_usage_percent(&self) -> f64 {
        usage_percent(self.storage_total_mb, self.storage_available_mb)
    }
}

fn usage_percent(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 - (available as f64 / total as f64 * 100.0)
}

/// Assembler telemetry returned by its status operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblerStatus {
    pub assembler_id: Uuid,
    pub uptime_seconds: u64,
    pub active_solutions: usize,
    pub cached_cells: usize,
    pub total_assemblies: u64,
    pub total_cells_requested: u64,
    pub cache_hits: u64,
    pub resources: ResourceSnapshot,
}

// =============================================================================
// CLUSTER E: CELL CONTRACT
// =============================================================================

/// Outcome tag of a capability dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Error,
}

/// One named output of a capability dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputValue {
    pub name: String,
    pub value: serde_json::Value,
    #[serde(rename = "type")]
    pub value_type: String,
}

/// Execution cost reported by a cell body with each result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionMetrics {
    pub execution_time_ms: u64,
    pub memory_used_mb: f64,
}

/// Result of one capability dispatch, in the cell contract shape: either
/// `success` with outputs, or `error` with a single string output named
/// `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub status: ResultStatus,
    pub outputs: Vec<OutputValue>,
    #[serde(default)]
    pub performance_metrics: ExecutionMetrics,
}

impl CapabilityResult {
    pub fn success(outputs: Vec<OutputValue>, performance_metrics: ExecutionMetrics) -> Self {
        Self {
            status: ResultStatus::Success,
            outputs,
            performance_metrics,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Error,
            outputs: vec![OutputValue {
                name: "error".to_string(),
                value: serde_json::Value::String(message.into()),
                value_type: "string".to_string(),
            }],
            performance_metrics: ExecutionMetrics::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_id_capability_prefix() {
        let id = Cell::mint_id("text_generation");
        assert_eq!(Cell::capability_of_id(&id), Some("text_generation"));
        assert!(Cell::capability_of_id("short").is_none());
    }

    #[test]
    fn test_resource_snapshot_percentages() {
        let snapshot = ResourceSnapshot {
            memory_total_mb: 8192,
            memory_available_mb: 6144,
            cpu_total_percent: 800,
            cpu_available_percent: 800,
            storage_total_mb: 0,
            storage_available_mb: 0,
            active_allocations: 1,
        };
        assert!((snapshot.memory_usage_percent() - 25.0).abs() < 1e-9);
        assert!((snapshot.cpu_usage_percent() - 0.0).abs() < 1e-9);
        assert_eq!(snapshot.storage_usage_percent(), 0.0);
    }

    #[test]
    fn test_solution_round_trip() {
        let cell = Cell {
            cell_id: Cell::mint_id("file_system"),
            cell_type: "system.file_system".to_string(),
            capability: "file_system".to_string(),
            version: "1.0.0".to_string(),
            provider_url: "https://provider.example".to_string(),
            quantum_signature: "qc-test-signature".to_string(),
            status: CellState::Active,
            created_at: Utc::now(),
            parameters: CellParameters::default(),
            allocation: Some(ResourceAllocation {
                memory_mb: 256,
                cpu_percent: 50,
                storage_mb: 100,
            }),
        };
        let solution = Solution {
            solution_id: Uuid::new_v4(),
            quantum_signature: "qc-test-signature".to_string(),
            cells: BTreeMap::from([(cell.cell_id.clone(), cell)]),
            connection_map: BTreeMap::new(),
            intent: IntentAnalysis {
                original_request: "list files".to_string(),
                normalized_request: "list files".to_string(),
                required_capabilities: vec![],
                suggested_connections: BTreeMap::new(),
                analyzed_at: Utc::now(),
                context_used: false,
                confidence_score: 0.9,
                use_previous_configurations: true,
            },
            status: SolutionStatus::Active,
            created_at: Utc::now(),
            metrics: PerformanceMetrics::default(),
            used_prior_configuration: false,
        };

        let json = serde_json::to_string(&solution).unwrap();
        let back: Solution = serde_json::from_str(&json).unwrap();
        assert_eq!(solution, back);
    }

    #[test]
    fn test_error_result_shape() {
        let result = CapabilityResult::error("no such file");
        assert_eq!(result.status, ResultStatus::Error);
        assert_eq!(result.outputs.len(), 1);
        assert_eq!(result.outputs[0].name, "error");
        assert_eq!(result.outputs[0].value_type, "string");
    }
}
