//! Outbound ports consumed by the assembler.

use async_trait::async_trait;
use qcc_03_runtime::CellHandle;
use qcc_04_provider_client::wire::CellAcquisition;
use qcc_04_provider_client::ProviderError;
use shared_types::{AssemblyContext, UsageMetrics};
use std::sync::Arc;
use uuid::Uuid;

/// What a provider hands back for one acquisition: enough to mint the
/// assembler-scoped cell record, plus the contract handle to its body.
pub struct ProvidedCell {
    pub provider_url: String,
    /// The provider's own id for the instance, used for the release RPC.
    pub provider_cell_id: String,
    pub cell_type: String,
    pub capability: String,
    pub version: String,
    pub handle: Arc<dyn CellHandle>,
}

/// The provider boundary: request/release cells, consult health.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Provider endpoints in failover order.
    fn providers(&self) -> Vec<String>;

    /// Whether a provider is outside its unhealthy cooldown.
    fn is_healthy(&self, provider: &str) -> bool;

    /// Request one cell and return its record material and handle.
    async fn request_cell(
        &self,
        provider: &str,
        acquisition: &CellAcquisition,
        context: &AssemblyContext,
        quantum_signature: &str,
        assembler_id: Uuid,
    ) -> Result<ProvidedCell, ProviderError>;

    /// Release a cell back to its provider with final usage metrics.
    async fn release_cell(
        &self,
        provider: &str,
        provider_cell_id: &str,
        quantum_signature: &str,
        usage_metrics: UsageMetrics,
    ) -> Result<(), ProviderError>;
}
