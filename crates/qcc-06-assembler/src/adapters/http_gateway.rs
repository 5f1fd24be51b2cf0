//! The production gateway: provider RPC over HTTP.
//!
//! Request and download are sequential halves of one acquisition; the
//! returned handle is an RPC proxy bound to the provider's cell id.

use crate::ports::{ProvidedCell, ProviderGateway};
use async_trait::async_trait;
use qcc_04_provider_client::wire::CellAcquisition;
use qcc_04_provider_client::{ProviderClient, ProviderError, RemoteCell};
use shared_types::{AssemblyContext, UsageMetrics};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl ProviderGateway for ProviderClient {
    fn providers(&self) -> Vec<String> {
        ProviderClient::providers(self).to_vec()
    }

    fn is_healthy(&self, provider: &str) -> bool {
        self.health().is_healthy(provider)
    }

    async fn request_cell(
        &self,
        provider: &str,
        acquisition: &CellAcquisition,
        context: &AssemblyContext,
        quantum_signature: &str,
        assembler_id: Uuid,
    ) -> Result<ProvidedCell, ProviderError> {
        let response = ProviderClient::request_cell(
            self,
            provider,
            acquisition,
            context,
            quantum_signature,
            assembler_id,
        )
        .await?;

        // Fetch the package so the provider commits the instance before we
        // wire a handle to it.
        let download = self.download_cell(provider, &response.cell_id).await?;
        debug!(
            provider,
            cell_id = %download.cell_id,
            capability = %response.capability,
            "cell package downloaded"
        );

        Ok(ProvidedCell {
            provider_url: provider.to_string(),
            provider_cell_id: response.cell_id.clone(),
            cell_type: response.cell_type,
            capability: response.capability,
            version: response.version,
            handle: Arc::new(RemoteCell::new(self.http(), provider, response.cell_id)),
        })
    }

    async fn release_cell(
        &self,
        provider: &str,
        provider_cell_id: &str,
        quantum_signature: &str,
        usage_metrics: UsageMetrics,
    ) -> Result<(), ProviderError> {
        ProviderClient::release_cell(
            self,
            provider,
            provider_cell_id,
            quantum_signature,
            usage_metrics,
        )
        .await
        .map(|_| ())
    }
}
