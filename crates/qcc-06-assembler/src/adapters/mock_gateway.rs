//! A mock provider gateway for tests and local wiring.
//!
//! Serves `LocalCell` echo bodies, shares the real health registry, and can
//! be told to fail specific providers to exercise failover paths.

use crate::ports::{ProvidedCell, ProviderGateway};
use async_trait::async_trait;
use parking_lot::Mutex;
use qcc_03_runtime::LocalCell;
use qcc_04_provider_client::wire::CellAcquisition;
use qcc_04_provider_client::{HealthRegistry, ProviderError};
use shared_types::{AssemblyContext, UsageMetrics};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// In-process gateway serving echo cells.
pub struct MockProviderGateway {
    providers: Vec<String>,
    health: HealthRegistry,
    failing: Mutex<HashSet<String>>,
    /// When set, acquisitions are served round-robin from the provider
    /// pool regardless of which provider was asked, the way a brokered
    /// provider network behaves.
    round_robin: Mutex<Option<usize>>,
    requests_served: AtomicU64,
    releases_served: AtomicU64,
}

impl MockProviderGateway {
    pub fn new(providers: Vec<String>) -> Self {
        Self {
            providers,
            health: HealthRegistry::new(Duration::from_secs(60)),
            failing: Mutex::new(HashSet::new()),
            round_robin: Mutex::new(None),
            requests_served: AtomicU64::new(0),
            releases_served: AtomicU64::new(0),
        }
    }

    /// Serve successive acquisitions from alternating providers.
    pub fn serve_round_robin(&self) {
        *self.round_robin.lock() = Some(0);
    }

    /// Make every request to this provider time out.
    pub fn fail_provider(&self, provider: &str) {
        self.failing.lock().insert(provider.to_string());
    }

    pub fn heal_provider(&self, provider: &str) {
        self.failing.lock().remove(provider);
        self.health.mark_healthy(provider);
    }

    pub fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    pub fn releases_served(&self) -> u64 {
        self.releases_served.load(Ordering::Relaxed)
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }
}

#[async_trait]
impl ProviderGateway for MockProviderGateway {
    fn providers(&self) -> Vec<String> {
        self.providers.clone()
    }

    fn is_healthy(&self, provider: &str) -> bool {
        self.health.is_healthy(provider)
    }

    async fn request_cell(
        &self,
        provider: &str,
        acquisition: &CellAcquisition,
        _context: &AssemblyContext,
        _quantum_signature: &str,
        _assembler_id: Uuid,
    ) -> Result<ProvidedCell, ProviderError> {
        if self.failing.lock().contains(provider) {
            self.health.mark_unhealthy(provider);
            return Err(ProviderError::Timeout {
                provider: provider.to_string(),
                operation: "request_cell",
                timeout_secs: 30,
            });
        }

        let serving_provider = {
            let mut cursor = self.round_robin.lock();
            match cursor.as_mut() {
                Some(next) if !self.providers.is_empty() => {
                    let chosen = self.providers[*next % self.providers.len()].clone();
                    *next += 1;
                    chosen
                }
                _ => provider.to_string(),
            }
        };

        let (capability, cell_type, version) = match acquisition {
            CellAcquisition::ByCapability { capability, .. } => (
                capability.clone(),
                format!("mock.{}", capability),
                "1.0.0".to_string(),
            ),
            CellAcquisition::BySpec {
                cell_type, version, ..
            } => (
                cell_type
                    .strip_prefix("mock.")
                    .unwrap_or(cell_type)
                    .to_string(),
                cell_type.clone(),
                version.clone(),
            ),
        };

        self.requests_served.fetch_add(1, Ordering::Relaxed);
        self.health.mark_healthy(provider);

        Ok(ProvidedCell {
            provider_url: serving_provider,
            provider_cell_id: format!("mock-{}", Uuid::new_v4()),
            cell_type,
            version,
            handle: Arc::new(LocalCell::echo(&capability)),
            capability,
        })
    }

    async fn release_cell(
        &self,
        _provider: &str,
        _provider_cell_id: &str,
        _quantum_signature: &str,
        _usage_metrics: UsageMetrics,
    ) -> Result<(), ProviderError> {
        self.releases_served.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
