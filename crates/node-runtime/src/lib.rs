//! # QCC Node Runtime
//!
//! Configuration loading and subsystem wiring for the orchestrator node.
//! The binary half initializes logging, builds a [`Node`], and runs until
//! interrupted; this library half is what integration tests wire against.

use anyhow::Context;
use qcc_02_security::{SecurityConfig, SecurityGate};
use qcc_03_runtime::{CellRuntime, RuntimeConfig};
use qcc_04_provider_client::{ProviderClient, ProviderConfig};
use qcc_05_quantum_trail::{QuantumTrail, TrailConfig};
use qcc_06_assembler::{AssemblerConfig, CacheConfig, CellAssembler};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Node configuration, loadable from a JSON file. Every section falls back
/// to its subsystem default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub security: SecurityConfig,
    pub providers: ProviderConfig,
    pub cache: CacheConfig,
    pub ledger: TrailConfig,
    pub resources: RuntimeConfig,
    pub user_id: Option<String>,
}

impl NodeConfig {
    /// Load from a JSON file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}

/// A fully wired orchestrator node.
pub struct Node {
    pub assembler: Arc<CellAssembler<ProviderClient>>,
    pub trail: Arc<QuantumTrail>,
    miner: JoinHandle<()>,
}

impl Node {
    /// Build every subsystem and start the ledger mining task.
    pub async fn start(config: NodeConfig) -> anyhow::Result<Self> {
        let gate = Arc::new(SecurityGate::new(config.security));
        let runtime = Arc::new(CellRuntime::new(config.resources));
        let trail = QuantumTrail::open(config.ledger)
            .await
            .context("opening quantum trail")?;
        let gateway = Arc::new(
            ProviderClient::new(config.providers).context("building provider client")?,
        );

        let assembler_config = AssemblerConfig {
            user_id: config.user_id.unwrap_or_else(|| "anonymous".to_string()),
            cache: config.cache,
            ..AssemblerConfig::default()
        };
        let assembler = Arc::new(CellAssembler::new(
            assembler_config,
            gate,
            runtime,
            trail.clone(),
            gateway,
        ));

        let miner = trail.spawn_miner();
        info!(assembler_id = %assembler.assembler_id(), "node started");

        Ok(Self {
            assembler,
            trail,
            miner,
        })
    }

    /// Release every active solution, flush the ledger, and stop.
    pub async fn shutdown(self) {
        info!("node shutting down");
        for solution_id in self.assembler.active_solution_ids() {
            if !self.assembler.release_solution(solution_id).await {
                warn!(%solution_id, "solution vanished during shutdown");
            }
        }

        self.trail.shutdown();
        if let Err(err) = self.miner.await {
            warn!(error = %err, "mining task did not stop cleanly");
        }
        info!("node stopped");
    }
}
