//! Shared wiring for the suite: a full assembler stack on a mock provider
//! gateway, with the ledger on a temporary directory.

use qcc_02_security::{SecurityConfig, SecurityGate, SecurityLevel};
use qcc_03_runtime::{CellRuntime, RuntimeConfig};
use qcc_05_quantum_trail::{QuantumTrail, TrailConfig};
use qcc_06_assembler::{AssemblerConfig, CellAssembler, MockProviderGateway};
use std::sync::Arc;
use tempfile::TempDir;

/// A wired-up orchestrator for one test.
pub struct TestHarness {
    pub assembler: CellAssembler<MockProviderGateway>,
    pub gateway: Arc<MockProviderGateway>,
    pub runtime: Arc<CellRuntime>,
    pub trail: Arc<QuantumTrail>,
    _storage: TempDir,
}

/// Build a harness with the given provider list and security level. The
/// ledger uses difficulty 1 so mining in tests is immediate.
pub async fn harness(providers: &[&str], level: SecurityLevel) -> TestHarness {
    let storage = tempfile::tempdir().expect("ledger tempdir");
    let gate = Arc::new(SecurityGate::new(SecurityConfig { level }));
    let runtime = Arc::new(CellRuntime::new(RuntimeConfig::default()));
    let trail = QuantumTrail::open(TrailConfig {
        storage_path: storage.path().to_path_buf(),
        difficulty: 1,
        ..TrailConfig::default()
    })
    .await
    .expect("open trail");
    let gateway = Arc::new(MockProviderGateway::new(
        providers.iter().map(|p| p.to_string()).collect(),
    ));

    let assembler = CellAssembler::new(
        AssemblerConfig::default(),
        gate,
        runtime.clone(),
        trail.clone(),
        gateway.clone(),
    );

    TestHarness {
        assembler,
        gateway,
        runtime,
        trail,
        _storage: storage,
    }
}
