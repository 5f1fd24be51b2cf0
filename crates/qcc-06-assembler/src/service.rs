//! Cell Assembler - the orchestration pipeline.

use crate::domain::cache::{CacheConfig, CachedCell, CellCache};
use crate::error::{from_runtime, from_security, from_trail};
use crate::ports::ProviderGateway;
use chrono::Utc;
use parking_lot::Mutex;
use qcc_01_intent::IntentInterpreter;
use qcc_02_security::SecurityGate;
use qcc_03_runtime::CellRuntime;
use qcc_04_provider_client::wire::CellAcquisition;
use qcc_05_quantum_trail::QuantumTrail;
use serde::Deserialize;
use shared_types::{
    AssemblerStatus, AssemblyContext, AssemblyError, CapabilityResult, Cell, CellConfiguration,
    CellParameters, CellState, ConnectionMap, DeviceInfo, IntentAnalysis, PerformanceMetrics,
    RequiredCapability, Solution, SolutionStatus, UsageMetrics,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Assembler configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Anonymous identifier the quantum signature is bound to.
    pub user_id: String,
    pub cache: CacheConfig,
    /// How many prior configurations to consider per assembly.
    pub max_prior_configurations: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            cache: CacheConfig::default(),
            max_prior_configurations: 3,
        }
    }
}

/// One freshly acquired (or cache-reused) cell, before activation.
struct Acquired {
    cell: Cell,
    from_cache: bool,
}

/// The orchestrator. Generic over the provider boundary so tests can run
/// against an in-process gateway.
pub struct CellAssembler<G: ProviderGateway> {
    assembler_id: Uuid,
    config: AssemblerConfig,
    interpreter: IntentInterpreter,
    gate: Arc<SecurityGate>,
    runtime: Arc<CellRuntime>,
    trail: Arc<QuantumTrail>,
    gateway: Arc<G>,
    active_solutions: Mutex<HashMap<Uuid, Solution>>,
    cache: Mutex<CellCache>,
    /// cell_id -> the provider's own id, needed for the release RPC.
    remote_refs: Mutex<HashMap<String, String>>,
    started_at: Instant,
    total_assemblies: AtomicU64,
    total_cells_requested: AtomicU64,
    cache_hits: AtomicU64,
}

impl<G: ProviderGateway> CellAssembler<G> {
    pub fn new(
        config: AssemblerConfig,
        gate: Arc<SecurityGate>,
        runtime: Arc<CellRuntime>,
        trail: Arc<QuantumTrail>,
        gateway: Arc<G>,
    ) -> Self {
        let assembler_id = Uuid::new_v4();
        info!(%assembler_id, user_id = %config.user_id, "cell assembler initialized");
        Self {
            assembler_id,
            cache: Mutex::new(CellCache::new(config.cache.clone())),
            config,
            interpreter: IntentInterpreter::new(),
            gate,
            runtime,
            trail,
            gateway,
            active_solutions: Mutex::new(HashMap::new()),
            remote_refs: Mutex::new(HashMap::new()),
            started_at: Instant::now(),
            total_assemblies: AtomicU64::new(0),
            total_cells_requested: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    pub fn assembler_id(&self) -> Uuid {
        self.assembler_id
    }

    // === ASSEMBLE ===

    /// The full assembly pipeline: interpret, sign, consult the trail,
    /// acquire, verify, wire, activate, record.
    pub async fn assemble_solution(
        &self,
        user_request: &str,
        context: AssemblyContext,
    ) -> Result<Solution, AssemblyError> {
        let started = Instant::now();
        self.total_assemblies.fetch_add(1, Ordering::Relaxed);
        info!(request = user_request, "assembling solution");

        // 1. Context enrichment.
        let context = self.enrich_context(context);
        let device = context.device_info.clone().unwrap_or_default();

        // 2. Intent.
        let intent = self.interpreter.analyze(user_request, &context);
        let mut capabilities = intent.capability_names();
        if capabilities.is_empty() {
            capabilities = vec!["text_generation".to_string()];
        }

        // 3. Fresh quantum signature.
        let user_id = context
            .user_id
            .clone()
            .unwrap_or_else(|| self.config.user_id.clone());
        let quantum_signature = self.gate.generate_signature(&user_id, &intent, &context);

        // 4. Prior configurations.
        let prior = if intent.use_previous_configurations {
            let candidates = self
                .trail
                .find_similar_configurations(&capabilities, self.config.max_prior_configurations);
            select_best_configuration(candidates)
        } else {
            None
        };
        let used_prior_configuration = prior.is_some();
        if let Some(config) = &prior {
            info!(config_id = %config.config_id, score = config.performance_score,
                "reusing prior configuration");
        }

        // 5. Cell acquisition.
        let acquired = match &prior {
            Some(config) => {
                self.acquire_by_configuration(config, &context, &quantum_signature)
                    .await
            }
            None => {
                self.acquire_by_capabilities(&intent, &device, &context, &quantum_signature)
                    .await
            }
        }?;
        if acquired.is_empty() {
            return Err(AssemblyError::CellRequest {
                capability: capabilities.join(","),
                providers_tried: Vec::new(),
            });
        }

        // 6. Security verification. Any failure releases everything
        // acquired so far.
        if let Err(err) = self
            .gate
            .verify_cells(acquired.iter().map(|a| &a.cell), &quantum_signature)
        {
            error!(error = %err, "security verification failed, releasing acquired cells");
            self.abort_cleanup(&acquired).await;
            return Err(from_security(err));
        }
        let permissions = self.gate.derive_permissions(acquired.iter().map(|a| &a.cell));
        debug!(cells = permissions.len(), "permissions derived");

        // 7. Connection installation.
        let hint_map = match &prior {
            Some(config) => config.connection_map.clone(),
            None => intent.suggested_connections.clone(),
        };
        let installed = self.install_connections(&acquired, &hint_map);

        // 8. Activation, reverse cleanup on first failure.
        let mut activated: Vec<&Acquired> = Vec::new();
        for acquisition in &acquired {
            if let Err(err) = self.runtime.activate(&acquisition.cell.cell_id).await {
                error!(cell_id = %acquisition.cell.cell_id, error = %err,
                    "activation failed, unwinding");
                for already in activated.into_iter().rev() {
                    if let Err(err) = self.runtime.deactivate(&already.cell.cell_id).await {
                        warn!(cell_id = %already.cell.cell_id, error = %err,
                            "deactivate during unwind failed");
                    }
                }
                self.abort_cleanup(&acquired).await;
                return Err(from_runtime(err));
            }
            activated.push(acquisition);
        }

        // 9. Record the solution and its ledger transaction.
        let assembly_time_ms = started.elapsed().as_millis() as u64;
        let solution_id = Uuid::new_v4();
        let cells: std::collections::BTreeMap<String, Cell> = acquired
            .iter()
            .map(|a| {
                let cell = self
                    .runtime
                    .cell(&a.cell.cell_id)
                    .unwrap_or_else(|| a.cell.clone());
                (cell.cell_id.clone(), cell)
            })
            .collect();
        let metrics = PerformanceMetrics {
            assembly_time_ms,
            ..PerformanceMetrics::default()
        };
        let solution = Solution {
            solution_id,
            quantum_signature: quantum_signature.clone(),
            cells,
            connection_map: installed.clone(),
            intent,
            status: SolutionStatus::Active,
            created_at: Utc::now(),
            metrics: metrics.clone(),
            used_prior_configuration,
        };

        self.active_solutions
            .lock()
            .insert(solution_id, solution.clone());

        if let Err(err) = self
            .trail
            .record_assembly(
                quantum_signature,
                solution_id,
                solution.cells.keys().cloned().collect(),
                installed,
                metrics.clone(),
            )
            .await
        {
            // The solution is live; a full ledger queue must not undo it.
            error!(error = %from_trail(err), "failed to record assembly in the quantum trail");
        }

        if let Some(config) = &prior {
            let score = self.trail.record_configuration_use(config, &metrics);
            debug!(config_id = %config.config_id, score, "configuration score folded");
        }

        info!(
            %solution_id,
            cells = solution.cells.len(),
            assembly_time_ms,
            used_prior_configuration,
            "solution assembled"
        );
        Ok(solution)
    }

    // === RELEASE ===

    /// Orderly teardown. Unknown solutions return `false`; per-cell errors
    /// are logged and do not abort the release.
    pub async fn release_solution(&self, solution_id: Uuid) -> bool {
        let Some(solution) = self.active_solutions.lock().remove(&solution_id) else {
            warn!(%solution_id, "attempted to release unknown solution");
            return false;
        };
        info!(%solution_id, cells = solution.cells.len(), "releasing solution");

        let usage_time_ms = (Utc::now() - solution.created_at).num_milliseconds().max(0) as u64;

        let mut memory_peak_mb = 0.0f64;
        let mut cpu_peaks: Vec<f64> = Vec::new();

        for (cell_id, cell) in &solution.cells {
            if let Some((_, usage)) = self.runtime.usage(cell_id) {
                memory_peak_mb += usage.memory_peak_mb;
                cpu_peaks.push(usage.cpu_peak_percent);
            }

            if let Err(err) = self.runtime.deactivate(cell_id).await {
                error!(cell_id = %cell_id, error = %err, "error deactivating cell");
                continue;
            }

            let candidate = CachedCell {
                cell: {
                    let mut cached = self
                        .runtime
                        .cell(cell_id)
                        .unwrap_or_else(|| cell.clone());
                    cached.status = CellState::Deactivated;
                    cached
                },
                provider_ref: self.remote_refs.lock().get(cell_id).cloned(),
            };

            let displaced = {
                let mut cache = self.cache.lock();
                if cache.eligible(&cell.capability) {
                    cache.offer(candidate)
                } else {
                    vec![candidate]
                }
            };
            for displaced_cell in displaced {
                self.release_cell_fully(displaced_cell.cell).await;
            }
        }

        let final_metrics = PerformanceMetrics {
            assembly_time_ms: solution.metrics.assembly_time_ms,
            memory_peak_mb,
            cpu_usage_avg: if cpu_peaks.is_empty() {
                0.0
            } else {
                cpu_peaks.iter().sum::<f64>() / cpu_peaks.len() as f64
            },
            total_usage_time_ms: usage_time_ms,
        };

        if let Err(err) = self
            .trail
            .update_assembly(
                solution.quantum_signature.clone(),
                solution_id,
                "released".to_string(),
                final_metrics,
            )
            .await
        {
            error!(error = %from_trail(err), "failed to record release in the quantum trail");
        }

        true
    }

    // === DISPATCH ===

    /// Dispatch a capability on a cell that belongs to an active solution
    /// owned by this assembler.
    pub async fn execute_capability(
        &self,
        cell_id: &str,
        capability: &str,
        parameters: serde_json::Value,
    ) -> Result<CapabilityResult, AssemblyError> {
        let owned = self
            .active_solutions
            .lock()
            .values()
            .any(|solution| solution.cells.contains_key(cell_id));
        if !owned {
            return Err(AssemblyError::UnknownCell(cell_id.to_string()));
        }

        self.runtime
            .execute(cell_id, capability, parameters)
            .await
            .map_err(from_runtime)
    }

    // === STATUS ===

    pub fn status(&self) -> AssemblerStatus {
        AssemblerStatus {
            assembler_id: self.assembler_id,
            uptime_seconds: self.started_at.elapsed().as_secs(),
            active_solutions: self.active_solutions.lock().len(),
            cached_cells: self.cache.lock().len(),
            total_assemblies: self.total_assemblies.load(Ordering::Relaxed),
            total_cells_requested: self.total_cells_requested.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            resources: self.runtime.resource_snapshot(),
        }
    }

    pub fn get_solution(&self, solution_id: Uuid) -> Option<Solution> {
        self.active_solutions.lock().get(&solution_id).cloned()
    }

    pub fn active_solution_ids(&self) -> Vec<Uuid> {
        self.active_solutions.lock().keys().copied().collect()
    }

    // === ACQUISITION ===

    async fn acquire_by_capabilities(
        &self,
        intent: &IntentAnalysis,
        device: &DeviceInfo,
        context: &AssemblyContext,
        quantum_signature: &str,
    ) -> Result<Vec<Acquired>, AssemblyError> {
        let mut acquired: Vec<Acquired> = Vec::new();
        let required: Vec<RequiredCapability> = if intent.required_capabilities.is_empty() {
            vec![RequiredCapability {
                name: "text_generation".to_string(),
                options: Default::default(),
                priority: 1,
                confidence: 0.5,
            }]
        } else {
            intent.required_capabilities.clone()
        };

        for requirement in &required {
            self.total_cells_requested.fetch_add(1, Ordering::Relaxed);

            if let Some(hit) = self.cache.lock().take(&requirement.name, device) {
                if let Ok(cell) = self.reuse_cached(hit, quantum_signature) {
                    info!(cell_id = %cell.cell_id, capability = %requirement.name,
                        "reusing cached cell");
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    acquired.push(Acquired {
                        cell,
                        from_cache: true,
                    });
                    continue;
                }
            }

            let acquisition = CellAcquisition::ByCapability {
                capability: requirement.name.clone(),
                parameters: CellParameters {
                    options: requirement.options.clone(),
                    ..CellParameters::default()
                },
            };
            match self
                .acquire_from_providers(&acquisition, None, context, quantum_signature)
                .await
            {
                Ok(cell) => acquired.push(Acquired {
                    cell,
                    from_cache: false,
                }),
                Err(err) => {
                    // Terminal once every provider is exhausted for a
                    // required capability.
                    self.abort_cleanup(&acquired).await;
                    return Err(err);
                }
            }
        }

        Ok(acquired)
    }

    async fn acquire_by_configuration(
        &self,
        configuration: &CellConfiguration,
        context: &AssemblyContext,
        quantum_signature: &str,
    ) -> Result<Vec<Acquired>, AssemblyError> {
        let mut acquired: Vec<Acquired> = Vec::new();

        for spec in &configuration.cell_specs {
            self.total_cells_requested.fetch_add(1, Ordering::Relaxed);
            let preferred = if spec.provider_url.is_empty() {
                None
            } else {
                Some(spec.provider_url.clone())
            };

            let acquisition = CellAcquisition::BySpec {
                cell_type: spec.cell_type.clone(),
                version: spec.version.clone(),
                parameters: spec.parameters.clone(),
            };
            let result = match self
                .acquire_from_providers(&acquisition, preferred.as_deref(), context, quantum_signature)
                .await
            {
                Ok(cell) => Ok(cell),
                Err(spec_err) => {
                    // Same spec exhausted everywhere; fall back to the bare
                    // capability.
                    warn!(spec = %spec.cell_type, error = %spec_err,
                        "spec acquisition failed, falling back to capability");
                    let fallback = CellAcquisition::ByCapability {
                        capability: spec.capability.clone(),
                        parameters: spec.parameters.clone(),
                    };
                    self.acquire_from_providers(&fallback, None, context, quantum_signature)
                        .await
                }
            };

            match result {
                Ok(cell) => acquired.push(Acquired {
                    cell,
                    from_cache: false,
                }),
                Err(err) => {
                    self.abort_cleanup(&acquired).await;
                    return Err(err);
                }
            }
        }

        Ok(acquired)
    }

    /// Walk the provider list (preferred provider first) and return the
    /// first successful acquisition, registered with the runtime.
    async fn acquire_from_providers(
        &self,
        acquisition: &CellAcquisition,
        preferred: Option<&str>,
        context: &AssemblyContext,
        quantum_signature: &str,
    ) -> Result<Cell, AssemblyError> {
        let mut order: Vec<String> = Vec::new();
        if let Some(preferred) = preferred {
            order.push(preferred.to_string());
        }
        for provider in self.gateway.providers() {
            if !order.contains(&provider) {
                order.push(provider);
            }
        }

        let mut tried: Vec<String> = Vec::new();
        for provider in &order {
            if !self.gateway.is_healthy(provider) {
                debug!(provider = %provider, "skipping unhealthy provider");
                continue;
            }
            tried.push(provider.clone());

            let provided = match self
                .gateway
                .request_cell(
                    provider,
                    acquisition,
                    context,
                    quantum_signature,
                    self.assembler_id,
                )
                .await
            {
                Ok(provided) => provided,
                Err(err) => {
                    warn!(provider = %provider, spec = %acquisition.label(), error = %err,
                        "cell request failed, trying next provider");
                    continue;
                }
            };

            let cell_id = Cell::mint_id(&provided.capability);
            let cell = Cell {
                quantum_signature: self.gate.derive_cell_signature(quantum_signature, &cell_id),
                cell_id: cell_id.clone(),
                cell_type: provided.cell_type,
                capability: provided.capability,
                version: provided.version,
                provider_url: provided.provider_url,
                status: CellState::Initialized,
                created_at: Utc::now(),
                parameters: acquisition.parameters().clone(),
                allocation: None,
            };

            if let Err(err) = self
                .runtime
                .register_cell(cell.clone(), provided.handle)
                .await
            {
                warn!(provider = %provider, error = %err,
                    "registration failed, trying next provider");
                continue;
            }

            self.remote_refs
                .lock()
                .insert(cell_id, provided.provider_cell_id);
            debug!(cell_id = %cell.cell_id, provider = %provider, "cell acquired");
            return Ok(cell);
        }

        Err(AssemblyError::CellRequest {
            capability: acquisition.label(),
            providers_tried: tried,
        })
    }

    /// Bring a cached cell into a new solution: re-stamp its signature
    /// against the new solution signature.
    fn reuse_cached(
        &self,
        hit: CachedCell,
        quantum_signature: &str,
    ) -> Result<Cell, AssemblyError> {
        let mut cell = hit.cell;
        let signature = self
            .gate
            .derive_cell_signature(quantum_signature, &cell.cell_id);
        self.runtime
            .set_quantum_signature(&cell.cell_id, &signature)
            .map_err(from_runtime)?;
        cell.quantum_signature = signature;
        if let Some(provider_ref) = hit.provider_ref {
            self.remote_refs
                .lock()
                .insert(cell.cell_id.clone(), provider_ref);
        }
        Ok(cell)
    }

    /// Install the hinted edges. Hints are keyed by capability; endpoints
    /// missing from the acquired set are logged and skipped, and a policy
    /// denial drops the edge without failing the assembly.
    fn install_connections(
        &self,
        acquired: &[Acquired],
        hints: &ConnectionMap,
    ) -> ConnectionMap {
        let by_capability: HashMap<&str, &Cell> = acquired
            .iter()
            .map(|a| (a.cell.capability.as_str(), &a.cell))
            .collect();

        let mut installed = ConnectionMap::new();
        for (source_capability, targets) in hints {
            let Some(source) = by_capability.get(source_capability.as_str()) else {
                warn!(capability = %source_capability, "cannot connect from missing cell");
                continue;
            };
            for target_capability in targets {
                let Some(target) = by_capability.get(target_capability.as_str()) else {
                    warn!(capability = %target_capability, "cannot connect to missing cell");
                    continue;
                };
                if let Err(err) = self.gate.authorize_connection(source, target) {
                    warn!(error = %err, "connection rejected by security gate");
                    continue;
                }
                if let Err(err) = self.runtime.connect(&source.cell_id, &target.cell_id) {
                    warn!(error = %err, "connection installation failed");
                    continue;
                }
                installed
                    .entry(source.cell_id.clone())
                    .or_default()
                    .push(target.cell_id.clone());
            }
        }
        installed
    }

    // === CLEANUP ===

    /// The one abort path: release every cell acquired so far, newest
    /// first. Connections and resources are reclaimed by the runtime as a
    /// side effect of release.
    async fn abort_cleanup(&self, acquired: &[Acquired]) {
        for acquisition in acquired.iter().rev() {
            self.release_cell_fully(acquisition.cell.clone()).await;
        }
    }

    /// Release one cell for good: runtime teardown plus the provider
    /// release RPC when we still hold a provider reference.
    async fn release_cell_fully(&self, cell: Cell) {
        let usage = self
            .runtime
            .usage(&cell.cell_id)
            .map(|(_, usage)| usage)
            .unwrap_or_else(UsageMetrics::default);

        if let Err(err) = self.runtime.release(&cell.cell_id).await {
            error!(cell_id = %cell.cell_id, error = %err, "runtime release failed");
        }

        let provider_cell_id = self.remote_refs.lock().remove(&cell.cell_id);
        if let Some(provider_cell_id) = provider_cell_id {
            if let Err(err) = self
                .gateway
                .release_cell(
                    &cell.provider_url,
                    &provider_cell_id,
                    &cell.quantum_signature,
                    usage,
                )
                .await
            {
                warn!(cell_id = %cell.cell_id, error = %err, "provider release failed");
            }
        }
    }

    // === INTERNAL ===

    fn enrich_context(&self, mut context: AssemblyContext) -> AssemblyContext {
        context.timestamp = Some(Utc::now());
        if context.device_info.is_none() {
            context.device_info = Some(probe_device());
        }
        context.assembler_id = Some(self.assembler_id);
        if context.user_id.is_none() {
            context.user_id = Some(self.config.user_id.clone());
        }
        context
    }
}

/// Highest score wins; ties break toward the most recently used.
fn select_best_configuration(
    mut candidates: Vec<CellConfiguration>,
) -> Option<CellConfiguration> {
    candidates.sort_by(|a, b| {
        b.performance_score
            .partial_cmp(&a.performance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.last_used_at.cmp(&a.last_used_at))
    });
    candidates.into_iter().next()
}

/// Best-effort probe of the machine the assembler runs on.
fn probe_device() -> DeviceInfo {
    DeviceInfo::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockProviderGateway;
    use qcc_02_security::{SecurityConfig, SecurityLevel};
    use qcc_03_runtime::RuntimeConfig;
    use qcc_05_quantum_trail::TrailConfig;

    async fn assembler_with(
        providers: Vec<&str>,
        level: SecurityLevel,
        dir: &tempfile::TempDir,
    ) -> (CellAssembler<MockProviderGateway>, Arc<MockProviderGateway>) {
        let gate = Arc::new(SecurityGate::new(SecurityConfig { level }));
        let runtime = Arc::new(CellRuntime::new(RuntimeConfig::default()));
        let trail = QuantumTrail::open(TrailConfig {
            storage_path: dir.path().to_path_buf(),
            difficulty: 1,
            ..TrailConfig::default()
        })
        .await
        .expect("trail");
        let gateway = Arc::new(MockProviderGateway::new(
            providers.into_iter().map(String::from).collect(),
        ));
        let assembler = CellAssembler::new(
            AssemblerConfig::default(),
            gate,
            runtime,
            trail,
            gateway.clone(),
        );
        (assembler, gateway)
    }

    #[tokio::test]
    async fn test_assemble_document_solution() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (assembler, _) =
            assembler_with(vec!["https://p1"], SecurityLevel::Standard, &dir).await;

        let solution = assembler
            .assemble_solution("Create a new document", AssemblyContext::default())
            .await
            .expect("assemble");

        assert_eq!(solution.status, SolutionStatus::Active);
        assert_eq!(solution.cells.len(), 2);
        assert_eq!(
            solution.intent.capability_names(),
            vec!["text_generation", "file_system"]
        );
        for cell in solution.cells.values() {
            assert_eq!(
                &cell.quantum_signature[..10],
                &solution.quantum_signature[..10],
                "member signature must share the solution prefix"
            );
            assert_eq!(cell.status, CellState::Active);
        }
        assert_eq!(assembler.trail.pending_len(), 1, "ledger grew by one");
    }

    #[tokio::test]
    async fn test_empty_provider_list_fails_with_cell_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (assembler, _) = assembler_with(vec![], SecurityLevel::Standard, &dir).await;

        let err = assembler
            .assemble_solution("Create a new document", AssemblyContext::default())
            .await
            .expect_err("no providers");
        match err {
            AssemblyError::CellRequest { providers_tried, .. } => {
                assert!(providers_tried.is_empty());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_failover_to_healthy_provider() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (assembler, gateway) =
            assembler_with(vec!["https://a", "https://b"], SecurityLevel::Standard, &dir).await;
        gateway.fail_provider("https://a");

        let solution = assembler
            .assemble_solution("Create a new document", AssemblyContext::default())
            .await
            .expect("assemble via failover");

        assert!(solution
            .cells
            .values()
            .all(|cell| cell.provider_url == "https://b"));
        assert!(!gateway.is_healthy("https://a"), "a is cooling down");
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_reports_false() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (assembler, _) =
            assembler_with(vec!["https://p1"], SecurityLevel::Standard, &dir).await;

        let solution = assembler
            .assemble_solution("Create a new document", AssemblyContext::default())
            .await
            .expect("assemble");

        assert!(assembler.release_solution(solution.solution_id).await);
        assert!(!assembler.release_solution(solution.solution_id).await);
    }

    #[tokio::test]
    async fn test_release_clears_all_connections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (assembler, _) =
            assembler_with(vec!["https://p1"], SecurityLevel::Standard, &dir).await;

        let solution = assembler
            .assemble_solution("Create a new document", AssemblyContext::default())
            .await
            .expect("assemble");
        let cell_ids: Vec<String> = solution.cells.keys().cloned().collect();

        assembler.release_solution(solution.solution_id).await;
        for cell_id in &cell_ids {
            assert!(
                assembler.runtime.get_connections(cell_id).is_empty(),
                "released solution must leave no edges"
            );
        }
    }

    #[tokio::test]
    async fn test_core_capability_cells_are_cached_and_reused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (assembler, gateway) =
            assembler_with(vec!["https://p1"], SecurityLevel::Standard, &dir).await;

        let first = assembler
            .assemble_solution("Create a new document", AssemblyContext::default())
            .await
            .expect("assemble");
        assembler.release_solution(first.solution_id).await;
        assert_eq!(assembler.status().cached_cells, 2);
        let requests_before = gateway.requests_served();

        // A request whose capability set overlaps the cache but is not
        // similar enough for the prior-configuration path (similarity is
        // exactly 0.5, below the strict threshold).
        let second = assembler
            .assemble_solution("please help", AssemblyContext::default())
            .await
            .expect("assemble again");
        assert!(!second.used_prior_configuration);
        assert_eq!(
            second.intent.capability_names(),
            vec!["text_generation", "ui_rendering"]
        );

        // text_generation came from the cache; ui_rendering from the
        // provider.
        assert_eq!(assembler.status().cache_hits, 1);
        assert_eq!(gateway.requests_served(), requests_before + 1);
        for cell in second.cells.values() {
            assert_eq!(
                &cell.quantum_signature[..10],
                &second.quantum_signature[..10],
                "cached cell must be re-stamped"
            );
        }
    }

    #[tokio::test]
    async fn test_second_assembly_reuses_prior_configuration() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (assembler, _) =
            assembler_with(vec!["https://p1"], SecurityLevel::Standard, &dir).await;

        let first = assembler
            .assemble_solution("Create a document", AssemblyContext::default())
            .await
            .expect("first");
        assert!(!first.used_prior_configuration);

        let second = assembler
            .assemble_solution("Create another document", AssemblyContext::default())
            .await
            .expect("second");
        assert!(
            second.used_prior_configuration,
            "similar prior configuration must be picked up"
        );
    }

    #[tokio::test]
    async fn test_maximum_level_allows_same_provider_edges() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (assembler, _) =
            assembler_with(vec!["https://p1"], SecurityLevel::Maximum, &dir).await;

        // Single provider: edges stay same-provider, so this assembles.
        let solution = assembler
            .assemble_solution("Create a new document", AssemblyContext::default())
            .await
            .expect("assemble");
        // text_generation -> file_system is in the allowed map and both
        // cells share the provider, so exactly one edge installs.
        assert_eq!(solution.connection_map.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_capability_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (assembler, _) =
            assembler_with(vec!["https://p1"], SecurityLevel::Standard, &dir).await;

        let solution = assembler
            .assemble_solution("Create a new document", AssemblyContext::default())
            .await
            .expect("assemble");
        let (cell_id, cell) = solution
            .cells
            .iter()
            .find(|(_, c)| c.capability == "text_generation")
            .expect("text cell");

        let result = assembler
            .execute_capability(
                cell_id,
                &cell.capability,
                serde_json::json!({"prompt": "hello"}),
            )
            .await
            .expect("dispatch");
        assert!(result.is_success());

        let err = assembler
            .execute_capability("unknown-cell", "text_generation", serde_json::json!({}))
            .await
            .expect_err("unknown cell");
        assert!(matches!(err, AssemblyError::UnknownCell(_)));
    }

    #[tokio::test]
    async fn test_status_counters() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (assembler, _) =
            assembler_with(vec!["https://p1"], SecurityLevel::Standard, &dir).await;

        let solution = assembler
            .assemble_solution("Create a new document", AssemblyContext::default())
            .await
            .expect("assemble");

        let status = assembler.status();
        assert_eq!(status.active_solutions, 1);
        assert_eq!(status.total_assemblies, 1);
        assert_eq!(status.total_cells_requested, 2);
        assert!(status.resources.active_allocations >= 2);

        assembler.release_solution(solution.solution_id).await;
        assert_eq!(assembler.status().active_solutions, 0);
    }
}
