//! Quantum Trail service - pending queue, mining loop, retrieval.

use crate::adapters::ChainStore;
use crate::domain::block::TrailBlock;
use crate::domain::chain::{adjusted_difficulty, TrailChain};
use crate::domain::keys::TrailSigner;
use crate::domain::scoring::{score_metrics, updated_score};
use crate::domain::similarity;
use crate::domain::transaction::{RecordKind, TrailTransaction};
use crate::error::TrailError;
use parking_lot::Mutex;
use serde::Deserialize;
use shared_types::{CellConfiguration, ConnectionMap, PerformanceMetrics};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Ledger configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    pub storage_path: PathBuf,
    pub difficulty: u32,
    pub block_capacity: usize,
    pub block_time_target_seconds: u64,
    pub max_transaction_wait_seconds: u64,
    pub difficulty_adjustment_interval: u64,
    /// Pending queue bound, as a multiple of `block_capacity`.
    pub pending_limit_factor: usize,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./quantum-trail"),
            difficulty: 4,
            block_capacity: 100,
            block_time_target_seconds: 60,
            max_transaction_wait_seconds: 300,
            difficulty_adjustment_interval: 10,
            pending_limit_factor: 10,
        }
    }
}

/// A configuration's identity for reuse scoring: the sorted capability set
/// plus its connection map. Reconstruction mints fresh `config_id`s, so the
/// shape is the stable key.
fn configuration_key(configuration: &CellConfiguration) -> String {
    let mut capabilities: Vec<&str> = configuration
        .cell_specs
        .iter()
        .map(|spec| spec.capability.as_str())
        .collect();
    capabilities.sort_unstable();
    format!(
        "{}|{}",
        capabilities.join(","),
        serde_json::to_string(&configuration.connection_map).unwrap_or_default()
    )
}

/// Point-in-time ledger statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailStats {
    pub blocks: usize,
    pub transactions: usize,
    pub pending: usize,
    pub difficulty: u32,
    pub average_mine_time_secs: Option<f64>,
}

struct PendingEntry {
    tx: TrailTransaction,
    enqueued_at: Instant,
}

/// Running reuse score of one recurring configuration shape.
#[derive(Debug, Clone, Copy)]
struct ConfigUsage {
    average: f64,
    use_count: u32,
}

struct TrailState {
    chain: TrailChain,
    pending: VecDeque<PendingEntry>,
    difficulty: u32,
    mine_times: VecDeque<f64>,
    blocks_since_adjustment: u64,
}

/// The ledger. One instance owns one chain; clone the `Arc` to share.
pub struct QuantumTrail {
    config: TrailConfig,
    signer: TrailSigner,
    store: ChainStore,
    state: Mutex<TrailState>,
    /// Reuse scores keyed by configuration shape, folded on every reuse.
    config_scores: Mutex<HashMap<String, ConfigUsage>>,
    /// Serializes disk writes so snapshots land in order.
    io_gate: tokio::sync::Mutex<()>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl QuantumTrail {
    /// Open (or create) the ledger at the configured storage path. A
    /// persisted chain that fails validation is discarded and replaced by a
    /// fresh genesis block.
    pub async fn open(config: TrailConfig) -> Result<Arc<Self>, TrailError> {
        let store = ChainStore::new(config.storage_path.clone());
        store.ensure_dir().await?;
        let signer = store.load_or_generate_signer().await?;

        let chain = match store.load_chain().await {
            Ok(Some(blocks)) => {
                let candidate = TrailChain::from_blocks(blocks);
                match candidate.validate(&signer.verifying_key()) {
                    Ok(()) => {
                        info!(blocks = candidate.len(), "loaded persisted chain");
                        candidate
                    }
                    Err(err) => {
                        warn!(%err, "persisted chain invalid, starting a new genesis");
                        TrailChain::new(config.difficulty)
                    }
                }
            }
            Ok(None) => TrailChain::new(config.difficulty),
            Err(err) => {
                warn!(%err, "persisted chain unreadable, starting a new genesis");
                TrailChain::new(config.difficulty)
            }
        };

        let pending: VecDeque<PendingEntry> = match store.load_pending().await {
            Ok(Some(transactions)) => transactions
                .into_iter()
                .filter(|tx| {
                    let valid = tx.verify(&signer.verifying_key());
                    if !valid {
                        warn!(tx_id = %tx.tx_id, "dropping invalid pending transaction");
                    }
                    valid
                })
                .map(|tx| PendingEntry {
                    tx,
                    enqueued_at: Instant::now(),
                })
                .collect(),
            Ok(None) => VecDeque::new(),
            Err(err) => {
                warn!(%err, "pending queue unreadable, starting empty");
                VecDeque::new()
            }
        };

        let difficulty = chain.tail().difficulty.max(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let trail = Arc::new(Self {
            config,
            signer,
            store,
            state: Mutex::new(TrailState {
                chain,
                pending,
                difficulty,
                mine_times: VecDeque::new(),
                blocks_since_adjustment: 0,
            }),
            config_scores: Mutex::new(HashMap::new()),
            io_gate: tokio::sync::Mutex::new(()),
            shutdown_tx,
            shutdown_rx,
        });

        trail.persist_chain().await?;
        Ok(trail)
    }

    // === APPEND ===

    /// Record a successful assembly.
    pub async fn record_assembly(
        &self,
        quantum_signature: String,
        solution_id: Uuid,
        cell_ids: Vec<String>,
        connection_map: ConnectionMap,
        performance_metrics: PerformanceMetrics,
    ) -> Result<Uuid, TrailError> {
        self.add_transaction(
            RecordKind::Assembly,
            quantum_signature,
            solution_id,
            cell_ids,
            connection_map,
            performance_metrics,
            None,
        )
        .await
    }

    /// Record a solution update (release, suspension, ...).
    pub async fn update_assembly(
        &self,
        quantum_signature: String,
        solution_id: Uuid,
        status: String,
        performance_metrics: PerformanceMetrics,
    ) -> Result<Uuid, TrailError> {
        self.add_transaction(
            RecordKind::Update,
            quantum_signature,
            solution_id,
            Vec::new(),
            ConnectionMap::new(),
            performance_metrics,
            Some(status),
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn add_transaction(
        &self,
        record_kind: RecordKind,
        quantum_signature: String,
        solution_id: Uuid,
        cell_ids: Vec<String>,
        connection_map: ConnectionMap,
        performance_metrics: PerformanceMetrics,
        status: Option<String>,
    ) -> Result<Uuid, TrailError> {
        let tx = TrailTransaction::create(
            record_kind,
            quantum_signature,
            solution_id,
            cell_ids,
            connection_map,
            performance_metrics,
            status,
            &self.signer,
        )?;
        let tx_id = tx.tx_id;

        {
            let mut state = self.state.lock();
            let limit = self.config.block_capacity * self.config.pending_limit_factor;
            if state.pending.len() >= limit {
                return Err(TrailError::BackPressure {
                    pending: state.pending.len(),
                    limit,
                });
            }
            state.pending.push_back(PendingEntry {
                tx,
                enqueued_at: Instant::now(),
            });
        }

        self.persist_pending().await?;
        debug!(%tx_id, ?record_kind, "transaction queued");
        Ok(tx_id)
    }

    // === MINING ===

    /// Spawn the long-lived mining task. It mines when the pending count
    /// reaches `block_capacity` or the oldest pending transaction has waited
    /// past `max_transaction_wait_seconds`, and flushes once on shutdown.
    pub fn spawn_miner(self: &Arc<Self>) -> JoinHandle<()> {
        let trail = Arc::clone(self);
        let mut shutdown = self.shutdown_rx.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(500));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if trail.should_mine() {
                            if let Err(err) = trail.mine_once().await {
                                // Mining failures are retried on the next tick.
                                error!(%err, "mining attempt failed");
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("mining loop shutting down, flushing pending transactions");
                        while trail.pending_len() > 0 {
                            if let Err(err) = trail.mine_once().await {
                                error!(%err, "final flush failed");
                                break;
                            }
                        }
                        return;
                    }
                }
            }
        })
    }

    /// Signal the mining loop to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn should_mine(&self) -> bool {
        let state = self.state.lock();
        if state.pending.is_empty() {
            return false;
        }
        if state.pending.len() >= self.config.block_capacity {
            return true;
        }
        state
            .pending
            .front()
            .is_some_and(|oldest| {
                oldest.enqueued_at.elapsed()
                    >= Duration::from_secs(self.config.max_transaction_wait_seconds)
            })
    }

    /// Mine one block from the pending queue, if any work is waiting.
    /// Yields every 10 000 nonce attempts so concurrent operations make
    /// progress.
    pub async fn mine_once(&self) -> Result<Option<TrailBlock>, TrailError> {
        let (transactions, index, previous_hash, difficulty) = {
            let mut state = self.state.lock();
            if state.pending.is_empty() {
                return Ok(None);
            }
            let take = state.pending.len().min(self.config.block_capacity);
            let transactions: Vec<TrailTransaction> =
                state.pending.drain(..take).map(|entry| entry.tx).collect();
            let tail = state.chain.tail();
            (
                transactions,
                tail.index + 1,
                tail.hash.clone(),
                state.difficulty,
            )
        };

        // Poisoned transactions are dropped, never retried.
        let (valid, poisoned): (Vec<_>, Vec<_>) = transactions
            .into_iter()
            .partition(|tx| tx.verify(&self.signer.verifying_key()));
        for tx in &poisoned {
            error!(tx_id = %tx.tx_id, "poisoned transaction dropped from block");
        }
        if valid.is_empty() {
            self.persist_pending().await?;
            return Ok(None);
        }

        let started = Instant::now();
        let mut block = TrailBlock::candidate(index, valid, previous_hash, difficulty);
        let mut attempts: u64 = 0;
        while !TrailBlock::meets_difficulty(&block.hash, difficulty) {
            block.nonce += 1;
            block.hash = block.compute_hash();
            attempts += 1;
            if attempts % 10_000 == 0 {
                tokio::task::yield_now().await;
            }
        }
        let elapsed = started.elapsed().as_secs_f64();

        {
            let mut state = self.state.lock();
            if let Err(err) = state.chain.append(block.clone(), &self.signer.verifying_key()) {
                // Put the work back so the next attempt can retry it.
                for tx in block.transactions.into_iter().rev() {
                    state.pending.push_front(PendingEntry {
                        tx,
                        enqueued_at: Instant::now(),
                    });
                }
                return Err(err);
            }
            self.record_mine_time(&mut state, elapsed);
        }

        self.persist_chain().await?;
        self.persist_pending().await?;

        info!(
            index,
            transactions = block.transactions.len(),
            nonce = block.nonce,
            elapsed_secs = elapsed,
            "block mined"
        );
        Ok(Some(block))
    }

    fn record_mine_time(&self, state: &mut TrailState, elapsed: f64) {
        let window = self.config.difficulty_adjustment_interval as usize;
        state.mine_times.push_back(elapsed);
        while state.mine_times.len() > window {
            state.mine_times.pop_front();
        }
        state.blocks_since_adjustment += 1;

        if state.blocks_since_adjustment >= self.config.difficulty_adjustment_interval {
            let average =
                state.mine_times.iter().sum::<f64>() / state.mine_times.len() as f64;
            let next = adjusted_difficulty(
                state.difficulty,
                average,
                self.config.block_time_target_seconds,
            );
            if next != state.difficulty {
                info!(
                    from = state.difficulty,
                    to = next,
                    average_secs = average,
                    "difficulty adjusted"
                );
                state.difficulty = next;
            }
            state.blocks_since_adjustment = 0;
        }
    }

    // === RETRIEVAL ===

    /// Find up to `max_results` configurations similar to a capability
    /// list. Pending transactions are searched first (they are the newest),
    /// then the chain, newest block first.
    pub fn find_similar_configurations(
        &self,
        capabilities: &[String],
        max_results: usize,
    ) -> Vec<CellConfiguration> {
        let mut results = {
            let state = self.state.lock();
            let all: Vec<&TrailTransaction> = state
                .pending
                .iter()
                .rev()
                .map(|entry| &entry.tx)
                .chain(state.chain.transactions_newest_first())
                .collect();
            similarity::find_similar(&all, capabilities, max_results)
        };

        // Configurations that have been reused carry their folded score
        // instead of the single-observation one.
        let scores = self.config_scores.lock();
        for configuration in &mut results {
            if let Some(usage) = scores.get(&configuration_key(configuration)) {
                configuration.performance_score = usage.average;
                configuration.use_count = usage.use_count;
            }
        }
        results
    }

    /// Fold one reuse observation into a configuration's running score.
    /// The first use sets the score; later uses take the weighted average.
    pub fn record_configuration_use(
        &self,
        configuration: &CellConfiguration,
        observed: &PerformanceMetrics,
    ) -> f64 {
        let new_score = score_metrics(observed);
        let mut scores = self.config_scores.lock();
        let usage = scores
            .entry(configuration_key(configuration))
            .or_insert(ConfigUsage {
                average: 0.0,
                use_count: 0,
            });
        usage.use_count += 1;
        usage.average = updated_score(usage.average, new_score, usage.use_count);
        debug!(
            score = usage.average,
            use_count = usage.use_count,
            "configuration reuse recorded"
        );
        usage.average
    }

    /// Full-chain validation against the ledger's verifying key.
    pub fn validate(&self) -> Result<(), TrailError> {
        self.state.lock().chain.validate(&self.signer.verifying_key())
    }

    pub fn stats(&self) -> TrailStats {
        let state = self.state.lock();
        let average = if state.mine_times.is_empty() {
            None
        } else {
            Some(state.mine_times.iter().sum::<f64>() / state.mine_times.len() as f64)
        };
        TrailStats {
            blocks: state.chain.len(),
            transactions: state.chain.transaction_count(),
            pending: state.pending.len(),
            difficulty: state.difficulty,
            average_mine_time_secs: average,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn chain_len(&self) -> usize {
        self.state.lock().chain.len()
    }

    // === PERSISTENCE ===

    async fn persist_chain(&self) -> Result<(), TrailError> {
        let _io = self.io_gate.lock().await;
        let blocks: Vec<TrailBlock> = self.state.lock().chain.blocks().to_vec();
        self.store.save_chain(&blocks).await
    }

    async fn persist_pending(&self) -> Result<(), TrailError> {
        let _io = self.io_gate.lock().await;
        let pending: Vec<TrailTransaction> = self
            .state
            .lock()
            .pending
            .iter()
            .map(|entry| entry.tx.clone())
            .collect();
        self.store.save_pending(&pending).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Cell;
    use std::collections::BTreeMap;

    fn config(dir: &tempfile::TempDir, difficulty: u32) -> TrailConfig {
        TrailConfig {
            storage_path: dir.path().to_path_buf(),
            difficulty,
            block_capacity: 10,
            ..TrailConfig::default()
        }
    }

    async fn record(trail: &QuantumTrail, capabilities: &[&str]) -> Uuid {
        let cell_ids: Vec<String> = capabilities.iter().map(|c| Cell::mint_id(c)).collect();
        let solution_id = Uuid::new_v4();
        trail
            .record_assembly(
                "qc-signature".to_string(),
                solution_id,
                cell_ids,
                BTreeMap::new(),
                PerformanceMetrics {
                    assembly_time_ms: 42,
                    ..PerformanceMetrics::default()
                },
            )
            .await
            .expect("record");
        solution_id
    }

    #[tokio::test]
    async fn test_open_creates_genesis() {
        let dir = tempfile::tempdir().expect("tempdir");
        let trail = QuantumTrail::open(config(&dir, 1)).await.expect("open");
        assert_eq!(trail.chain_len(), 1);
        trail.validate().expect("fresh chain valid");
    }

    #[tokio::test]
    async fn test_mine_commits_pending() {
        let dir = tempfile::tempdir().expect("tempdir");
        let trail = QuantumTrail::open(config(&dir, 1)).await.expect("open");

        record(&trail, &["text_generation", "file_system"]).await;
        assert_eq!(trail.pending_len(), 1);

        let block = trail.mine_once().await.expect("mine").expect("block");
        assert_eq!(block.index, 1);
        assert_eq!(trail.pending_len(), 0);
        assert_eq!(trail.stats().transactions, 1);
        trail.validate().expect("valid after mine");
    }

    #[tokio::test]
    async fn test_pending_transactions_are_searchable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let trail = QuantumTrail::open(config(&dir, 1)).await.expect("open");

        record(&trail, &["text_generation", "file_system"]).await;

        let results = trail.find_similar_configurations(
            &["text_generation".to_string(), "file_system".to_string()],
            3,
        );
        assert_eq!(results.len(), 1, "pending record must be retrievable");
    }

    #[tokio::test]
    async fn test_chain_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let trail = QuantumTrail::open(config(&dir, 1)).await.expect("open");
            record(&trail, &["text_generation"]).await;
            trail.mine_once().await.expect("mine");
        }

        let reopened = QuantumTrail::open(config(&dir, 1)).await.expect("reopen");
        assert_eq!(reopened.chain_len(), 2);
        reopened.validate().expect("still valid");
    }

    #[tokio::test]
    async fn test_tampered_chain_discarded_on_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let trail = QuantumTrail::open(config(&dir, 1)).await.expect("open");
            record(&trail, &["text_generation"]).await;
            trail.mine_once().await.expect("mine");
        }

        // Flip a hash on disk.
        let chain_path = dir.path().join("chain.json");
        let raw = std::fs::read_to_string(&chain_path).expect("read");
        let mut blocks: Vec<TrailBlock> = serde_json::from_str(&raw).expect("parse");
        blocks[1].hash = format!("beef{}", &blocks[1].hash[4..]);
        std::fs::write(&chain_path, serde_json::to_vec(&blocks).expect("ser")).expect("write");

        let reopened = QuantumTrail::open(config(&dir, 1)).await.expect("reopen");
        assert_eq!(reopened.chain_len(), 1, "tampered chain must be discarded");
    }

    #[tokio::test]
    async fn test_reuse_folds_configuration_score() {
        let dir = tempfile::tempdir().expect("tempdir");
        let trail = QuantumTrail::open(config(&dir, 1)).await.expect("open");

        record(&trail, &["text_generation", "file_system"]).await;
        let requested = vec!["text_generation".to_string(), "file_system".to_string()];
        let first = trail
            .find_similar_configurations(&requested, 3)
            .pop()
            .expect("one candidate");

        // First use sets the score outright.
        let slow = PerformanceMetrics {
            assembly_time_ms: 1000, // 20 point penalty
            ..PerformanceMetrics::default()
        };
        assert_eq!(trail.record_configuration_use(&first, &slow), 80.0);

        // The second use is a weighted average, and retrieval reports it.
        let fast = PerformanceMetrics::default();
        let folded = trail.record_configuration_use(&first, &fast);
        assert!((folded - (80.0 * 0.8 + 100.0 * 0.4) / 2.0).abs() < 1e-9);

        let again = trail
            .find_similar_configurations(&requested, 3)
            .pop()
            .expect("still retrievable");
        assert_eq!(again.performance_score, folded);
        assert_eq!(again.use_count, 2);
    }

    #[tokio::test]
    async fn test_back_pressure_bound() {
        let dir = tempfile::tempdir().expect("tempdir");
        let trail = QuantumTrail::open(TrailConfig {
            storage_path: dir.path().to_path_buf(),
            difficulty: 1,
            block_capacity: 1,
            pending_limit_factor: 2,
            ..TrailConfig::default()
        })
        .await
        .expect("open");

        record(&trail, &["text_generation"]).await;
        record(&trail, &["text_generation"]).await;

        let err = trail
            .record_assembly(
                "qc-signature".to_string(),
                Uuid::new_v4(),
                vec![Cell::mint_id("text_generation")],
                BTreeMap::new(),
                PerformanceMetrics::default(),
            )
            .await
            .expect_err("queue full");
        assert!(matches!(err, TrailError::BackPressure { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending() {
        let dir = tempfile::tempdir().expect("tempdir");
        let trail = QuantumTrail::open(config(&dir, 1)).await.expect("open");
        let miner = trail.spawn_miner();

        record(&trail, &["text_generation"]).await;
        trail.shutdown();
        miner.await.expect("join");

        assert_eq!(trail.pending_len(), 0);
        assert_eq!(trail.chain_len(), 2);
    }
}
