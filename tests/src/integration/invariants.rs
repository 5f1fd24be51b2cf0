//! Property suites for the system invariants.

use proptest::prelude::*;
use qcc_02_security::domain::signature;
use qcc_03_runtime::domain::lifecycle::{apply, LifecycleAction};
use qcc_03_runtime::domain::resources::{default_requirements, ResourceTable};
use qcc_05_quantum_trail::domain::keys::TrailSigner;
use qcc_05_quantum_trail::domain::scoring::{score_metrics, updated_score};
use qcc_05_quantum_trail::domain::transaction::{RecordKind, TrailTransaction};
use qcc_05_quantum_trail::{TrailBlock, TrailChain};
use qcc_01_intent::IntentInterpreter;
use shared_types::{AssemblyContext, CellState, PerformanceMetrics, ResourceAllocation};
use std::collections::BTreeMap;
use std::collections::HashMap;
use uuid::Uuid;

// === Signatures ===

proptest! {
    #[test]
    fn prop_generated_signatures_are_well_formed(
        material in proptest::collection::vec(any::<u8>(), 0..256),
        entropy in any::<[u8; 16]>(),
    ) {
        let sig = signature::generate(&material, &entropy);
        prop_assert!(sig.len() >= signature::MIN_SIGNATURE_LEN);
        prop_assert!(signature::verify_well_formed(&sig).is_ok());
    }

    #[test]
    fn prop_derived_cell_signatures_share_prefix(
        material in proptest::collection::vec(any::<u8>(), 0..128),
        entropy in any::<[u8; 16]>(),
        cell_id in "[a-z_]{1,24}-[0-9a-f]{8}",
    ) {
        let solution = signature::generate(&material, &entropy);
        let cell = signature::derive_for_cell(&solution, &cell_id);
        prop_assert!(signature::verify_well_formed(&cell).is_ok());
        prop_assert!(signature::shares_prefix(&solution, &cell));
    }
}

// === Resource accounting ===

#[derive(Debug, Clone)]
enum ResourceOp {
    Allocate(u8),
    Suspend(u8),
    Resume(u8),
    Release(u8),
}

fn resource_op() -> impl Strategy<Value = ResourceOp> {
    prop_oneof![
        (0u8..4).prop_map(ResourceOp::Allocate),
        (0u8..4).prop_map(ResourceOp::Suspend),
        (0u8..4).prop_map(ResourceOp::Resume),
        (0u8..4).prop_map(ResourceOp::Release),
    ]
}

proptest! {
    /// `allocated + available == total` after every operation, for every
    /// resource class, no matter the operation order.
    #[test]
    fn prop_resource_conservation(ops in proptest::collection::vec(resource_op(), 0..40)) {
        let total = ResourceAllocation {
            memory_mb: 4096,
            cpu_percent: 800,
            storage_mb: 4000,
        };
        let mut table = ResourceTable::new(total);
        let capabilities = ["text_generation", "media_processing", "ui_rendering", "data_analysis"];
        let mut reserved: HashMap<String, ResourceAllocation> = HashMap::new();

        for op in ops {
            match op {
                ResourceOp::Allocate(i) => {
                    let cell = format!("cell-{}", i);
                    if let Ok(allocation) =
                        table.allocate(&cell, default_requirements(capabilities[i as usize]))
                    {
                        reserved.insert(cell, allocation);
                    }
                }
                ResourceOp::Suspend(i) => {
                    let cell = format!("cell-{}", i);
                    if let Some(reduced) = table.reduce_for_suspend(&cell) {
                        reserved.insert(cell, reduced);
                    }
                }
                ResourceOp::Resume(i) => {
                    let cell = format!("cell-{}", i);
                    if let Some(Ok(restored)) = table.restore_for_resume(&cell) {
                        reserved.insert(cell, restored);
                    }
                }
                ResourceOp::Release(i) => {
                    let cell = format!("cell-{}", i);
                    if table.release(&cell).is_some() {
                        reserved.remove(&cell);
                    }
                }
            }

            let snapshot = table.snapshot();
            let memory: u64 = reserved.values().map(|r| r.memory_mb).sum();
            let cpu: u64 = reserved.values().map(|r| r.cpu_percent).sum();
            let storage: u64 = reserved.values().map(|r| r.storage_mb).sum();
            prop_assert_eq!(snapshot.memory_available_mb + memory, snapshot.memory_total_mb);
            prop_assert_eq!(snapshot.cpu_available_percent + cpu, snapshot.cpu_total_percent);
            prop_assert_eq!(snapshot.storage_available_mb + storage, snapshot.storage_total_mb);
        }
    }
}

// === Lifecycle ===

fn lifecycle_action() -> impl Strategy<Value = LifecycleAction> {
    prop_oneof![
        Just(LifecycleAction::Activate),
        Just(LifecycleAction::Suspend),
        Just(LifecycleAction::Resume),
        Just(LifecycleAction::Deactivate),
        Just(LifecycleAction::Release),
    ]
}

proptest! {
    /// No action sequence ever leaves the legal state machine, and nothing
    /// escapes `released`.
    #[test]
    fn prop_lifecycle_follows_state_machine(
        actions in proptest::collection::vec(lifecycle_action(), 0..30),
    ) {
        let mut state = CellState::Initialized;
        for action in actions {
            let Some(next) = apply(state, action) else {
                continue;
            };
            let legal = matches!(
                (state, action, next),
                (CellState::Initialized, LifecycleAction::Activate, CellState::Active)
                    | (CellState::Deactivated, LifecycleAction::Activate, CellState::Active)
                    | (CellState::Active, LifecycleAction::Suspend, CellState::Suspended)
                    | (CellState::Suspended, LifecycleAction::Resume, CellState::Active)
                    | (_, LifecycleAction::Deactivate, CellState::Deactivated)
                    | (_, LifecycleAction::Release, CellState::Released)
                    | (CellState::Released, LifecycleAction::Deactivate, CellState::Released)
            );
            prop_assert!(legal, "illegal transition {:?} --{:?}--> {:?}", state, action, next);
            if state == CellState::Released {
                prop_assert_eq!(next, CellState::Released, "released is terminal");
            }
            state = next;
        }
    }
}

// === Chain ===

proptest! {
    /// Any single-field tamper on a non-genesis block invalidates the chain.
    #[test]
    fn prop_tampered_chain_fails_validation(
        blocks in 1usize..4,
        victim_offset in 0usize..3,
        mutation in 0u8..3,
    ) {
        let signer = TrailSigner::generate();
        let mut chain = TrailChain::new(0);
        for _ in 0..blocks {
            let tx = TrailTransaction::create(
                RecordKind::Assembly,
                "qc-prop".to_string(),
                Uuid::new_v4(),
                vec!["text_generation-prop".to_string()],
                BTreeMap::new(),
                PerformanceMetrics::default(),
                None,
                &signer,
            ).expect("tx");
            let block = TrailBlock::candidate(
                chain.tail().index + 1,
                vec![tx],
                chain.tail().hash.clone(),
                0,
            );
            chain.append(block, &signer.verifying_key()).expect("append");
        }
        chain.validate(&signer.verifying_key()).expect("untampered chain is valid");

        let mut tampered = chain.blocks().to_vec();
        let victim = 1 + victim_offset % blocks;
        match mutation {
            0 => tampered[victim].hash = format!("f{}", &tampered[victim].hash[1..]),
            1 => tampered[victim].previous_hash =
                format!("f{}", &tampered[victim].previous_hash[1..]),
            _ => tampered[victim].transactions[0].quantum_signature = "qc-altered".to_string(),
        }
        let tampered = TrailChain::from_blocks(tampered);
        prop_assert!(tampered.validate(&signer.verifying_key()).is_err());
    }
}

// === Intent ===

proptest! {
    /// Analysis is a fixed point on its own normalized output.
    #[test]
    fn prop_intent_analysis_idempotent(request in "[ -~]{0,60}") {
        let interpreter = IntentInterpreter::new();
        let context = AssemblyContext::default();

        let first = interpreter.analyze(&request, &context);
        let second = interpreter.analyze(&first.normalized_request, &context);

        prop_assert_eq!(&first.normalized_request, &second.normalized_request);
        prop_assert_eq!(first.capability_names(), second.capability_names());
    }
}

// === Scoring ===

proptest! {
    #[test]
    fn prop_scores_stay_in_range(
        assembly_time_ms in 0u64..10_000_000,
        memory_peak_mb in 0.0f64..1_000_000.0,
        cpu_usage_avg in 0.0f64..100_000.0,
        total_usage_time_ms in 0u64..10_000_000,
        old in 0.0f64..100.0,
        uses in 1u32..50,
    ) {
        let score = score_metrics(&PerformanceMetrics {
            assembly_time_ms,
            memory_peak_mb,
            cpu_usage_avg,
            total_usage_time_ms,
        });
        prop_assert!((0.0..=100.0).contains(&score));

        let folded = updated_score(old, score, uses);
        prop_assert!((0.0..=100.0).contains(&folded));
    }
}
