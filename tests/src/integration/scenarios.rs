//! End-to-end scenarios, mirroring the behaviors clients depend on.

use crate::support::harness;
use qcc_01_intent::IntentInterpreter;
use qcc_02_security::SecurityLevel;
use qcc_06_assembler::ProviderGateway;
use shared_types::{
    AssemblyContext, AssemblyError, CapabilityOptions, CellState, DeviceInfo, MediaQuality,
    Platform, SolutionStatus,
};
use std::collections::HashSet;

#[tokio::test]
async fn scenario_create_document_end_to_end() {
    let h = harness(&["https://p1"], SecurityLevel::Standard).await;

    let solution = h
        .assembler
        .assemble_solution("Create a new document", AssemblyContext::default())
        .await
        .expect("assemble");

    assert_eq!(
        solution.intent.capability_names(),
        vec!["text_generation", "file_system"],
        "capabilities in priority order"
    );
    assert_eq!(solution.status, SolutionStatus::Active);
    assert!(solution.cells.len() >= 2);
    assert!(solution
        .cells
        .values()
        .all(|cell| cell.status == CellState::Active));
    assert_eq!(h.trail.pending_len(), 1, "ledger grew by one transaction");
}

#[tokio::test]
async fn scenario_photo_on_mobile_adjusts_options() {
    let interpreter = IntentInterpreter::new();
    let context = AssemblyContext {
        device_info: Some(DeviceInfo {
            platform: Platform::Mobile,
            memory_gb: 4,
            cpu_cores: 4,
            gpu_available: false,
        }),
        ..AssemblyContext::default()
    };

    let analysis = interpreter.analyze("view a photo", &context);
    let media = analysis
        .required_capabilities
        .iter()
        .find(|c| c.name == "media_processing")
        .expect("media_processing present");
    let ui = analysis
        .required_capabilities
        .iter()
        .find(|c| c.name == "ui_rendering")
        .expect("ui_rendering present");

    match &media.options {
        CapabilityOptions::MediaProcessing(options) => {
            assert_eq!(options.quality, MediaQuality::Medium);
        }
        other => panic!("unexpected media options: {:?}", other),
    }
    match &ui.options {
        CapabilityOptions::UiRendering(options) => {
            assert_eq!(options.surface, "image_viewer");
            assert!(options.responsive);
            assert!(options.compact);
        }
        other => panic!("unexpected ui options: {:?}", other),
    }
}

#[tokio::test]
async fn scenario_second_assembly_reuses_prior_configuration() {
    let h = harness(&["https://p1"], SecurityLevel::Standard).await;

    let first = h
        .assembler
        .assemble_solution("Create a document", AssemblyContext::default())
        .await
        .expect("first assembly");
    assert!(!first.used_prior_configuration);

    let second = h
        .assembler
        .assemble_solution("Create another document", AssemblyContext::default())
        .await
        .expect("second assembly");
    assert!(
        second.used_prior_configuration,
        "prior configuration must be found and reused"
    );
}

#[tokio::test]
async fn scenario_double_release_returns_false_without_error() {
    let h = harness(&["https://p1"], SecurityLevel::Standard).await;

    let solution = h
        .assembler
        .assemble_solution("Create a new document", AssemblyContext::default())
        .await
        .expect("assemble");

    assert!(h.assembler.release_solution(solution.solution_id).await);
    assert!(!h.assembler.release_solution(solution.solution_id).await);
}

#[tokio::test]
async fn scenario_failover_to_healthy_provider() {
    let h = harness(&["https://provider-a", "https://provider-b"], SecurityLevel::Standard).await;
    h.gateway.fail_provider("https://provider-a");

    let solution = h
        .assembler
        .assemble_solution("Create a new document", AssemblyContext::default())
        .await
        .expect("assembly succeeds via provider B");

    assert!(solution
        .cells
        .values()
        .all(|cell| cell.provider_url == "https://provider-b"));
    assert!(
        !h.gateway.is_healthy("https://provider-a"),
        "provider A sits out its cooldown"
    );
}

#[tokio::test]
async fn scenario_maximum_level_rejects_cross_provider_edges() {
    let h = harness(&["https://p1", "https://p2"], SecurityLevel::Maximum).await;
    h.gateway.serve_round_robin();

    let solution = h
        .assembler
        .assemble_solution("Create a new document", AssemblyContext::default())
        .await
        .expect("assembly survives the rejected edge");

    let providers: HashSet<&str> = solution
        .cells
        .values()
        .map(|cell| cell.provider_url.as_str())
        .collect();
    assert_eq!(providers.len(), 2, "cells came from two providers");
    assert!(
        solution.connection_map.is_empty(),
        "cross-provider edge must be dropped at maximum level"
    );
    assert_eq!(solution.status, SolutionStatus::Active);
}

#[tokio::test]
async fn scenario_empty_provider_list_fails_cleanly() {
    let h = harness(&[], SecurityLevel::Standard).await;

    let err = h
        .assembler
        .assemble_solution("Create a new document", AssemblyContext::default())
        .await
        .expect_err("no providers, no solution");

    match err {
        AssemblyError::CellRequest {
            providers_tried, ..
        } => assert!(providers_tried.is_empty()),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(h.trail.pending_len(), 0, "nothing recorded");
    assert_eq!(
        h.runtime.resource_snapshot().active_allocations,
        0,
        "nothing leaked"
    );
}

#[tokio::test]
async fn scenario_node_starts_and_shuts_down() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = node_runtime::NodeConfig {
        ledger: qcc_05_quantum_trail::TrailConfig {
            storage_path: dir.path().to_path_buf(),
            difficulty: 1,
            ..qcc_05_quantum_trail::TrailConfig::default()
        },
        ..node_runtime::NodeConfig::default()
    };

    let node = node_runtime::Node::start(config).await.expect("start");
    assert_eq!(node.assembler.status().active_solutions, 0);
    node.shutdown().await;
}

#[tokio::test]
async fn scenario_release_reflects_usage_in_ledger() {
    let h = harness(&["https://p1"], SecurityLevel::Standard).await;

    let solution = h
        .assembler
        .assemble_solution("Create a new document", AssemblyContext::default())
        .await
        .expect("assemble");

    let (cell_id, cell) = solution
        .cells
        .iter()
        .find(|(_, c)| c.capability == "text_generation")
        .expect("text cell");
    h.assembler
        .execute_capability(cell_id, &cell.capability, serde_json::json!({"prompt": "x"}))
        .await
        .expect("dispatch");

    assert!(h.assembler.release_solution(solution.solution_id).await);
    assert_eq!(
        h.trail.pending_len(),
        2,
        "assembly and release records both queued"
    );

    let mined = h.trail.mine_once().await.expect("mine").expect("block");
    assert_eq!(mined.transactions.len(), 2);
    h.trail.validate().expect("chain remains valid");
}
