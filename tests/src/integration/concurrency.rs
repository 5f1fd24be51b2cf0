//! Concurrent access to one assembler.

use crate::support::harness;
use qcc_02_security::SecurityLevel;
use shared_types::AssemblyContext;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assemblies_do_not_corrupt_accounting() {
    let h = Arc::new(harness(&["https://p1"], SecurityLevel::Standard).await);
    let total_memory = h.runtime.resource_snapshot().memory_total_mb;

    let mut joins = Vec::new();
    for i in 0..4 {
        let h = h.clone();
        joins.push(tokio::spawn(async move {
            let request = if i % 2 == 0 {
                "Create a new document"
            } else {
                "analyze this data"
            };
            h.assembler
                .assemble_solution(request, AssemblyContext::default())
                .await
        }));
    }

    let mut solution_ids = Vec::new();
    for join in joins {
        let solution = join.await.expect("join").expect("assemble");
        solution_ids.push(solution.solution_id);
    }

    assert_eq!(h.assembler.status().active_solutions, 4);

    for solution_id in solution_ids {
        assert!(h.assembler.release_solution(solution_id).await);
    }

    // Cached cells are deactivated and hold no reservations, so the pool
    // must be whole again.
    let snapshot = h.runtime.resource_snapshot();
    assert_eq!(snapshot.active_allocations, 0);
    assert_eq!(snapshot.memory_available_mb, total_memory);
    assert_eq!(h.assembler.status().active_solutions, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatches_on_one_solution() {
    let h = Arc::new(harness(&["https://p1"], SecurityLevel::Standard).await);
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

    let mut joins = Vec::new();
    for i in 0..8 {
        let h = h.clone();
        let cell_id = cell_id.clone();
        let capability = cell.capability.clone();
        joins.push(tokio::spawn(async move {
            h.assembler
                .execute_capability(&cell_id, &capability, serde_json::json!({ "i": i }))
                .await
        }));
    }

    for join in joins {
        let result = join.await.expect("join").expect("dispatch");
        assert!(result.is_success());
    }
}
