//! Similarity retrieval over recorded assemblies.
//!
//! Capability recovery is prefix-based: cell ids are minted as
//! `<capability>-<uuid>`, so a transaction's capabilities can be read off
//! its `cell_ids` without any side lookup.

use crate::domain::scoring::{average_metrics, score_metrics};
use crate::domain::transaction::TrailTransaction;
use chrono::{DateTime, Utc};
use shared_types::{Cell, CellConfiguration, CellParameters, CellSpec, ConnectionMap};
use uuid::Uuid;

/// Minimum similarity for a transaction to qualify.
pub const SIMILARITY_THRESHOLD: f64 = 0.5;

/// `|matched| / max(|requested|, |cell_ids|)`, where a match is a cell id
/// whose capability prefix appears in the requested list.
pub fn similarity_score(requested: &[String], cell_ids: &[String]) -> f64 {
    let denominator = requested.len().max(cell_ids.len());
    if denominator == 0 {
        return 0.0;
    }
    let matched = cell_ids
        .iter()
        .filter(|cell_id| {
            Cell::capability_of_id(cell_id)
                .is_some_and(|capability| requested.iter().any(|r| r == capability))
        })
        .count();
    matched as f64 / denominator as f64
}

/// Find configurations similar to a capability list.
///
/// `transactions` must be newest-first. Sentinel records are skipped; update
/// records never qualify on their own (they carry no cell ids) but their
/// metrics are folded into the configuration of the assembly they update.
pub fn find_similar(
    transactions: &[&TrailTransaction],
    requested: &[String],
    max_results: usize,
) -> Vec<CellConfiguration> {
    let mut scored: Vec<(f64, &TrailTransaction)> = transactions
        .iter()
        .filter(|tx| !tx.is_sentinel())
        .map(|tx| (similarity_score(requested, &tx.cell_ids), *tx))
        .filter(|(score, _)| *score > SIMILARITY_THRESHOLD)
        .collect();

    // Stable sort keeps newest-first among equal scores.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .into_iter()
        .take(max_results)
        .map(|(_, tx)| reconstruct(tx, transactions))
        .collect()
}

/// Rebuild a configuration from one qualifying transaction, averaging in
/// the metrics of every record that shares its solution.
fn reconstruct(tx: &TrailTransaction, all: &[&TrailTransaction]) -> CellConfiguration {
    let related: Vec<&shared_types::PerformanceMetrics> = all
        .iter()
        .filter(|other| other.solution_id == tx.solution_id)
        .map(|other| &other.performance_metrics)
        .collect();
    let averaged = average_metrics(&related);

    let cell_specs: Vec<CellSpec> = tx
        .cell_ids
        .iter()
        .filter_map(|cell_id| Cell::capability_of_id(cell_id))
        .map(|capability| CellSpec {
            cell_type: capability.to_string(),
            capability: capability.to_string(),
            version: "latest".to_string(),
            // Unknown at reconstruction time; the assembler substitutes its
            // configured provider list.
            provider_url: String::new(),
            parameters: CellParameters::default(),
        })
        .collect();

    CellConfiguration {
        config_id: Uuid::new_v4(),
        cell_specs,
        connection_map: translate_to_capabilities(&tx.connection_map),
        performance_score: score_metrics(&averaged),
        use_count: 1,
        last_used_at: DateTime::<Utc>::from_timestamp_millis(tx.timestamp)
            .unwrap_or_else(Utc::now),
    }
}

/// Recorded connection maps are keyed by cell id; a configuration's map is
/// keyed by cell type. Edges whose ends carry no capability prefix drop out.
fn translate_to_capabilities(map: &ConnectionMap) -> ConnectionMap {
    map.iter()
        .filter_map(|(source, targets)| {
            let source = Cell::capability_of_id(source)?;
            let targets: Vec<String> = targets
                .iter()
                .filter_map(|t| Cell::capability_of_id(t))
                .map(str::to_string)
                .collect();
            if targets.is_empty() {
                None
            } else {
                Some((source.to_string(), targets))
            }
        })
        .collect()
}
