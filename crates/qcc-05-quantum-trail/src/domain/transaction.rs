//! Ledger transactions.

use crate::domain::keys::{self, TrailSigner};
use crate::error::TrailError;
use chrono::Utc;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use shared_types::{ConnectionMap, PerformanceMetrics};
use uuid::Uuid;

/// What a transaction records.
///
/// `MiningReward` is a historical sentinel kind: nothing in the orchestrator
/// creates one, but chains that contain them stay loadable and similarity
/// retrieval skips them, as it does `Genesis` markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Assembly,
    Update,
    MiningReward,
    Genesis,
}

impl Default for RecordKind {
    fn default() -> Self {
        RecordKind::Assembly
    }
}

/// One signed record of an assembly or an assembly update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailTransaction {
    pub tx_id: Uuid,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub record_kind: RecordKind,
    pub quantum_signature: String,
    pub solution_id: Uuid,
    pub cell_ids: Vec<String>,
    pub connection_map: ConnectionMap,
    pub performance_metrics: PerformanceMetrics,
    /// Solution status carried by update records (e.g. `released`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Hex Ed25519 signature over the canonical body.
    pub tx_signature: String,
}

/// The unsigned body, serialized canonically for signing and verification.
#[derive(Serialize)]
struct TxBody<'a> {
    tx_id: &'a Uuid,
    timestamp: i64,
    record_kind: RecordKind,
    quantum_signature: &'a str,
    solution_id: &'a Uuid,
    cell_ids: &'a [String],
    connection_map: &'a ConnectionMap,
    performance_metrics: &'a PerformanceMetrics,
    status: &'a Option<String>,
}

impl TrailTransaction {
    /// Build and sign a transaction, validating the signature round-trip
    /// before it is accepted.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        record_kind: RecordKind,
        quantum_signature: String,
        solution_id: Uuid,
        cell_ids: Vec<String>,
        connection_map: ConnectionMap,
        performance_metrics: PerformanceMetrics,
        status: Option<String>,
        signer: &TrailSigner,
    ) -> Result<Self, TrailError> {
        let mut tx = Self {
            tx_id: Uuid::new_v4(),
            timestamp: Utc::now().timestamp_millis(),
            record_kind,
            quantum_signature,
            solution_id,
            cell_ids,
            connection_map,
            performance_metrics,
            status,
            tx_signature: String::new(),
        };
        tx.tx_signature = signer.sign(&tx.canonical_body()?);

        if !tx.verify(&signer.verifying_key()) {
            return Err(TrailError::TransactionValidation {
                tx_id: tx.tx_id,
                reason: "signature round-trip failed".to_string(),
            });
        }
        Ok(tx)
    }

    /// The canonical byte serialization of everything except the signature.
    pub fn canonical_body(&self) -> Result<Vec<u8>, TrailError> {
        let body = TxBody {
            tx_id: &self.tx_id,
            timestamp: self.timestamp,
            record_kind: self.record_kind,
            quantum_signature: &self.quantum_signature,
            solution_id: &self.solution_id,
            cell_ids: &self.cell_ids,
            connection_map: &self.connection_map,
            performance_metrics: &self.performance_metrics,
            status: &self.status,
        };
        serde_json::to_vec(&body).map_err(|e| TrailError::Serde(e.to_string()))
    }

    /// Verify the transaction's signature against its body.
    pub fn verify(&self, verifying_key: &VerifyingKey) -> bool {
        match self.canonical_body() {
            Ok(body) => keys::verify(verifying_key, &body, &self.tx_signature),
            Err(_) => false,
        }
    }

    /// Whether similarity retrieval should skip this record.
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self.record_kind,
            RecordKind::MiningReward | RecordKind::Genesis
        )
    }
}
