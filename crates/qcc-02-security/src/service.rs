//! Security Gate - coordination of signature, permission, and policy checks.

use crate::domain::permissions::{self, PermissionSet};
use crate::domain::policy::{self, SecurityLevel};
use crate::domain::signature;
use crate::error::SecurityError;
use parking_lot::RwLock;
use rand::RngCore;
use serde::Deserialize;
use shared_types::{AssemblyContext, Cell, IntentAnalysis};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Security gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub level: SecurityLevel,
}

/// The security gate.
///
/// Owns signature generation for assemblies, verifies acquired cells against
/// the solution signature, derives per-cell permissions, and authorizes
/// connection edges. The level can be tightened or relaxed at runtime.
pub struct SecurityGate {
    level: RwLock<SecurityLevel>,
}

impl SecurityGate {
    pub fn new(config: SecurityConfig) -> Self {
        info!(level = %config.level, "security gate initialized");
        Self {
            level: RwLock::new(config.level),
        }
    }

    pub fn level(&self) -> SecurityLevel {
        *self.level.read()
    }

    pub fn set_level(&self, level: SecurityLevel) {
        info!(%level, "security level changed");
        *self.level.write() = level;
    }

    /// Generate a fresh solution signature bound to the requesting user,
    /// the intent analysis, and the enriched context.
    pub fn generate_signature(
        &self,
        user_id: &str,
        intent: &IntentAnalysis,
        context: &AssemblyContext,
    ) -> String {
        let mut material = Vec::new();
        material.extend_from_slice(user_id.as_bytes());
        material.push(b':');
        material.extend_from_slice(intent.normalized_request.as_bytes());
        material.push(b':');
        for capability in &intent.required_capabilities {
            material.extend_from_slice(capability.name.as_bytes());
            material.push(b',');
        }
        if let Ok(context_json) = serde_json::to_vec(context) {
            material.extend_from_slice(&context_json);
        }

        let mut entropy = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut entropy);

        let sig = signature::generate(&material, &entropy);
        debug!(prefix = &sig[..signature::SHARED_PREFIX_LEN], "generated solution signature");
        sig
    }

    /// Derive the signature a member cell is stamped with.
    pub fn derive_cell_signature(&self, solution_signature: &str, cell_id: &str) -> String {
        signature::derive_for_cell(solution_signature, cell_id)
    }

    /// Check well-formedness of a signature in isolation.
    pub fn verify_signature(&self, sig: &str) -> Result<(), SecurityError> {
        signature::verify_well_formed(sig)
    }

    /// Verify one cell against the owning solution's signature: the cell's
    /// own signature must be well-formed and share the solution prefix.
    pub fn verify_cell(&self, cell: &Cell, solution_signature: &str) -> Result<(), SecurityError> {
        signature::verify_well_formed(&cell.quantum_signature)?;

        if !signature::shares_prefix(solution_signature, &cell.quantum_signature) {
            warn!(cell_id = %cell.cell_id, "cell signature prefix mismatch");
            return Err(SecurityError::PrefixMismatch {
                cell_id: cell.cell_id.clone(),
            });
        }
        Ok(())
    }

    /// Verify a whole acquisition set. The solution signature itself is
    /// checked first; the first failing cell aborts.
    pub fn verify_cells<'a>(
        &self,
        cells: impl IntoIterator<Item = &'a Cell>,
        solution_signature: &str,
    ) -> Result<(), SecurityError> {
        signature::verify_well_formed(solution_signature)?;

        let mut verified = 0usize;
        for cell in cells {
            self.verify_cell(cell, solution_signature)?;
            verified += 1;
        }
        debug!(verified, "all cells verified");
        Ok(())
    }

    /// Derive the permission set for every cell at the current level.
    pub fn derive_permissions<'a>(
        &self,
        cells: impl IntoIterator<Item = &'a Cell>,
    ) -> HashMap<String, PermissionSet> {
        let level = self.level();
        cells
            .into_iter()
            .map(|cell| {
                (
                    cell.cell_id.clone(),
                    permissions::derive(&cell.capability, level),
                )
            })
            .collect()
    }

    /// Authorize a connection edge between two cells at the current level.
    pub fn authorize_connection(&self, source: &Cell, target: &Cell) -> Result<(), SecurityError> {
        let level = self.level();
        if policy::connection_allowed(
            level,
            &source.capability,
            &target.capability,
            &source.provider_url,
            &target.provider_url,
        ) {
            Ok(())
        } else {
            warn!(
                source = %source.cell_id,
                target = %target.cell_id,
                %level,
                "connection denied by policy"
            );
            Err(SecurityError::ConnectionDenied {
                source_cell: source.cell_id.clone(),
                target: target.cell_id.clone(),
                level,
            })
        }
    }
}
