//! The per-capability cell cache.
//!
//! At most one retained cell per capability. Only "core" capabilities are
//! eligible; within a capability the newer `created_at` wins; over the size
//! bound the cell with the oldest `created_at` is evicted for asynchronous
//! release. Lookup removes the entry, so a cached cell can never serve two
//! solutions at once.

use serde::Deserialize;
use shared_types::{Cell, DeviceInfo};
use std::collections::HashMap;
use tracing::debug;

/// Cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub core_capabilities: Vec<String>,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            core_capabilities: vec![
                "file_system".to_string(),
                "ui_rendering".to_string(),
                "text_generation".to_string(),
            ],
            max_entries: 20,
        }
    }
}

/// One retained cell. The runtime still holds its registration and body
/// handle; the cache keeps the record and the provider reference needed for
/// an eventual release RPC.
#[derive(Debug, Clone)]
pub struct CachedCell {
    pub cell: Cell,
    pub provider_ref: Option<String>,
}

/// The cache map, keyed by capability.
#[derive(Debug)]
pub struct CellCache {
    config: CacheConfig,
    entries: HashMap<String, CachedCell>,
}

impl CellCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a capability is in the configured core set.
    pub fn eligible(&self, capability: &str) -> bool {
        self.config
            .core_capabilities
            .iter()
            .any(|core| core == capability)
    }

    /// Device-compatibility predicate for a cached cell. The default
    /// accepts everything; a device-aware policy can tighten this.
    pub fn compatible(_cell: &Cell, _device: &DeviceInfo) -> bool {
        true
    }

    /// Take a compatible cell for a capability, removing it from the cache.
    pub fn take(&mut self, capability: &str, device: &DeviceInfo) -> Option<CachedCell> {
        let hit = self.entries.get(capability)?;
        if !Self::compatible(&hit.cell, device) {
            return None;
        }
        debug!(capability, cell_id = %hit.cell.cell_id, "cache hit");
        self.entries.remove(capability)
    }

    /// Offer a cell for retention. Returns every cell displaced by the
    /// offer (an older same-capability entry, a size-bound eviction, or the
    /// offer itself when it loses), which the caller must release.
    pub fn offer(&mut self, candidate: CachedCell) -> Vec<CachedCell> {
        if !self.eligible(&candidate.cell.capability) {
            return vec![candidate];
        }

        let mut displaced = Vec::new();
        let capability = candidate.cell.capability.clone();

        if let Some(existing) = self.entries.get(&capability) {
            if existing.cell.created_at >= candidate.cell.created_at {
                // The incumbent is newer; the offer loses.
                return vec![candidate];
            }
            if let Some(older) = self.entries.remove(&capability) {
                displaced.push(older);
            }
        }

        self.entries.insert(capability, candidate);

        if self.entries.len() > self.config.max_entries {
            if let Some(oldest_capability) = self
                .entries
                .iter()
                .min_by_key(|(_, cached)| cached.cell.created_at)
                .map(|(capability, _)| capability.clone())
            {
                if let Some(evicted) = self.entries.remove(&oldest_capability) {
                    debug!(
                        capability = %oldest_capability,
                        cell_id = %evicted.cell.cell_id,
                        "cache over bound, evicting oldest"
                    );
                    displaced.push(evicted);
                }
            }
        }

        displaced
    }
}
