//! The inter-cell connection registry.
//!
//! A directed adjacency map `source_id -> {target_id -> metadata}`. Message
//! transport between remote cells is the providers' concern; the registry
//! records which edges exist and gates relays on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::ConnectionMap;
use std::collections::HashMap;

/// Metadata attached to one installed edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetadata {
    pub established_at: DateTime<Utc>,
    pub channels: Vec<String>,
    pub messages_relayed: u64,
}

impl Default for ConnectionMetadata {
    fn default() -> Self {
        Self {
            established_at: Utc::now(),
            channels: vec!["message".to_string(), "event".to_string()],
            messages_relayed: 0,
        }
    }
}

/// Edges touching one cell, split by direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellConnections {
    pub outgoing: Vec<String>,
    pub incoming: Vec<String>,
}

impl CellConnections {
    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty() && self.incoming.is_empty()
    }
}

/// The adjacency map itself. Callers wrap it in a single lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    edges: HashMap<String, HashMap<String, ConnectionMetadata>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an edge. Returns `false` when it already existed.
    pub fn connect(&mut self, source: &str, target: &str) -> bool {
        self.edges
            .entry(source.to_string())
            .or_default()
            .insert(target.to_string(), ConnectionMetadata::default())
            .is_none()
    }

    /// Remove an edge. Removing a non-existent edge is a no-op returning
    /// `false`.
    pub fn disconnect(&mut self, source: &str, target: &str) -> bool {
        let Some(targets) = self.edges.get_mut(source) else {
            return false;
        };
        let removed = targets.remove(target).is_some();
        if targets.is_empty() {
            self.edges.remove(source);
        }
        removed
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .get(source)
            .is_some_and(|targets| targets.contains_key(target))
    }

    /// Count a relay over an existing edge. `false` when the edge is absent.
    pub fn record_relay(&mut self, source: &str, target: &str) -> bool {
        match self.edges.get_mut(source).and_then(|t| t.get_mut(target)) {
            Some(metadata) => {
                metadata.messages_relayed += 1;
                true
            }
            None => false,
        }
    }

    /// All edges touching a cell, both directions.
    pub fn connections_of(&self, cell_id: &str) -> CellConnections {
        let outgoing = self
            .edges
            .get(cell_id)
            .map(|targets| {
                let mut ids: Vec<String> = targets.keys().cloned().collect();
                ids.sort();
                ids
            })
            .unwrap_or_default();

        let mut incoming: Vec<String> = self
            .edges
            .iter()
            .filter(|(_, targets)| targets.contains_key(cell_id))
            .map(|(source, _)| source.clone())
            .collect();
        incoming.sort();

        CellConnections { outgoing, incoming }
    }

    /// Drop every edge that touches the cell, in either direction.
    pub fn remove_cell(&mut self, cell_id: &str) {
        self.edges.remove(cell_id);
        self.edges.retain(|_, targets| {
            targets.remove(cell_id);
            !targets.is_empty()
        });
    }

    /// The current adjacency as a serializable map, for ledger records.
    pub fn as_connection_map(&self) -> ConnectionMap {
        self.edges
            .iter()
            .map(|(source, targets)| {
                let mut ids: Vec<String> = targets.keys().cloned().collect();
                ids.sort();
                (source.clone(), ids)
            })
            .collect()
    }
}
