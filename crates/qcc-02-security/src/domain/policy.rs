//! Connection-policy enforcement.
//!
//! The allowed-connection map mirrors the interpreter's connection hint
//! table. Policy tightens with the level: `standard` allows everything,
//! `high` consults the map, `maximum` additionally requires both cells to
//! come from the same provider.

use serde::{Deserialize, Serialize};
use shared_types::capability::names;

/// Security levels, ordered loosest to strictest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Standard,
    High,
    Maximum,
}

impl Default for SecurityLevel {
    fn default() -> Self {
        SecurityLevel::Standard
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SecurityLevel::Standard => "standard",
            SecurityLevel::High => "high",
            SecurityLevel::Maximum => "maximum",
        };
        f.write_str(s)
    }
}

/// Capabilities a source capability may connect to under `high`/`maximum`.
pub fn allowed_targets(source_capability: &str) -> &'static [&'static str] {
    match source_capability {
        names::UI_RENDERING => &[
            names::TEXT_GENERATION,
            names::DATA_ANALYSIS,
            names::MEDIA_PROCESSING,
            names::FILE_SYSTEM,
        ],
        names::TEXT_GENERATION => &[names::DATA_ANALYSIS, names::FILE_SYSTEM, names::WEB_SEARCH],
        names::DATA_ANALYSIS => &[names::FILE_SYSTEM, names::DATABASE, names::WEB_SEARCH],
        _ => &[],
    }
}

/// Whether an edge is allowed at the given level.
pub fn connection_allowed(
    level: SecurityLevel,
    source_capability: &str,
    target_capability: &str,
    source_provider: &str,
    target_provider: &str,
) -> bool {
    match level {
        SecurityLevel::Standard => true,
        SecurityLevel::High => allowed_targets(source_capability).contains(&target_capability),
        SecurityLevel::Maximum => {
            allowed_targets(source_capability).contains(&target_capability)
                && source_provider == target_provider
        }
    }
}
