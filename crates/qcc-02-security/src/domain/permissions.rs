//! Per-cell permission derivation from capability templates.
//!
//! Every cell starts from the fully locked template; its capability's
//! template is applied on top, then the level restrictions. A capability
//! without a template keeps the locked set.

use crate::domain::policy::SecurityLevel;
use serde::{Deserialize, Serialize};
use shared_types::capability::names;

/// Access grade for a permission domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessGrant {
    None,
    Read,
    ReadWrite,
}

/// Memory access is never unrestricted for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryGrant {
    Limited,
}

/// The permission set granted to one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub file_system: AccessGrant,
    pub network: AccessGrant,
    pub user_interaction: AccessGrant,
    pub process: AccessGrant,
    pub memory: MemoryGrant,
}

impl PermissionSet {
    /// The fully locked starting point.
    pub fn locked() -> Self {
        Self {
            file_system: AccessGrant::None,
            network: AccessGrant::None,
            user_interaction: AccessGrant::None,
            process: AccessGrant::None,
            memory: MemoryGrant::Limited,
        }
    }
}

/// Derive the permission set for a capability at a security level.
pub fn derive(capability: &str, level: SecurityLevel) -> PermissionSet {
    let mut set = PermissionSet::locked();

    match capability {
        names::TEXT_GENERATION => {
            set.file_system = AccessGrant::Read;
            set.user_interaction = AccessGrant::Read;
        }
        names::UI_RENDERING => {
            set.user_interaction = AccessGrant::ReadWrite;
        }
        names::FILE_SYSTEM => {
            set.file_system = AccessGrant::ReadWrite;
            set.user_interaction = AccessGrant::Read;
        }
        names::DATA_ANALYSIS | names::MEDIA_PROCESSING => {
            set.file_system = AccessGrant::Read;
            set.user_interaction = AccessGrant::Read;
        }
        names::WEB_SEARCH => {
            set.network = AccessGrant::Read;
            set.user_interaction = AccessGrant::Read;
        }
        _ => {}
    }

    apply_level_restrictions(&mut set, level);
    set
}

fn apply_level_restrictions(set: &mut PermissionSet, level: SecurityLevel) {
    match level {
        SecurityLevel::Standard => {}
        SecurityLevel::High => {
            if set.network == AccessGrant::ReadWrite {
                set.network = AccessGrant::Read;
            }
        }
        SecurityLevel::Maximum => {
            set.network = AccessGrant::None;
            if set.file_system == AccessGrant::ReadWrite {
                set.file_system = AccessGrant::Read;
            }
        }
    }
}
