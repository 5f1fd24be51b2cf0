//! # QCC-02 Security - Verification & Policy Subsystem
//!
//! The security gate for cell assembly: quantum-signature generation and
//! well-formedness verification, per-cell permission derivation from
//! capability templates, and inter-cell connection authorization.
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | A well-formed signature is ≥ 64 chars, `qc`-prefixed, base64 remainder | `domain::signature::verify_well_formed` |
//! | Every member cell shares the solution signature's first 10 chars | `SecurityGate::verify_cell` |
//! | Permissions start from the fully locked template | `domain::permissions::derive` |
//! | Connection policy tightens monotonically with the level | `domain::policy::connection_allowed` |
//!
//! Violations surface as `SecurityError` and are never retried by callers.

pub mod domain;
pub mod error;
pub mod service;

pub use domain::permissions::{AccessGrant, MemoryGrant, PermissionSet};
pub use domain::policy::SecurityLevel;
pub use error::SecurityError;
pub use service::{SecurityConfig, SecurityGate};
