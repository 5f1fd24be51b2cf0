//! # QCC-05 Quantum Trail - Assembly Ledger Subsystem
//!
//! The append-only, proof-of-work-chained record of assemblies. Every
//! successful assembly (and its release) lands here as a signed transaction;
//! similar past configurations are retrieved and ranked from the record so
//! proven recipes get reused.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Block hash is the SHA-256 of the canonical body | `domain::block::TrailBlock::compute_hash` |
//! | Block hash carries `difficulty` leading zero digits | `domain::block::meets_difficulty` |
//! | `previous_hash` links every block to its predecessor | `domain::chain::TrailChain::validate` |
//! | Every transaction signature verifies against its body | `domain::transaction::TrailTransaction::verify` |
//! | A loaded chain that fails validation is discarded | `service::QuantumTrail::open` |
//!
//! ## Concurrency
//!
//! Append is single-writer: `add_transaction` and the mining loop serialize
//! through the one chain owner. Mining yields every 10 000 nonce attempts;
//! the chain file is rewritten with a `.tmp` + atomic rename.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod service;

pub use domain::block::TrailBlock;
pub use domain::chain::TrailChain;
pub use domain::transaction::{RecordKind, TrailTransaction};
pub use error::TrailError;
pub use service::{QuantumTrail, TrailConfig, TrailStats};
