//! # QCC-04 Provider Client - Outbound Provider RPC Subsystem
//!
//! The HTTP client for cell providers: request a cell, download its
//! package, release it back. Every call carries a deadline; a provider that
//! times out or refuses a connection is marked unhealthy and skipped for a
//! cooldown window, which is what the assembler's failover consults.
//!
//! ## Wire surface
//!
//! | Call | Route |
//! |------|-------|
//! | request | `POST {provider}/cells/request` |
//! | download | `GET {provider}/cells/{id}` |
//! | release | `POST {provider}/cells/{id}/release` |
//!
//! Authentication is an optional `X-API-Key` header.

pub mod client;
pub mod error;
pub mod health;
pub mod remote_cell;
pub mod wire;

pub use client::{ProviderClient, ProviderConfig};
pub use error::ProviderError;
pub use health::HealthRegistry;
pub use remote_cell::RemoteCell;
