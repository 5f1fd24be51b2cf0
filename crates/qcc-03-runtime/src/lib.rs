//! # QCC-03 Runtime - Cell Lifecycle & Dispatch Subsystem
//!
//! Owns everything about cells once they are acquired: the lifecycle state
//! machine, the process-wide resource accounting table, the inter-cell
//! connection registry, and capability dispatch.
//!
//! The four concerns live as inner tables of one [`CellRuntime`] struct with
//! no back-pointers between them; each table has a single lock.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Lifecycle transitions follow the state machine; `released` is terminal | `domain::lifecycle::apply` |
//! | `allocated + available == total` for every resource class | `domain::resources::ResourceTable` |
//! | No partial reservations are observable | allocation checks all classes before mutating |
//! | Relay requires the edge to exist | `CellRuntime::relay` |
//! | A released cell holds no connections | `CellRuntime::release` |
//!
//! ## Concurrency
//!
//! Per-cell lifecycle transitions are serialized through a per-cell async
//! mutex held across the body call. Dispatches on the same cell are
//! serialized through a separate per-cell gate unless the cell's parameters
//! set `concurrent_safe`.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::LocalCell;
pub use domain::connections::CellConnections;
pub use domain::lifecycle::SuspendSnapshot;
pub use error::{CellBodyError, RuntimeError};
pub use ports::CellHandle;
pub use service::{CellRuntime, RuntimeConfig};
