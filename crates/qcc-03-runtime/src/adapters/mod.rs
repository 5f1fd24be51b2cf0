//! Adapters layer.

mod local_cell;

pub use local_cell::{CapabilityHandler, LocalCell};
