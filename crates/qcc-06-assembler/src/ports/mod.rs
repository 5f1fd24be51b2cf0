//! Ports layer (Hexagonal Architecture).

mod outbound;

pub use outbound::{ProvidedCell, ProviderGateway};
