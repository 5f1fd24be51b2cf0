//! Adapters layer: the HTTP gateway over the provider client, and a mock
//! gateway for tests.

mod http_gateway;
mod mock_gateway;

pub use mock_gateway::MockProviderGateway;
