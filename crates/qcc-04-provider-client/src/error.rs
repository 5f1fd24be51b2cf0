//! Provider client error types.

use thiserror::Error;

/// Errors raised by provider RPC calls.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The call exceeded its deadline. The provider is marked unhealthy.
    #[error("provider '{provider}' timed out during {operation} after {timeout_secs}s")]
    Timeout {
        provider: String,
        operation: &'static str,
        timeout_secs: u64,
    },

    /// The provider answered with a non-success status.
    #[error("provider '{provider}' rejected {operation}: HTTP {status}")]
    Rejected {
        provider: String,
        operation: &'static str,
        status: u16,
    },

    /// Connection or protocol failure. The provider is marked unhealthy.
    #[error("transport failure talking to '{provider}' during {operation}: {detail}")]
    Transport {
        provider: String,
        operation: &'static str,
        detail: String,
    },

    /// The response body did not match the wire contract.
    #[error("malformed response from '{provider}' during {operation}: {detail}")]
    MalformedResponse {
        provider: String,
        operation: &'static str,
        detail: String,
    },

    /// The provider is inside its unhealthy cooldown window.
    #[error("provider '{provider}' is cooling down after a recent failure")]
    Unhealthy { provider: String },
}

impl ProviderError {
    /// Whether the failure should mark the provider unhealthy.
    pub fn poisons_provider(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout { .. } | ProviderError::Transport { .. }
        )
    }
}
