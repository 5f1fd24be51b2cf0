//! Provider RPC client.

use crate::error::ProviderError;
use crate::health::HealthRegistry;
use crate::wire::{
    CellAcquisition, CellDownloadResponse, CellReleasePayload, CellReleaseResponse,
    CellRequestPayload, CellRequestResponse,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use shared_types::{AssemblyContext, UsageMetrics};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Provider client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider endpoints in failover order.
    pub urls: Vec<String>,
    pub timeout_seconds: u64,
    pub unhealthy_cooldown_seconds: u64,
    /// Sent as `X-API-Key` when present.
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            timeout_seconds: 30,
            unhealthy_cooldown_seconds: 60,
            api_key: None,
        }
    }
}

/// The outbound RPC client. Each call carries the configured deadline and
/// is retried at most once against the same provider before the error is
/// handed back for cross-provider failover.
pub struct ProviderClient {
    http: reqwest::Client,
    config: ProviderConfig,
    health: Arc<HealthRegistry>,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let value = reqwest::header::HeaderValue::from_str(api_key).map_err(|e| {
                ProviderError::Transport {
                    provider: String::new(),
                    operation: "client_build",
                    detail: format!("invalid api key header: {}", e),
                }
            })?;
            headers.insert("X-API-Key", value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Transport {
                provider: String::new(),
                operation: "client_build",
                detail: e.to_string(),
            })?;

        info!(providers = config.urls.len(), "provider client initialized");
        let health = Arc::new(HealthRegistry::new(Duration::from_secs(
            config.unhealthy_cooldown_seconds,
        )));
        Ok(Self {
            http,
            config,
            health,
        })
    }

    pub fn providers(&self) -> &[String] {
        &self.config.urls
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.config.timeout_seconds
    }

    /// A reqwest handle sharing this client's pool and headers, for
    /// building per-cell remote handles.
    pub fn http(&self) -> reqwest::Client {
        self.http.clone()
    }

    /// `POST {provider}/cells/request`
    #[instrument(skip(self, acquisition, context))]
    pub async fn request_cell(
        &self,
        provider: &str,
        acquisition: &CellAcquisition,
        context: &AssemblyContext,
        quantum_signature: &str,
        assembler_id: Uuid,
    ) -> Result<CellRequestResponse, ProviderError> {
        self.ensure_healthy(provider)?;
        let payload =
            CellRequestPayload::new(acquisition, context, quantum_signature, assembler_id);
        let url = format!("{}/cells/request", provider.trim_end_matches('/'));

        let first = self
            .send_json(provider, "request_cell", self.http.post(&url).json(&payload))
            .await;
        let result = match first {
            Err(ref err) if err.poisons_provider() => {
                debug!(provider, spec = %acquisition.label(), "retrying cell request once");
                self.send_json(provider, "request_cell", self.http.post(&url).json(&payload))
                    .await
            }
            other => other,
        };
        self.finish(provider, result)
    }

    /// `GET {provider}/cells/{id}`
    #[instrument(skip(self))]
    pub async fn download_cell(
        &self,
        provider: &str,
        cell_id: &str,
    ) -> Result<CellDownloadResponse, ProviderError> {
        self.ensure_healthy(provider)?;
        let url = format!("{}/cells/{}", provider.trim_end_matches('/'), cell_id);

        let first = self
            .send_json(provider, "download_cell", self.http.get(&url))
            .await;
        let result = match first {
            Err(ref err) if err.poisons_provider() => {
                self.send_json(provider, "download_cell", self.http.get(&url))
                    .await
            }
            other => other,
        };
        self.finish(provider, result)
    }

    /// `POST {provider}/cells/{id}/release`
    #[instrument(skip(self, usage_metrics))]
    pub async fn release_cell(
        &self,
        provider: &str,
        cell_id: &str,
        quantum_signature: &str,
        usage_metrics: UsageMetrics,
    ) -> Result<CellReleaseResponse, ProviderError> {
        self.ensure_healthy(provider)?;
        let payload = CellReleasePayload {
            quantum_signature: quantum_signature.to_string(),
            usage_metrics,
        };
        let url = format!(
            "{}/cells/{}/release",
            provider.trim_end_matches('/'),
            cell_id
        );

        let result = self
            .send_json(provider, "release_cell", self.http.post(&url).json(&payload))
            .await;
        self.finish(provider, result)
    }

    fn ensure_healthy(&self, provider: &str) -> Result<(), ProviderError> {
        if self.health.is_healthy(provider) {
            Ok(())
        } else {
            Err(ProviderError::Unhealthy {
                provider: provider.to_string(),
            })
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        provider: &str,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.classify(provider, operation, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Rejected {
                provider: provider.to_string(),
                operation,
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::MalformedResponse {
                provider: provider.to_string(),
                operation,
                detail: e.to_string(),
            })
    }

    fn classify(
        &self,
        provider: &str,
        operation: &'static str,
        error: reqwest::Error,
    ) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout {
                provider: provider.to_string(),
                operation,
                timeout_secs: self.config.timeout_seconds,
            }
        } else {
            ProviderError::Transport {
                provider: provider.to_string(),
                operation,
                detail: error.to_string(),
            }
        }
    }

    fn finish<T>(
        &self,
        provider: &str,
        result: Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        match &result {
            Ok(_) => self.health.mark_healthy(provider),
            Err(err) if err.poisons_provider() => self.health.mark_unhealthy(provider),
            Err(_) => {}
        }
        result
    }
}
