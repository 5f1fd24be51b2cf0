//! A provider-hosted cell body behind the runtime contract.
//!
//! Cells run wherever their provider placed them; the runtime talks to them
//! through this proxy. Lifecycle calls go to the provider's cell lifecycle
//! endpoint, capability dispatches to the capability endpoint. The wire
//! routes are the provider's cell-body surface, a collaborator interface
//! alongside the acquisition routes.

use async_trait::async_trait;
use qcc_03_runtime::{CellBodyError, CellHandle};
use serde::{Deserialize, Serialize};
use shared_types::{CapabilityResult, CellParameters};

#[derive(Serialize)]
struct LifecycleCall<'a> {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a CellParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct LifecycleReply {
    status: String,
    #[serde(default)]
    snapshot: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}

/// RPC proxy implementing the cell contract for one remote cell.
pub struct RemoteCell {
    http: reqwest::Client,
    provider: String,
    cell_id: String,
}

impl RemoteCell {
    pub fn new(http: reqwest::Client, provider: impl Into<String>, cell_id: impl Into<String>) -> Self {
        Self {
            http,
            provider: provider.into(),
            cell_id: cell_id.into(),
        }
    }

    fn lifecycle_url(&self) -> String {
        format!(
            "{}/cells/{}/lifecycle",
            self.provider.trim_end_matches('/'),
            self.cell_id
        )
    }

    fn capability_url(&self, capability: &str) -> String {
        format!(
            "{}/cells/{}/capabilities/{}",
            self.provider.trim_end_matches('/'),
            self.cell_id,
            capability
        )
    }

    async fn lifecycle(
        &self,
        action: &'static str,
        parameters: Option<&CellParameters>,
        snapshot: Option<serde_json::Value>,
    ) -> Result<LifecycleReply, CellBodyError> {
        let call = LifecycleCall {
            action,
            parameters,
            snapshot,
        };
        let response = self
            .http
            .post(self.lifecycle_url())
            .json(&call)
            .send()
            .await
            .map_err(|e| CellBodyError::new(format!("{} transport: {}", action, e)))?;

        if !response.status().is_success() {
            return Err(CellBodyError::new(format!(
                "{} rejected: HTTP {}",
                action,
                response.status()
            )));
        }

        let reply: LifecycleReply = response
            .json()
            .await
            .map_err(|e| CellBodyError::new(format!("{} malformed reply: {}", action, e)))?;

        if reply.status != "success" {
            return Err(CellBodyError::new(format!(
                "{} failed: {}",
                action, reply.message
            )));
        }
        Ok(reply)
    }
}

#[async_trait]
impl CellHandle for RemoteCell {
    async fn initialize(&self, params: &CellParameters) -> Result<(), CellBodyError> {
        self.lifecycle("initialize", Some(params), None).await?;
        Ok(())
    }

    async fn activate(&self) -> Result<(), CellBodyError> {
        self.lifecycle("activate", None, None).await?;
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), CellBodyError> {
        self.lifecycle("deactivate", None, None).await?;
        Ok(())
    }

    async fn suspend(&self) -> Result<serde_json::Value, CellBodyError> {
        let reply = self.lifecycle("suspend", None, None).await?;
        Ok(reply.snapshot.unwrap_or(serde_json::Value::Null))
    }

    async fn resume(&self, snapshot: serde_json::Value) -> Result<(), CellBodyError> {
        self.lifecycle("resume", None, Some(snapshot)).await?;
        Ok(())
    }

    async fn release(&self) -> Result<(), CellBodyError> {
        self.lifecycle("release", None, None).await?;
        Ok(())
    }

    async fn execute(
        &self,
        capability: &str,
        params: serde_json::Value,
    ) -> Result<CapabilityResult, CellBodyError> {
        let response = self
            .http
            .post(self.capability_url(capability))
            .json(&params)
            .send()
            .await
            .map_err(|e| CellBodyError::new(format!("dispatch transport: {}", e)))?;

        if !response.status().is_success() {
            return Err(CellBodyError::new(format!(
                "dispatch rejected: HTTP {}",
                response.status()
            )));
        }

        response
            .json::<CapabilityResult>()
            .await
            .map_err(|e| CellBodyError::new(format!("dispatch malformed reply: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_are_provider_scoped() {
        let cell = RemoteCell::new(
            reqwest::Client::new(),
            "https://provider.example/",
            "text_generation-abc",
        );
        assert_eq!(
            cell.lifecycle_url(),
            "https://provider.example/cells/text_generation-abc/lifecycle"
        );
        assert_eq!(
            cell.capability_url("text_generation"),
            "https://provider.example/cells/text_generation-abc/capabilities/text_generation"
        );
    }
}
