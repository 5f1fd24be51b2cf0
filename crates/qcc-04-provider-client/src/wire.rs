//! Provider wire format.

use serde::{Deserialize, Serialize};
use shared_types::{AssemblyContext, CellParameters, UsageMetrics};
use uuid::Uuid;

/// What the assembler is asking for: one capability, or one exact cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellAcquisition {
    ByCapability {
        capability: String,
        parameters: CellParameters,
    },
    BySpec {
        cell_type: String,
        version: String,
        parameters: CellParameters,
    },
}

impl CellAcquisition {
    pub fn parameters(&self) -> &CellParameters {
        match self {
            CellAcquisition::ByCapability { parameters, .. } => parameters,
            CellAcquisition::BySpec { parameters, .. } => parameters,
        }
    }

    /// Short label for logs and error contexts.
    pub fn label(&self) -> String {
        match self {
            CellAcquisition::ByCapability { capability, .. } => capability.clone(),
            CellAcquisition::BySpec {
                cell_type, version, ..
            } => format!("{}@{}", cell_type, version),
        }
    }
}

/// Body of `POST /cells/request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellRequestPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub parameters: CellParameters,
    pub context: AssemblyContext,
    pub quantum_signature: String,
    pub assembler_id: Uuid,
}

impl CellRequestPayload {
    pub fn new(
        acquisition: &CellAcquisition,
        context: &AssemblyContext,
        quantum_signature: &str,
        assembler_id: Uuid,
    ) -> Self {
        let (capability, cell_type, version) = match acquisition {
            CellAcquisition::ByCapability { capability, .. } => {
                (Some(capability.clone()), None, None)
            }
            CellAcquisition::BySpec {
                cell_type, version, ..
            } => (None, Some(cell_type.clone()), Some(version.clone())),
        };
        Self {
            capability,
            cell_type,
            version,
            parameters: acquisition.parameters().clone(),
            context: context.clone(),
            quantum_signature: quantum_signature.to_string(),
            assembler_id,
        }
    }
}

/// Response of `POST /cells/request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellRequestResponse {
    pub status: String,
    pub cell_id: String,
    pub download_url: String,
    pub cell_type: String,
    pub capability: String,
    pub version: String,
    #[serde(default)]
    pub expiration_ts: Option<i64>,
}

/// Response of `GET /cells/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellDownloadResponse {
    pub status: String,
    pub cell_id: String,
    pub quantum_signature: String,
    /// Opaque cell package; the node's body factory interprets it.
    pub package: serde_json::Value,
}

/// Body of `POST /cells/{id}/release`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellReleasePayload {
    pub quantum_signature: String,
    pub usage_metrics: UsageMetrics,
}

/// Response of `POST /cells/{id}/release`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellReleaseResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_payload_by_capability_omits_spec_fields() {
        let acquisition = CellAcquisition::ByCapability {
            capability: "text_generation".to_string(),
            parameters: CellParameters::default(),
        };
        let payload = CellRequestPayload::new(
            &acquisition,
            &AssemblyContext::default(),
            "qc-sig",
            Uuid::new_v4(),
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["capability"], "text_generation");
        assert!(json.get("cell_type").is_none());
        assert!(json.get("version").is_none());
    }

    #[test]
    fn test_request_payload_by_spec_carries_version() {
        let acquisition = CellAcquisition::BySpec {
            cell_type: "system.file_system".to_string(),
            version: "1.2.0".to_string(),
            parameters: CellParameters::default(),
        };
        let payload = CellRequestPayload::new(
            &acquisition,
            &AssemblyContext::default(),
            "qc-sig",
            Uuid::new_v4(),
        );
        assert_eq!(payload.cell_type.as_deref(), Some("system.file_system"));
        assert_eq!(payload.version.as_deref(), Some("1.2.0"));
        assert!(payload.capability.is_none());
    }
}
