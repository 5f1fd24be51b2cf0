//! # Capability Names & Option Records
//!
//! A capability is a named operation a cell exposes. The names themselves are
//! provider-defined symbols; the ones listed here are the capabilities the
//! orchestrator interprets (resource defaults, permission templates,
//! connection policy). Anything else is carried opaquely.
//!
//! Per-capability parameters are explicit enumerated records. Unknown fields
//! are rejected when a record is deserialized at the boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capability names with orchestrator-known semantics.
pub mod names {
    pub const TEXT_GENERATION: &str = "text_generation";
    pub const UI_RENDERING: &str = "ui_rendering";
    pub const FILE_SYSTEM: &str = "file_system";
    pub const DATA_ANALYSIS: &str = "data_analysis";
    pub const MEDIA_PROCESSING: &str = "media_processing";
    pub const WEB_SEARCH: &str = "web_search";
    pub const DATABASE: &str = "database";
}

/// Text generation modes, one per recognized intent family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMode {
    Creative,
    Editing,
    Formatting,
    Analytical,
    Informative,
    Instructional,
    Communication,
}

impl Default for TextMode {
    fn default() -> Self {
        TextMode::Informative
    }
}

/// File system access grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl Default for AccessMode {
    fn default() -> Self {
        AccessMode::Read
    }
}

/// Media categories a `media_processing` cell handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

/// What a `media_processing` cell is asked to do with its media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaMode {
    View,
    Edit,
    Play,
}

/// Processing quality, adjusted to the device's available memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaQuality {
    Low,
    Medium,
    High,
}

/// Analysis mode for `data_analysis` cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    Analysis,
    Visualization,
}

impl Default for AnalysisMode {
    fn default() -> Self {
        AnalysisMode::Analysis
    }
}

/// Options record for `text_generation`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TextGenerationOptions {
    pub mode: TextMode,
}

/// Options record for `ui_rendering`.
///
/// `surface` names the concrete view the cell should render (e.g.
/// `image_viewer`, `file_browser`, `calculator`); the set is open because
/// providers ship their own surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct UiRenderingOptions {
    pub surface: String,
    pub responsive: bool,
    pub compact: bool,
}

impl Default for UiRenderingOptions {
    fn default() -> Self {
        Self {
            surface: "general".to_string(),
            responsive: false,
            compact: false,
        }
    }
}

/// Options record for `media_processing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MediaProcessingOptions {
    pub media: MediaKind,
    pub mode: MediaMode,
    pub quality: MediaQuality,
    pub use_gpu: bool,
}

impl Default for MediaProcessingOptions {
    fn default() -> Self {
        Self {
            media: MediaKind::Image,
            mode: MediaMode::View,
            quality: MediaQuality::Medium,
            use_gpu: false,
        }
    }
}

/// Options record for `file_system`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileSystemOptions {
    pub access: AccessMode,
}

/// Options record for `data_analysis`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DataAnalysisOptions {
    pub mode: AnalysisMode,
}

/// Options record for `web_search`. Currently empty; kept as a record so
/// unknown options are still rejected at the boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WebSearchOptions {}

/// The per-capability option record attached to a required capability or a
/// cell. Capabilities the orchestrator does not interpret (e.g. `calendar`,
/// `weather`) carry an opaque string map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityOptions {
    TextGeneration(TextGenerationOptions),
    UiRendering(UiRenderingOptions),
    MediaProcessing(MediaProcessingOptions),
    FileSystem(FileSystemOptions),
    DataAnalysis(DataAnalysisOptions),
    WebSearch(WebSearchOptions),
    Opaque(BTreeMap<String, String>),
}

impl CapabilityOptions {
    /// Empty opaque options.
    pub fn none() -> Self {
        CapabilityOptions::Opaque(BTreeMap::new())
    }
}

impl Default for CapabilityOptions {
    fn default() -> Self {
        CapabilityOptions::none()
    }
}

/// Parameters attached to a cell instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellParameters {
    /// The capability option record the cell was acquired with.
    pub options: CapabilityOptions,
    /// Whether capability dispatches on this cell may run in parallel.
    /// Dispatch is serialized per cell unless this is set.
    pub concurrent_safe: bool,
    /// Provider-specified resource requirements. When absent, the runtime
    /// falls back to the per-capability defaults.
    pub resources: Option<crate::entities::ResourceAllocation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_option_rejected() {
        let raw = r#"{"mode":"creative","temperature":0.9}"#;
        let parsed: Result<TextGenerationOptions, _> = serde_json::from_str(raw);
        assert!(parsed.is_err(), "unknown field must be rejected");
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let parsed: UiRenderingOptions = serde_json::from_str(r#"{"surface":"image_viewer"}"#)
            .expect("partial record should parse");
        assert_eq!(parsed.surface, "image_viewer");
        assert!(!parsed.responsive);
        assert!(!parsed.compact);
    }

    #[test]
    fn test_options_round_trip() {
        let options = CapabilityOptions::MediaProcessing(MediaProcessingOptions {
            media: MediaKind::Video,
            mode: MediaMode::Play,
            quality: MediaQuality::High,
            use_gpu: true,
        });
        let json = serde_json::to_string(&options).unwrap();
        let back: CapabilityOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(options, back);
    }
}
