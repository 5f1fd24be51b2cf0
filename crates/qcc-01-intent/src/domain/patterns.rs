//! The fixed intent pattern set and its capability mapping.
//!
//! Each pattern pairs a name with a regex run against the normalized request.
//! A match contributes the capabilities listed in [`capabilities_for`], each
//! tagged with priority, confidence, and a typed option record. Verb-object
//! patterns tolerate up to two words between verb and object so that
//! requests like "create a new document" still match.

use lazy_static::lazy_static;
use regex::Regex;
use shared_types::{
    AccessMode, AnalysisMode, CapabilityOptions, DataAnalysisOptions, FileSystemOptions,
    MediaKind, MediaMode, MediaProcessingOptions, RequiredCapability, TextGenerationOptions,
    TextMode, UiRenderingOptions, WebSearchOptions,
};
use std::collections::BTreeMap;

/// Pattern names in match order. Order matters: capability de-duplication
/// keeps the first contribution for a given capability name.
pub const PATTERN_TABLE: [(&str, &str); 23] = [
    // Content creation and manipulation
    (
        "create_document",
        r"\b(?:create|make|start|generate|write|draft)\s+(?:\w+\s+){0,2}(?:document|doc|text|letter|email|report|essay|summary|article|post|message)\b",
    ),
    (
        "edit_document",
        r"\b(?:edit|modify|change|update|revise)\s+(?:\w+\s+){0,2}(?:document|doc|text|letter|email|report|essay|summary|article|post|message)\b",
    ),
    (
        "format_document",
        r"\b(?:format|style|layout|arrange)\s+(?:\w+\s+){0,2}(?:document|doc|text|letter|email|report|essay|summary|article|post|message)\b",
    ),
    // Media handling
    (
        "image_viewing",
        r"\b(?:view|show|display|see|open)\s+(?:\w+\s+){0,2}(?:image|photo|picture|pic|photograph|png|jpg|jpeg|gif)\b",
    ),
    (
        "image_editing",
        r"\b(?:edit|modify|change|update|adjust|filter)\s+(?:\w+\s+){0,2}(?:image|photo|picture|pic|photograph|png|jpg|jpeg|gif)\b",
    ),
    (
        "video_playback",
        r"\b(?:watch|play|view|show|run)\s+(?:\w+\s+){0,2}(?:video|movie|film|clip|youtube|mp4|avi|mov)\b",
    ),
    (
        "audio_playback",
        r"\b(?:listen|play|hear)\s+(?:\w+\s+){0,2}(?:audio|music|sound|song|track|mp3|wav|podcast)\b",
    ),
    // File operations
    (
        "file_browsing",
        r"\b(?:browse|find|search|list)\s+(?:\w+\s+){0,2}(?:file|folder|directory|document|location)s?\b",
    ),
    (
        "file_management",
        r"\b(?:move|copy|delete|rename)\s+(?:\w+\s+){0,2}(?:file|folder|directory|document)s?\b",
    ),
    // Data analysis
    (
        "data_analysis",
        r"\b(?:analyze|analyse|examine|investigate|study|research)\s+(?:\w+\s+){0,2}(?:data|information|statistics|numbers|figures|results)\b",
    ),
    (
        "data_visualization",
        r"\b(?:visualize|visualise|chart|graph|plot)\s+(?:\w+\s+){0,2}(?:data|information|statistics|numbers|figures|results)\b",
    ),
    (
        "calculation",
        r"\b(?:calculate|compute|solve|figure out)\s+(?:\w+\s+){0,2}(?:equation|formula|expression|sum|average|mean|median|percentage)\b",
    ),
    // Web and communication
    (
        "web_browsing",
        r"\b(?:browse|open|go to|visit|navigate to)\s+(?:\w+\s+){0,2}(?:website|site|webpage|url|link|address|http|www)\b",
    ),
    (
        "web_search",
        r"\b(?:search|find|look up|google|query)\s+(?:\w+\s+){0,2}(?:information|topic|subject|question|web|internet|online)\b",
    ),
    (
        "communication",
        r"\b(?:send|compose)\s+(?:\w+\s+){0,2}(?:email|message|chat|text|sms)\b",
    ),
    // App-specific keywords
    (
        "calculator",
        r"\b(?:calculator|arithmetic|add|subtract|multiply|divide)\b",
    ),
    (
        "calendar",
        r"\b(?:calendar|schedule|appointment|meeting|event|reminder)\b",
    ),
    (
        "weather",
        r"\b(?:weather|forecast|temperature|climate|rain|snow|sunny|cloudy)\b",
    ),
    (
        "maps",
        r"\b(?:map|directions|navigate|route|distance)\b",
    ),
    // Generic app requests
    (
        "app_request",
        r"\b(?:open|start|launch|run|use)\s+(?:\w+\s+){0,2}(?:application|program|software)\b",
    ),
    // UI elements
    (
        "ui_request",
        r"\b(?:interface|screen|button|menu|form|input)\b",
    ),
    // Help and information
    (
        "help_request",
        r"\b(?:help|assist|support|guide|tutorial|instructions|how to|how do i)\b",
    ),
    (
        "info_request",
        r"\b(?:tell me|what is|who is|where is|when is|why is|how is|define|explain|describe)\b",
    ),
];

lazy_static! {
    /// Compiled pattern set, in table order.
    pub static ref COMPILED_PATTERNS: Vec<(&'static str, Regex)> = PATTERN_TABLE
        .iter()
        .map(|(name, pattern)| (*name, Regex::new(pattern).expect("static regex")))
        .collect();

    /// Keywords that trigger the visual fallback when nothing else matched.
    pub static ref VISUAL_HINT: Regex =
        Regex::new(r"\b(?:show|display|visual|graph|chart|picture|image)\b").expect("static regex");
}

fn text_generation(mode: TextMode, priority: u8, confidence: f64) -> RequiredCapability {
    RequiredCapability {
        name: "text_generation".to_string(),
        options: CapabilityOptions::TextGeneration(TextGenerationOptions { mode }),
        priority,
        confidence,
    }
}

fn ui_rendering(surface: &str, priority: u8, confidence: f64) -> RequiredCapability {
    RequiredCapability {
        name: "ui_rendering".to_string(),
        options: CapabilityOptions::UiRendering(UiRenderingOptions {
            surface: surface.to_string(),
            ..UiRenderingOptions::default()
        }),
        priority,
        confidence,
    }
}

fn file_system(access: AccessMode, priority: u8, confidence: f64) -> RequiredCapability {
    RequiredCapability {
        name: "file_system".to_string(),
        options: CapabilityOptions::FileSystem(FileSystemOptions { access }),
        priority,
        confidence,
    }
}

fn media_processing(
    media: MediaKind,
    mode: MediaMode,
    priority: u8,
    confidence: f64,
) -> RequiredCapability {
    RequiredCapability {
        name: "media_processing".to_string(),
        options: CapabilityOptions::MediaProcessing(MediaProcessingOptions {
            media,
            mode,
            ..MediaProcessingOptions::default()
        }),
        priority,
        confidence,
    }
}

fn data_analysis(mode: AnalysisMode, priority: u8, confidence: f64) -> RequiredCapability {
    RequiredCapability {
        name: "data_analysis".to_string(),
        options: CapabilityOptions::DataAnalysis(DataAnalysisOptions { mode }),
        priority,
        confidence,
    }
}

fn web_search(priority: u8, confidence: f64) -> RequiredCapability {
    RequiredCapability {
        name: "web_search".to_string(),
        options: CapabilityOptions::WebSearch(WebSearchOptions {}),
        priority,
        confidence,
    }
}

fn opaque(name: &str, priority: u8, confidence: f64) -> RequiredCapability {
    RequiredCapability {
        name: name.to_string(),
        options: CapabilityOptions::Opaque(BTreeMap::new()),
        priority,
        confidence,
    }
}

/// The capabilities a matched pattern contributes, in contribution order.
pub fn capabilities_for(pattern_name: &str) -> Vec<RequiredCapability> {
    match pattern_name {
        "create_document" => vec![
            text_generation(TextMode::Creative, 1, 0.9),
            file_system(AccessMode::Write, 2, 0.8),
        ],
        "edit_document" => vec![
            text_generation(TextMode::Editing, 1, 0.9),
            file_system(AccessMode::ReadWrite, 2, 0.8),
        ],
        "format_document" => vec![
            text_generation(TextMode::Formatting, 2, 0.8),
            ui_rendering("document_editor", 1, 0.9),
        ],
        "image_viewing" => vec![
            media_processing(MediaKind::Image, MediaMode::View, 1, 0.9),
            ui_rendering("image_viewer", 2, 0.9),
        ],
        "image_editing" => vec![
            media_processing(MediaKind::Image, MediaMode::Edit, 1, 0.9),
            ui_rendering("image_editor", 2, 0.9),
        ],
        "video_playback" => vec![
            media_processing(MediaKind::Video, MediaMode::Play, 1, 0.9),
            ui_rendering("video_player", 2, 0.9),
        ],
        "audio_playback" => vec![
            media_processing(MediaKind::Audio, MediaMode::Play, 1, 0.9),
            ui_rendering("audio_player", 2, 0.9),
        ],
        "file_browsing" => vec![
            file_system(AccessMode::Read, 1, 0.9),
            ui_rendering("file_browser", 2, 0.9),
        ],
        "file_management" => vec![
            file_system(AccessMode::ReadWrite, 1, 0.9),
            ui_rendering("file_manager", 2, 0.9),
        ],
        "data_analysis" => vec![
            data_analysis(AnalysisMode::Analysis, 1, 0.9),
            text_generation(TextMode::Analytical, 2, 0.8),
        ],
        "data_visualization" => vec![
            data_analysis(AnalysisMode::Visualization, 1, 0.9),
            ui_rendering("data_visualizer", 2, 0.9),
        ],
        "calculation" => vec![
            opaque("arithmetic", 1, 0.9),
            ui_rendering("calculator", 2, 0.8),
        ],
        "web_browsing" => vec![
            opaque("web_browser", 1, 0.9),
            ui_rendering("web_view", 2, 0.9),
        ],
        "web_search" => vec![
            web_search(1, 0.9),
            text_generation(TextMode::Informative, 2, 0.8),
            ui_rendering("search_results", 3, 0.8),
        ],
        "communication" => vec![
            text_generation(TextMode::Communication, 1, 0.9),
            ui_rendering("message_composer", 2, 0.8),
        ],
        "calculator" => vec![
            opaque("arithmetic", 1, 0.9),
            ui_rendering("calculator", 2, 0.9),
        ],
        "calendar" => vec![opaque("calendar", 1, 0.9), ui_rendering("calendar", 2, 0.9)],
        "weather" => vec![opaque("weather", 1, 0.9), ui_rendering("weather", 2, 0.9)],
        "maps" => vec![opaque("maps", 1, 0.9), ui_rendering("map", 2, 0.9)],
        "app_request" => vec![opaque("app_launcher", 1, 0.8)],
        "ui_request" => vec![ui_rendering("general", 1, 0.8)],
        "help_request" => vec![
            text_generation(TextMode::Instructional, 1, 0.9),
            ui_rendering("help_display", 2, 0.8),
        ],
        "info_request" => vec![
            text_generation(TextMode::Informative, 1, 0.9),
            ui_rendering("information_display", 2, 0.8),
        ],
        _ => vec![],
    }
}

/// The fixed connection-hint rule table: which capabilities a source should
/// feed, when both ends are present in the analysis.
pub fn connection_targets(source: &str) -> &'static [&'static str] {
    match source {
        "ui_rendering" => &[
            "text_generation",
            "data_analysis",
            "media_processing",
            "file_system",
        ],
        "text_generation" => &["data_analysis", "file_system", "web_search"],
        "data_analysis" => &["file_system", "database", "web_search"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pattern_compiles_and_maps() {
        for (name, regex) in COMPILED_PATTERNS.iter() {
            assert!(!regex.as_str().is_empty());
            assert!(
                !capabilities_for(name).is_empty(),
                "pattern {} has no capability mapping",
                name
            );
        }
    }

    #[test]
    fn test_create_document_tolerates_adjectives() {
        let (_, regex) = &COMPILED_PATTERNS[0];
        assert!(regex.is_match("create a new document"));
        assert!(regex.is_match("create a document"));
        assert!(regex.is_match("draft report"));
        assert!(!regex.is_match("delete a document"));
    }

    #[test]
    fn test_connection_rule_table() {
        assert!(connection_targets("ui_rendering").contains(&"file_system"));
        assert!(connection_targets("weather").is_empty());
    }
}
