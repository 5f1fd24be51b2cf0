//! Intent Interpreter - core analysis logic.

use crate::domain::normalize::normalize_text;
use crate::domain::patterns::{
    capabilities_for, connection_targets, COMPILED_PATTERNS, VISUAL_HINT,
};
use chrono::Utc;
use shared_types::{
    AssemblyContext, CapabilityOptions, ConnectionMap, DeviceInfo, IntentAnalysis, MediaQuality,
    Platform, RequiredCapability, TextGenerationOptions, TextMode, UiRenderingOptions,
};
use tracing::{debug, warn};

/// Interprets user intent to determine required capabilities.
///
/// Stateless; the pattern tables it consults are compiled once per process.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntentInterpreter;

impl IntentInterpreter {
    pub fn new() -> Self {
        Self
    }

    /// Analyze a user request against the fixed pattern set.
    ///
    /// Pure and infallible: an unintelligible request yields the fallback
    /// capability list, never an error.
    pub fn analyze(&self, user_request: &str, context: &AssemblyContext) -> IntentAnalysis {
        debug!(request = user_request, "analyzing intent");

        let normalized = normalize_text(user_request);
        let mut capabilities = identify_capabilities(&normalized);

        if capabilities.is_empty() {
            warn!(request = user_request, "no capabilities identified, using fallback");
            capabilities.push(RequiredCapability {
                name: "text_generation".to_string(),
                options: CapabilityOptions::TextGeneration(TextGenerationOptions {
                    mode: TextMode::Informative,
                }),
                priority: 1,
                confidence: 0.5,
            });

            if VISUAL_HINT.is_match(&normalized) {
                capabilities.push(RequiredCapability {
                    name: "ui_rendering".to_string(),
                    options: CapabilityOptions::UiRendering(UiRenderingOptions {
                        surface: "simple".to_string(),
                        ..UiRenderingOptions::default()
                    }),
                    priority: 2,
                    confidence: 0.4,
                });
            }
        }

        if let Some(device) = &context.device_info {
            for capability in &mut capabilities {
                adjust_for_device(capability, device);
            }
        }

        // Stable sort: contribution order is preserved within a priority.
        capabilities.sort_by_key(|cap| cap.priority);

        let suggested_connections = identify_connections(&capabilities);
        let confidence_score = mean_confidence(&capabilities);

        debug!(
            capabilities = ?capabilities.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            confidence_score,
            "intent analysis complete"
        );

        IntentAnalysis {
            original_request: user_request.to_string(),
            normalized_request: normalized,
            required_capabilities: capabilities,
            suggested_connections,
            analyzed_at: Utc::now(),
            context_used: *context != AssemblyContext::default(),
            confidence_score,
            use_previous_configurations: true,
        }
    }
}

/// Run every pattern against the normalized request, de-duplicating
/// contributed capabilities by name (first match wins).
fn identify_capabilities(normalized: &str) -> Vec<RequiredCapability> {
    let mut capabilities: Vec<RequiredCapability> = Vec::new();

    for (pattern_name, regex) in COMPILED_PATTERNS.iter() {
        if !regex.is_match(normalized) {
            continue;
        }
        debug!(pattern = pattern_name, "matched intent pattern");

        for capability in capabilities_for(pattern_name) {
            if !capabilities.iter().any(|c| c.name == capability.name) {
                capabilities.push(capability);
            }
        }
    }

    capabilities
}

/// Adjust a capability's option record for the requesting device.
fn adjust_for_device(capability: &mut RequiredCapability, device: &DeviceInfo) {
    match &mut capability.options {
        CapabilityOptions::UiRendering(options) => match device.platform {
            Platform::Mobile => {
                options.responsive = true;
                options.compact = true;
            }
            Platform::Web => {
                options.responsive = true;
            }
            Platform::Desktop => {}
        },
        CapabilityOptions::MediaProcessing(options) => {
            options.quality = if device.memory_gb < 2 {
                MediaQuality::Low
            } else if device.memory_gb < 8 {
                MediaQuality::Medium
            } else {
                MediaQuality::High
            };
            if device.gpu_available {
                options.use_gpu = true;
            }
        }
        _ => {}
    }
}

/// Derive connection hints from the fixed rule table, keeping only edges
/// whose endpoints are both present.
fn identify_connections(capabilities: &[RequiredCapability]) -> ConnectionMap {
    let mut connections = ConnectionMap::new();

    for source in capabilities {
        let targets: Vec<String> = connection_targets(&source.name)
            .iter()
            .filter(|target| capabilities.iter().any(|c| &c.name == *target))
            .map(|target| target.to_string())
            .collect();

        if !targets.is_empty() {
            connections.insert(source.name.clone(), targets);
        }
    }

    connections
}

fn mean_confidence(capabilities: &[RequiredCapability]) -> f64 {
    if capabilities.is_empty() {
        return 0.0;
    }
    capabilities.iter().map(|c| c.confidence).sum::<f64>() / capabilities.len() as f64
}
