//! Provider health tracking.
//!
//! A provider that times out or refuses a connection is skipped for a
//! cooldown window (default 60 s) before the assembler tries it again.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

/// In-memory last-failure registry, keyed by provider URL.
#[derive(Debug)]
pub struct HealthRegistry {
    cooldown: Duration,
    last_failure: Mutex<HashMap<String, Instant>>,
}

impl HealthRegistry {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_failure: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the provider is currently considered healthy.
    pub fn is_healthy(&self, provider: &str) -> bool {
        match self.last_failure.lock().get(provider) {
            Some(failed_at) => failed_at.elapsed() >= self.cooldown,
            None => true,
        }
    }

    /// Record a failure; the provider is skipped until the cooldown expires.
    pub fn mark_unhealthy(&self, provider: &str) {
        warn!(provider, cooldown_secs = self.cooldown.as_secs(), "provider marked unhealthy");
        self.last_failure
            .lock()
            .insert(provider.to_string(), Instant::now());
    }

    /// Record a success, clearing any cooldown immediately.
    pub fn mark_healthy(&self, provider: &str) {
        self.last_failure.lock().remove(provider);
    }

    /// Filter a provider list down to the currently healthy ones,
    /// preserving order.
    pub fn healthy<'a>(&self, providers: &'a [String]) -> Vec<&'a String> {
        providers.iter().filter(|p| self.is_healthy(p)).collect()
    }
}
