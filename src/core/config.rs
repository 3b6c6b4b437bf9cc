//! Relay configuration
//!
//! All tunable values are collected here so the orchestrator and its
//! collaborators never read ambient global state. A `RelayConfig` is
//! built once at process start and passed down explicitly.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the command relay pipeline
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Base URL of the action-execution bridge service
    pub bridge_endpoint: String,

    /// Timeout applied to each bridge HTTP request
    ///
    /// The LLM provider client manages its own timeouts; this only
    /// bounds calls to the local bridge service.
    pub bridge_timeout: Duration,

    /// Tokens that mark an utterance as potentially compound
    ///
    /// When extraction yields exactly one command but the input text
    /// contains any of these markers, the pipeline asks the LLM to
    /// re-derive a multi-step plan. The trigger set is policy, not a
    /// hard contract: it is locale-specific and meant to be tuned per
    /// deployment.
    pub multi_action_markers: Vec<String>,

    /// Optional path to the known-applications registry JSON
    ///
    /// When present, application names and aliases from this file are
    /// included in the command prompt as hints for `open_app`.
    pub app_registry_path: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bridge_endpoint: "http://localhost:5055".into(),
            bridge_timeout: Duration::from_secs(10),
            multi_action_markers: default_multi_action_markers(),
            app_registry_path: None,
        }
    }
}

impl RelayConfig {
    /// Create a config from environment variables
    ///
    /// Optional: RELAY_BRIDGE_ENDPOINT (defaults to http://localhost:5055)
    /// Optional: RELAY_APP_REGISTRY (path to applications.json)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("RELAY_BRIDGE_ENDPOINT") {
            config.bridge_endpoint = endpoint;
        }
        if let Ok(path) = std::env::var("RELAY_APP_REGISTRY") {
            config.app_registry_path = Some(PathBuf::from(path));
        }
        config
    }

    /// True when `text` contains any compound-request marker
    pub fn looks_multi_action(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.multi_action_markers
            .iter()
            .any(|marker| lowered.contains(marker.as_str()))
    }
}

/// Default compound-request markers: Russian sequencing tokens from the
/// original deployment, their English counterparts, and the comma.
fn default_multi_action_markers() -> Vec<String> {
    [
        " и ", "затем", "потом", "после", "сначала", "далее", " and ", " then ", ",",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint() {
        let config = RelayConfig::default();
        assert_eq!(config.bridge_endpoint, "http://localhost:5055");
    }

    #[test]
    fn test_comma_marks_multi_action() {
        let config = RelayConfig::default();
        assert!(config.looks_multi_action("open notepad, then mute the sound"));
        assert!(!config.looks_multi_action("open notepad"));
    }

    #[test]
    fn test_russian_markers() {
        let config = RelayConfig::default();
        assert!(config.looks_multi_action("открой блокнот и выключи звук"));
        assert!(config.looks_multi_action("сначала открой браузер"));
    }
}
