//! Dispatch validated commands to the action-execution bridge
//!
//! The bridge is a separate local HTTP service that performs the
//! real-world effect of a command (launching applications, changing
//! settings). The pipeline reaches it through the [`CommandBridge`]
//! capability; transport failures surface as `None`, which the
//! pipeline treats the same as an explicit error response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::Command;
use crate::core::config::RelayConfig;

/// Structured reply from the bridge service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub status: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BridgeResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            status: "ok".into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            result: None,
            error: Some(message.into()),
        }
    }

    /// True when the bridge reported failure
    pub fn is_error(&self) -> bool {
        self.status == "error" || self.error.as_deref().is_some_and(|e| !e.is_empty())
    }
}

/// Capability for sending commands to the execution service.
///
/// `None` signals a transport-level failure (unreachable service,
/// non-JSON reply); callers must not distinguish it from an error
/// response when deciding on recovery.
#[async_trait]
pub trait CommandBridge: Send + Sync {
    async fn send_command(&self, command: &Command) -> Option<BridgeResponse>;
}

/// HTTP adapter for the bridge service
pub struct HttpBridge {
    client: Client,
    endpoint: String,
}

impl HttpBridge {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.bridge_endpoint.clone(), config.bridge_timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch system status from the bridge service
    pub async fn get_status(&self) -> Option<BridgeResponse> {
        let url = format!("{}/system/status", self.endpoint);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(%error, endpoint = %self.endpoint, "bridge status check failed");
                return None;
            }
        };
        match response.error_for_status() {
            Ok(response) => response.json().await.ok(),
            Err(error) => {
                tracing::error!(%error, endpoint = %self.endpoint, "bridge status check failed");
                None
            }
        }
    }

    /// True when the bridge responds to /system/status
    pub async fn is_available(&self) -> bool {
        let available = self.get_status().await.is_some();
        if !available {
            tracing::error!(
                endpoint = %self.endpoint,
                "bridge is unreachable; is the desktop service running?"
            );
        }
        available
    }
}

#[async_trait]
impl CommandBridge for HttpBridge {
    async fn send_command(&self, command: &Command) -> Option<BridgeResponse> {
        let payload = command.to_json();
        tracing::info!(action = %command.action, "sending command to bridge");
        tracing::debug!(%payload, "bridge request payload");

        let url = format!("{}/action/execute", self.endpoint);
        let response = match self.client.post(&url).json(&payload).send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(%error, endpoint = %self.endpoint, "bridge call failed");
                return None;
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(%error, endpoint = %self.endpoint, "bridge call failed");
                return None;
            }
        };

        match response.json::<BridgeResponse>().await {
            Ok(parsed) => Some(parsed),
            Err(error) => {
                tracing::error!(%error, "bridge returned an unreadable response");
                None
            }
        }
    }
}
