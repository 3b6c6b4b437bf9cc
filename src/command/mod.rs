//! Command schema shared with the action-execution bridge
//!
//! Raw LLM output flows through backfill and validation before a
//! `Command` is minted:
//! `serde_json::Value` -> backfill -> validate -> `Vec<Command>`

pub mod backfill;
pub mod validate;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Actions the bridge accepts, with the parameter names each requires.
///
/// This table mirrors the white-listed operations of the bridge service
/// and must match it exactly; both the validator and the backfiller
/// consult it.
pub const ALLOWED_ACTIONS: &[(&str, &[&str])] = &[
    ("open_app", &["application"]),
    ("search_files", &["query"]),
    ("adjust_setting", &["setting", "value"]),
    ("system_status", &[]),
    ("answer_question", &["answer"]),
];

/// Look up the required parameter names for an action.
///
/// Returns `None` when the action is not in the allowed set.
pub fn required_params(action: &str) -> Option<&'static [&'static str]> {
    ALLOWED_ACTIONS
        .iter()
        .find(|(name, _)| *name == action)
        .map(|(_, params)| *params)
}

/// Current time as an RFC 3339 UTC string with a trailing `Z`
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// One normalized instruction ready for dispatch to the bridge.
///
/// Only the validator (and the orchestrator's synthetic fallback
/// answer) construct these; by then the action is known-allowed and
/// every required parameter is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: String,
    pub params: Map<String, Value>,
    pub uuid: String,
    pub timestamp: String,
}

impl Command {
    /// Build a command with a fresh uuid and current timestamp
    pub fn new(action: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            action: action.into(),
            params,
            uuid: Uuid::new_v4().to_string(),
            timestamp: now_timestamp(),
        }
    }

    /// Wire representation sent to the bridge
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "action": self.action,
            "params": self.params,
            "uuid": self.uuid,
            "timestamp": self.timestamp,
        })
    }
}

/// One human-readable validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path to the failing field, e.g. `commands[1].params.application`
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Outcome of validating one raw payload.
///
/// Commands and issues are independent: an entry that produced any
/// issue is excluded from `commands`, but does not block its siblings.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub commands: Vec<Command>,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// True when at least one command validated and nothing was flagged
    pub fn is_valid(&self) -> bool {
        !self.commands.is_empty() && self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_params_lookup() {
        assert_eq!(required_params("open_app"), Some(&["application"][..]));
        assert_eq!(
            required_params("adjust_setting"),
            Some(&["setting", "value"][..])
        );
        assert_eq!(required_params("system_status"), Some(&[][..]));
        assert_eq!(required_params("reboot"), None);
    }

    #[test]
    fn test_new_command_generates_bookkeeping_fields() {
        let command = Command::new("system_status", Map::new());
        assert!(!command.uuid.is_empty());
        assert!(command.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_wire_shape() {
        let mut params = Map::new();
        params.insert("application".into(), Value::String("notepad".into()));
        let command = Command::new("open_app", params);

        let wire = command.to_json();
        assert_eq!(wire["action"], "open_app");
        assert_eq!(wire["params"]["application"], "notepad");
        assert!(wire["uuid"].is_string());
        assert!(wire["timestamp"].is_string());
    }

    #[test]
    fn test_validation_result_validity() {
        let mut result = ValidationResult::default();
        assert!(!result.is_valid());

        result.commands.push(Command::new("system_status", Map::new()));
        assert!(result.is_valid());

        result
            .issues
            .push(ValidationIssue::new("command.uuid", "UUID is required"));
        assert!(!result.is_valid());
    }
}
