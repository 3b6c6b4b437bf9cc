//! Validate raw LLM payloads against the bridge action schema
//!
//! Validation never fails with an error: every problem becomes a
//! `ValidationIssue` so the pipeline can decide on policy (fallback,
//! partial dispatch) instead of unwinding. Commands are validated
//! independently; a malformed entry does not block its siblings.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::command::{required_params, Command, ValidationIssue, ValidationResult};

/// Validate and normalize incoming JSON from the LLM.
///
/// Accepts a single command object, a bare list of commands, or a
/// wrapper object with a `commands` list.
pub fn validate_command(data: &Value) -> ValidationResult {
    let mut result = ValidationResult::default();

    let entries: Vec<&Value> = match data {
        Value::Array(entries) => entries.iter().collect(),
        Value::Object(object) => match object.get("commands") {
            Some(Value::Array(entries)) => entries.iter().collect(),
            Some(_) => {
                result.issues.push(ValidationIssue::new(
                    "commands",
                    "Commands must be a list",
                ));
                return result;
            }
            None => vec![data],
        },
        _ => {
            result.issues.push(ValidationIssue::new(
                "command",
                "Payload must be an object or a list of objects",
            ));
            return result;
        }
    };

    let single = entries.len() == 1;
    for (index, entry) in entries.iter().enumerate() {
        let prefix = if single {
            "command".to_string()
        } else {
            format!("commands[{index}]")
        };
        if let Some(command) = validate_entry(entry, &prefix, &mut result.issues) {
            result.commands.push(command);
        }
    }

    result
}

fn validate_entry(
    entry: &Value,
    prefix: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Command> {
    let Some(object) = entry.as_object() else {
        issues.push(ValidationIssue::new(prefix, "Command must be an object"));
        return None;
    };

    let mut entry_issues = Vec::new();

    let action = object.get("action").and_then(Value::as_str);
    let required = action.and_then(required_params);
    if required.is_none() {
        entry_issues.push(ValidationIssue::new(
            format!("{prefix}.action"),
            "Unsupported or missing action",
        ));
    }

    let params: Map<String, Value> = match object.get("params") {
        Some(Value::Object(params)) => params.clone(),
        _ => {
            entry_issues.push(ValidationIssue::new(
                format!("{prefix}.params"),
                "Params must be an object",
            ));
            Map::new()
        }
    };

    for name in required.unwrap_or(&[]) {
        if !params.contains_key(*name) {
            entry_issues.push(ValidationIssue::new(
                format!("{prefix}.params.{name}"),
                "Missing required field",
            ));
        }
    }

    let uuid = object.get("uuid").and_then(Value::as_str);
    if uuid.map_or(true, str::is_empty) {
        entry_issues.push(ValidationIssue::new(
            format!("{prefix}.uuid"),
            "UUID is required",
        ));
    }

    let timestamp = object.get("timestamp").and_then(Value::as_str);
    match timestamp {
        None => entry_issues.push(ValidationIssue::new(
            format!("{prefix}.timestamp"),
            "Timestamp is required",
        )),
        Some(value) if !is_iso8601(value) => entry_issues.push(ValidationIssue::new(
            format!("{prefix}.timestamp"),
            "Timestamp must be ISO 8601",
        )),
        Some(_) => {}
    }

    if !entry_issues.is_empty() {
        issues.append(&mut entry_issues);
        return None;
    }

    // All checks passed above, so the unwraps cannot fire.
    Some(Command {
        action: action.unwrap_or_default().to_string(),
        params,
        uuid: uuid.unwrap_or_default().to_string(),
        timestamp: timestamp.unwrap_or_default().to_string(),
    })
}

/// Accepts RFC 3339 (including a trailing `Z`), naive datetimes, and
/// bare dates.
fn is_iso8601(value: &str) -> bool {
    if DateTime::parse_from_rfc3339(value).is_ok() {
        return true;
    }
    let naive = value.strip_suffix('Z').unwrap_or(value);
    naive.parse::<NaiveDateTime>().is_ok() || naive.parse::<NaiveDate>().is_ok()
}
