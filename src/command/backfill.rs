//! Backfill bookkeeping fields the LLM tends to omit
//!
//! Models regularly echo the prompt's template hints (`<uuid>`, the
//! example date) or flatten action parameters to the top level instead
//! of nesting them under `params`. Everything here repairs those
//! shapes before validation; it never rejects anything, the validator
//! does that.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::command::{now_timestamp, required_params};

/// Example date literal used in prompt templates; a timestamp carrying
/// it was copied from the prompt, not generated.
const TEMPLATE_EXAMPLE_DATE: &str = "2024-01-01";

/// Fill in `uuid`/`timestamp` and fold misplaced action parameters
/// into `params`.
///
/// Accepts a single command object, a list of commands, or a wrapper
/// object with a `commands` list. Non-object list entries pass through
/// unchanged so the validator can flag them explicitly.
pub fn ensure_required_fields(data: Value) -> Value {
    match data {
        Value::Array(entries) => Value::Array(backfill_collection(entries)),
        Value::Object(mut object) => {
            if let Some(Value::Array(entries)) = object.remove("commands") {
                object.insert("commands".into(), Value::Array(backfill_collection(entries)));
                Value::Object(object)
            } else if object.contains_key("commands") {
                // `commands` present but not a list: leave the wrapper
                // intact for the validator's structural check.
                Value::Object(object)
            } else {
                backfill_command(object)
            }
        }
        other => other,
    }
}

fn backfill_collection(entries: Vec<Value>) -> Vec<Value> {
    entries
        .into_iter()
        .map(|entry| match entry {
            Value::Object(object) => backfill_command(object),
            other => other,
        })
        .collect()
}

fn backfill_command(command: Map<String, Value>) -> Value {
    let action = command.get("action").cloned().unwrap_or(Value::Null);

    let mut params = match command.get("params") {
        Some(Value::Object(params)) => params.clone(),
        _ => Map::new(),
    };

    // Copy action parameters the model left as top-level siblings.
    if let Some(required) = action.as_str().and_then(required_params) {
        for name in required {
            if !params.contains_key(*name) {
                if let Some(value) = command.get(*name) {
                    params.insert((*name).into(), value.clone());
                }
            }
        }
    }

    let uuid = match command.get("uuid").and_then(Value::as_str) {
        Some(value) if !value.is_empty() && !value.starts_with('<') => value.to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    let timestamp = match command.get("timestamp").and_then(Value::as_str) {
        Some(value) if !value.is_empty() && !value.contains(TEMPLATE_EXAMPLE_DATE) => {
            value.to_string()
        }
        _ => now_timestamp(),
    };

    serde_json::json!({
        "action": action,
        "params": params,
        "uuid": uuid,
        "timestamp": timestamp,
    })
}
