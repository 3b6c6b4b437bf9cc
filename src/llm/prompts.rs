//! Prompt templates for command extraction, planning, and recovery

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::command::ALLOWED_ACTIONS;
use crate::core::error::Result;

/// System prompt for the command-extraction call.
///
/// The `<generated>` uuid hint and the `2024-01-01` example timestamp
/// are deliberate: models that echo them verbatim are caught by the
/// backfiller and given real values.
pub const COMMAND_SYSTEM_PROMPT: &str = r#"You are an on-device assistant for a desktop computer.
Understand the user's intent and map it to structured JSON commands.

OUTPUT FORMAT (JSON only, no explanation):
{
  "action": "<one of the allowed actions>",
  "params": { <required parameters for the action> },
  "uuid": "<generated>",
  "timestamp": "2024-01-01T00:00:00Z"
}

For a request with several sequential steps, output a JSON list of
command objects in execution order.

The user may speak Russian or English. If the request is a question
rather than an instruction, use the "answer_question" action with the
answer text in params.
"#;

/// System prompt for the direct-answer fallback call
pub const ANSWER_SYSTEM_PROMPT: &str = "You are a concise desktop assistant. \
Answer the user's question directly in the language it was asked, \
in plain text, without JSON.";

/// Render the allowed-action table for inclusion in prompts
fn actions_catalog() -> String {
    let mut catalog = String::from("ALLOWED ACTIONS:\n");
    for (action, params) in ALLOWED_ACTIONS {
        if params.is_empty() {
            catalog.push_str(&format!("- {action}: no parameters\n"));
        } else {
            catalog.push_str(&format!("- {action}: requires {}\n", params.join(", ")));
        }
    }
    catalog
}

/// Compose the user message for the command-extraction call.
///
/// Known application names are included as hints so `open_app` targets
/// match what the bridge can actually launch.
pub fn build_prompt(user_message: &str, available_apps: &[String]) -> String {
    let mut prompt = actions_catalog();
    if !available_apps.is_empty() {
        prompt.push_str(&format!(
            "\nKNOWN APPLICATIONS: {}\n",
            available_apps.join(", ")
        ));
    }
    prompt.push_str(&format!("\nUSER REQUEST:\n{user_message}\n"));
    prompt
}

/// Prompt asking the model to re-derive a compound request as a full
/// multi-step plan.
pub fn build_multistep_prompt(user_message: &str) -> String {
    format!(
        "{catalog}\nThe following request contains several sequential actions. \
Break it into a JSON list of command objects, one per step, in \
execution order. Output the list only.\n\nUSER REQUEST:\n{user_message}\n",
        catalog = actions_catalog()
    )
}

/// Prompt asking the model to correct a command the bridge rejected
pub fn build_error_resolution_prompt(
    user_message: &str,
    failed_command: &Value,
    error_response: &Value,
) -> String {
    format!(
        "{catalog}\nThe command below was rejected by the execution service. \
Produce a corrected command (or a JSON list of commands) that fulfills \
the original request. Output JSON only.\n\nORIGINAL REQUEST:\n{user_message}\n\n\
FAILED COMMAND:\n{failed_command}\n\nSERVICE ERROR:\n{error_response}\n",
        catalog = actions_catalog()
    )
}

#[derive(Deserialize)]
struct ApplicationEntry {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Load known application names and aliases from a registry file.
///
/// The registry is a JSON list of `{ "name": ..., "aliases": [...] }`
/// entries maintained alongside the bridge service.
pub fn load_available_applications(registry_path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(registry_path)?;
    let entries: Vec<ApplicationEntry> = serde_json::from_str(&raw)?;

    let mut apps = Vec::new();
    for entry in entries {
        apps.push(entry.name);
        apps.extend(entry.aliases);
    }
    Ok(apps)
}
