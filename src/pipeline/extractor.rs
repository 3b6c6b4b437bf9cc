//! Turn free-form user text into validated commands

use serde_json::Value;

use crate::command::backfill::ensure_required_fields;
use crate::command::validate::validate_command;
use crate::command::ValidationResult;
use crate::core::error::Result;
use crate::llm::parser::parse_json_safely;
use crate::llm::{prompts, LlmSender};

/// Parse, backfill, and validate one raw LLM completion.
///
/// Shared by extraction, compound-request expansion, and error
/// recovery, which all consume the same command JSON dialect.
pub(crate) fn interpret_raw(raw: &str) -> Result<ValidationResult> {
    let data: Value = parse_json_safely(raw)?;
    let enriched = ensure_required_fields(data);
    Ok(validate_command(&enriched))
}

/// Calls the LLM and validates its JSON output.
///
/// Transport and parse failures propagate to the caller unmodified;
/// retry policy lives in the pipeline, not here.
pub struct IntentExtractor<'a> {
    sender: &'a dyn LlmSender,
    available_apps: Vec<String>,
}

impl<'a> IntentExtractor<'a> {
    pub fn new(sender: &'a dyn LlmSender) -> Self {
        Self {
            sender,
            available_apps: Vec::new(),
        }
    }

    /// Include known application names as hints in the prompt
    pub fn with_available_apps(mut self, apps: Vec<String>) -> Self {
        self.available_apps = apps;
        self
    }

    pub async fn extract(&self, text: &str) -> Result<ValidationResult> {
        tracing::debug!(%text, "extracting intent");
        let prompt = prompts::build_prompt(text, &self.available_apps);
        let raw = self.sender.send(&prompt).await?;
        interpret_raw(&raw)
    }
}
