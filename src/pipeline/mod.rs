//! End-to-end command pipeline
//!
//! Drives the full flow for one utterance:
//! extract -> expand compound requests -> dispatch each command with
//! one level of error recovery -> aggregate responses. When nothing
//! valid could be extracted, the pipeline falls back to a direct
//! natural-language answer instead of failing.
//!
//! Recovery depth is capped structurally: `dispatch_with_one_recovery`
//! re-dispatches corrected commands through `dispatch_once` only, so a
//! correction can never trigger a second correction.

pub mod extractor;

pub use extractor::IntentExtractor;

use serde_json::{Map, Value};

use crate::bridge::{BridgeResponse, CommandBridge};
use crate::command::{Command, ValidationIssue};
use crate::core::config::RelayConfig;
use crate::core::error::Result;
use crate::llm::{prompts, LlmSender};
use extractor::interpret_raw;

/// Apology used when even the direct-answer fallback fails
const FALLBACK_APOLOGY: &str = "Не удалось распознать команду и получить ответ от модели. \
Пожалуйста, повторите запрос.";

/// Aggregated outcome of one pipeline invocation
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineResponse {
    /// Exactly one command produced a response
    Single(BridgeResponse),
    /// Multiple commands (or a recovered command fan-out) responded
    Many(Vec<BridgeResponse>),
}

/// The command pipeline, wired to its two external capabilities.
///
/// Stateless between invocations: each `process_text` call owns its
/// working data.
pub struct Pipeline<'a> {
    sender: &'a dyn LlmSender,
    bridge: &'a dyn CommandBridge,
    config: &'a RelayConfig,
    available_apps: Vec<String>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        sender: &'a dyn LlmSender,
        bridge: &'a dyn CommandBridge,
        config: &'a RelayConfig,
    ) -> Self {
        let available_apps = match &config.app_registry_path {
            Some(path) => match prompts::load_available_applications(path) {
                Ok(apps) => apps,
                Err(error) => {
                    tracing::warn!(%error, path = %path.display(), "could not read app registry");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        Self {
            sender,
            bridge,
            config,
            available_apps,
        }
    }

    /// Process one utterance and forward the resulting commands.
    ///
    /// Returns `Ok(None)` when nothing could be sent (even the
    /// fallback dispatch failed). Only a failure during the initial
    /// extraction propagates as an error; every later step degrades
    /// instead of unwinding.
    pub async fn process_text(&self, text: &str) -> Result<Option<PipelineResponse>> {
        let result = IntentExtractor::new(self.sender)
            .with_available_apps(self.available_apps.clone())
            .extract(text)
            .await?;
        let result = self.expand_compound_request(text, result).await;

        if result.commands.is_empty() {
            log_validation_issues("no valid command extracted", &result.issues);
            let fallback = self.build_fallback_answer(text).await;
            let response = self.dispatch_once(&fallback).await;
            return Ok(response.map(PipelineResponse::Single));
        }

        if !result.issues.is_empty() {
            log_validation_issues("partial validation issues", &result.issues);
        }

        let mut responses = Vec::new();
        for command in &result.commands {
            responses.extend(self.dispatch_with_one_recovery(text, command).await);
        }

        Ok(match responses.len() {
            0 => None,
            1 => responses.into_iter().next().map(PipelineResponse::Single),
            _ => Some(PipelineResponse::Many(responses)),
        })
    }

    /// Ask for a multi-step plan when the text looks compound but only
    /// one command was extracted. Best-effort: on any failure, or when
    /// the re-derived plan has fewer than two valid commands, the
    /// original result is kept.
    async fn expand_compound_request(
        &self,
        text: &str,
        result: crate::command::ValidationResult,
    ) -> crate::command::ValidationResult {
        if result.commands.len() != 1 || !self.config.looks_multi_action(text) {
            return result;
        }

        tracing::info!("potentially compound request; asking for a multi-step plan");
        let expanded = match self.request_multistep_plan(text).await {
            Ok(expanded) => expanded,
            Err(error) => {
                tracing::warn!(%error, "unable to expand compound request");
                return result;
            }
        };

        if expanded.commands.len() < 2 {
            return result;
        }
        log_validation_issues("expanded plan validation issues", &expanded.issues);
        expanded
    }

    async fn request_multistep_plan(&self, text: &str) -> Result<crate::command::ValidationResult> {
        let raw = self
            .sender
            .complete_custom(&prompts::build_multistep_prompt(text))
            .await?;
        interpret_raw(&raw)
    }

    /// Ask the LLM to answer directly when no command could be parsed.
    /// Never fails: a broken answer call yields a fixed apology.
    async fn build_fallback_answer(&self, text: &str) -> Command {
        let answer_text = match self.sender.answer(text).await {
            Ok(answer) => {
                tracing::info!(%answer, "fallback answer from LLM");
                answer
            }
            Err(error) => {
                tracing::error!(%error, "failed to obtain fallback answer");
                FALLBACK_APOLOGY.to_string()
            }
        };

        let mut params = Map::new();
        params.insert("answer".into(), Value::String(answer_text));
        Command::new("answer_question", params)
    }

    /// Single dispatch attempt, no recovery
    async fn dispatch_once(&self, command: &Command) -> Option<BridgeResponse> {
        self.bridge.send_command(command).await
    }

    /// Dispatch a command; on an erroneous response, run the recovery
    /// sub-protocol once. Returns the responses that should stand in
    /// for this command in the aggregate (empty when nothing usable
    /// came back).
    async fn dispatch_with_one_recovery(
        &self,
        original_text: &str,
        command: &Command,
    ) -> Vec<BridgeResponse> {
        let response = self.dispatch_once(command).await;
        match response {
            Some(response) if !response.is_error() => vec![response],
            erroneous => self.attempt_recovery(original_text, command, erroneous).await,
        }
    }

    /// Ask the LLM for corrected commands and dispatch them without
    /// further recovery. Falls back to the original erroneous response
    /// when the attempt fails or yields nothing usable.
    async fn attempt_recovery(
        &self,
        original_text: &str,
        failed_command: &Command,
        error_response: Option<BridgeResponse>,
    ) -> Vec<BridgeResponse> {
        tracing::warn!(
            action = %failed_command.action,
            "bridge returned an error; requesting corrected commands"
        );

        let error_payload = error_response
            .as_ref()
            .and_then(|response| serde_json::to_value(response).ok())
            .unwrap_or_else(|| Value::Object(Map::new()));

        let recovery_result = match self
            .request_recovery_plan(original_text, failed_command, &error_payload)
            .await
        {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(%error, "failed to obtain recovery commands");
                return keep_original(error_response);
            }
        };

        log_validation_issues("recovery validation issues", &recovery_result.issues);
        if recovery_result.commands.is_empty() {
            return keep_original(error_response);
        }

        let mut responses = Vec::new();
        for command in &recovery_result.commands {
            if let Some(response) = self.dispatch_once(command).await {
                responses.push(response);
            }
        }

        if responses.is_empty() {
            keep_original(error_response)
        } else {
            responses
        }
    }

    async fn request_recovery_plan(
        &self,
        original_text: &str,
        failed_command: &Command,
        error_payload: &Value,
    ) -> Result<crate::command::ValidationResult> {
        let prompt = prompts::build_error_resolution_prompt(
            original_text,
            &failed_command.to_json(),
            error_payload,
        );
        let raw = self.sender.complete_custom(&prompt).await?;
        interpret_raw(&raw)
    }
}

/// When recovery is exhausted, the original response (if any) stands
fn keep_original(error_response: Option<BridgeResponse>) -> Vec<BridgeResponse> {
    error_response.map(|response| vec![response]).unwrap_or_default()
}

fn log_validation_issues(context: &str, issues: &[ValidationIssue]) {
    if issues.is_empty() {
        return;
    }
    let messages: Vec<String> = issues
        .iter()
        .map(|issue| format!("{}: {}", issue.field, issue.message))
        .collect();
    tracing::warn!(issues = %messages.join("; "), "{context}");
}
