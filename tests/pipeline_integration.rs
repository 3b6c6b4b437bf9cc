//! Integration tests for the command pipeline
//!
//! The LLM and the bridge are replaced with scripted doubles so every
//! scenario is deterministic: extraction fallback, compound-request
//! expansion, error recovery, and response aggregation.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use command_relay::bridge::{BridgeResponse, CommandBridge};
use command_relay::command::Command;
use command_relay::core::config::RelayConfig;
use command_relay::core::error::{RelayError, Result};
use command_relay::llm::LlmSender;
use command_relay::pipeline::{Pipeline, PipelineResponse};

/// Sender double that replays scripted completions and records prompts
#[derive(Default)]
struct ScriptedSender {
    send_replies: Mutex<VecDeque<String>>,
    custom_replies: Mutex<VecDeque<String>>,
    answer_reply: Option<String>,
    send_prompts: Mutex<Vec<String>>,
    custom_prompts: Mutex<Vec<String>>,
    answered: Mutex<Vec<String>>,
}

impl ScriptedSender {
    fn with_send(self, reply: impl Into<String>) -> Self {
        self.send_replies.lock().unwrap().push_back(reply.into());
        self
    }

    fn with_custom(self, reply: impl Into<String>) -> Self {
        self.custom_replies.lock().unwrap().push_back(reply.into());
        self
    }

    fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer_reply = Some(answer.into());
        self
    }

    fn custom_calls(&self) -> usize {
        self.custom_prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmSender for ScriptedSender {
    async fn send(&self, prompt: &str) -> Result<String> {
        self.send_prompts.lock().unwrap().push(prompt.to_string());
        self.send_replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| RelayError::LlmError("no scripted send reply".into()))
    }

    async fn answer(&self, user_text: &str) -> Result<String> {
        self.answered.lock().unwrap().push(user_text.to_string());
        self.answer_reply
            .clone()
            .ok_or_else(|| RelayError::LlmError("scripted answer failure".into()))
    }

    async fn complete_custom(&self, prompt: &str) -> Result<String> {
        self.custom_prompts.lock().unwrap().push(prompt.to_string());
        self.custom_replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| RelayError::LlmError("no scripted custom reply".into()))
    }
}

/// Bridge double that records sent commands and replays scripted
/// responses; once the script runs out it acknowledges with an `ok`
/// echoing the command payload.
#[derive(Default)]
struct ScriptedBridge {
    replies: Mutex<VecDeque<Option<BridgeResponse>>>,
    sent: Mutex<Vec<Command>>,
}

impl ScriptedBridge {
    fn with_reply(self, reply: Option<BridgeResponse>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    fn sent_commands(&self) -> Vec<Command> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandBridge for ScriptedBridge {
    async fn send_command(&self, command: &Command) -> Option<BridgeResponse> {
        self.sent.lock().unwrap().push(command.clone());
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => Some(BridgeResponse::ok(command.to_json())),
        }
    }
}

fn single(response: Option<PipelineResponse>) -> BridgeResponse {
    match response {
        Some(PipelineResponse::Single(response)) => response,
        other => panic!("expected a single response, got {other:?}"),
    }
}

fn many(response: Option<PipelineResponse>) -> Vec<BridgeResponse> {
    match response {
        Some(PipelineResponse::Many(responses)) => responses,
        other => panic!("expected a response list, got {other:?}"),
    }
}

/// Scenario A: invalid extraction falls back to a direct answer
#[tokio::test]
async fn fallback_answer_is_sent_when_command_is_invalid() {
    // Missing the required "answer" field to force validation failure
    let sender = ScriptedSender::default()
        .with_send(r#"{"action": "answer_question"}"#)
        .with_answer("готов ответ");
    let bridge = ScriptedBridge::default();
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("непонятный ввод")
        .await
        .unwrap();

    let response = single(response);
    assert_eq!(response.status, "ok");

    let sent = bridge.sent_commands();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].action, "answer_question");
    assert_eq!(sent[0].params["answer"], "готов ответ");
    assert!(!sent[0].uuid.is_empty());
    assert!(!sent[0].timestamp.is_empty());

    // Both the extraction prompt and the fallback call carried the text
    assert!(sender.send_prompts.lock().unwrap()[0].contains("непонятный ввод"));
    assert_eq!(sender.answered.lock().unwrap()[0], "непонятный ввод");
}

/// When even the answer call fails, a fixed apology is dispatched
#[tokio::test]
async fn fallback_apology_when_answer_call_fails() {
    let sender = ScriptedSender::default().with_send(r#"{"action": "answer_question"}"#);
    let bridge = ScriptedBridge::default();
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("непонятный ввод")
        .await
        .unwrap();

    assert_eq!(single(response).status, "ok");
    let sent = bridge.sent_commands();
    assert_eq!(sent[0].action, "answer_question");
    assert!(sent[0].params["answer"]
        .as_str()
        .unwrap()
        .contains("Не удалось распознать команду"));
}

/// When the fallback dispatch itself fails, the caller gets nothing
#[tokio::test]
async fn fallback_transport_failure_yields_none() {
    let sender = ScriptedSender::default()
        .with_send(r#"{"action": "answer_question"}"#)
        .with_answer("ready");
    let bridge = ScriptedBridge::default().with_reply(None);
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("вопрос")
        .await
        .unwrap();

    assert!(response.is_none());
}

/// Scenario B: a compound-looking request is expanded to a full plan
#[tokio::test]
async fn compound_request_is_expanded_into_multiple_commands() {
    let sender = ScriptedSender::default()
        .with_send(r#"{"action": "open_app", "params": {"application": "notepad"}}"#)
        .with_custom(
            json!([
                {"action": "open_app", "params": {"application": "notepad"}},
                {"action": "open_app", "params": {"application": "calculator"}},
            ])
            .to_string(),
        );
    let bridge = ScriptedBridge::default();
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("open notepad, then open the calculator")
        .await
        .unwrap();

    let responses = many(response);
    assert_eq!(responses.len(), 2);

    let sent = bridge.sent_commands();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].params["application"], "notepad");
    assert_eq!(sent[1].params["application"], "calculator");
}

/// Expansion keeps the original result when the plan has fewer than
/// two valid commands
#[tokio::test]
async fn expansion_keeps_original_when_plan_is_not_longer() {
    let sender = ScriptedSender::default()
        .with_send(r#"{"action": "open_app", "params": {"application": "notepad"}}"#)
        .with_custom(r#"[{"action": "open_app", "params": {"application": "notepad"}}]"#);
    let bridge = ScriptedBridge::default();
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("открой блокнот и всё")
        .await
        .unwrap();

    assert_eq!(single(response).status, "ok");
    assert_eq!(bridge.sent_commands().len(), 1);
    assert_eq!(sender.custom_calls(), 1);
}

/// Expansion is best-effort: a failing multi-step call never breaks
/// the original single-command result
#[tokio::test]
async fn expansion_failure_is_swallowed() {
    // No scripted custom reply, so the multi-step call errors
    let sender = ScriptedSender::default()
        .with_send(r#"{"action": "open_app", "params": {"application": "notepad"}}"#);
    let bridge = ScriptedBridge::default();
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("open notepad, please")
        .await
        .unwrap();

    assert_eq!(single(response).status, "ok");
    assert_eq!(bridge.sent_commands().len(), 1);
}

/// No expansion call is made when the text has no compound marker
#[tokio::test]
async fn no_expansion_without_compound_marker() {
    let sender = ScriptedSender::default()
        .with_send(r#"{"action": "open_app", "params": {"application": "notepad"}}"#);
    let bridge = ScriptedBridge::default();
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("open notepad")
        .await
        .unwrap();

    assert_eq!(single(response).status, "ok");
    assert_eq!(sender.custom_calls(), 0);
}

/// Scenario C: a bridge error triggers one LLM-corrected retry
#[tokio::test]
async fn bridge_error_is_recovered_with_a_corrected_command() {
    let sender = ScriptedSender::default()
        .with_send(r#"{"action": "open_app", "params": {"application": "dicsord"}}"#)
        .with_custom(r#"{"action": "open_app", "params": {"application": "discord"}}"#);
    let bridge =
        ScriptedBridge::default().with_reply(Some(BridgeResponse::error("Application not found")));
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("открой дискорд")
        .await
        .unwrap();

    let response = single(response);
    assert_eq!(response.status, "ok");

    let sent = bridge.sent_commands();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].params["application"], "dicsord");
    assert_eq!(sent[1].params["application"], "discord");

    let recovery_prompt = &sender.custom_prompts.lock().unwrap()[0];
    assert!(recovery_prompt.contains("Application not found"));
    assert!(recovery_prompt.contains("dicsord"));
}

/// A transport failure (no response at all) also triggers recovery
#[tokio::test]
async fn transport_failure_triggers_recovery() {
    let sender = ScriptedSender::default()
        .with_send(r#"{"action": "open_app", "params": {"application": "notepad"}}"#)
        .with_custom(r#"{"action": "open_app", "params": {"application": "notepad"}}"#);
    let bridge = ScriptedBridge::default().with_reply(None);
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("open notepad")
        .await
        .unwrap();

    assert_eq!(single(response).status, "ok");
    assert_eq!(bridge.sent_commands().len(), 2);
}

/// Recovery exhaustion returns the original error response unchanged
#[tokio::test]
async fn exhausted_recovery_returns_original_error() {
    // Corrected output is itself invalid (missing required answer)
    let sender = ScriptedSender::default()
        .with_send(r#"{"action": "open_app", "params": {"application": "dicsord"}}"#)
        .with_custom(r#"{"action": "answer_question"}"#);
    let bridge =
        ScriptedBridge::default().with_reply(Some(BridgeResponse::error("Application not found")));
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("открой дискорд")
        .await
        .unwrap();

    let response = single(response);
    assert!(response.is_error());
    assert_eq!(response.error.as_deref(), Some("Application not found"));
    assert_eq!(bridge.sent_commands().len(), 1);
}

/// Recovery depth is capped at one: a failing corrected command does
/// not trigger a second correction
#[tokio::test]
async fn recovery_runs_at_most_once() {
    let sender = ScriptedSender::default()
        .with_send(r#"{"action": "open_app", "params": {"application": "dicsord"}}"#)
        .with_custom(r#"{"action": "open_app", "params": {"application": "discord"}}"#);
    let bridge = ScriptedBridge::default()
        .with_reply(Some(BridgeResponse::error("Application not found")))
        .with_reply(Some(BridgeResponse::error("still broken")));
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("открой дискорд")
        .await
        .unwrap();

    // The corrected attempt's response stands, erroneous or not
    let response = single(response);
    assert_eq!(response.error.as_deref(), Some("still broken"));
    assert_eq!(bridge.sent_commands().len(), 2);
    assert_eq!(sender.custom_calls(), 1);
}

/// One failing sibling does not block the others; its recovered
/// response takes its spot in order
#[tokio::test]
async fn partial_failure_preserves_sibling_order() {
    let sender = ScriptedSender::default()
        .with_send(
            json!([
                {"action": "open_app", "params": {"application": "notepad"}},
                {"action": "adjust_setting", "params": {"setting": "volume", "value": "10"}},
            ])
            .to_string(),
        )
        .with_custom(
            r#"{"action": "adjust_setting", "params": {"setting": "volume", "value": "50"}}"#,
        );
    let bridge = ScriptedBridge::default()
        .with_reply(Some(BridgeResponse::ok(json!({"opened": "notepad"}))))
        .with_reply(Some(BridgeResponse::error("Invalid volume")));
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("everything at once")
        .await
        .unwrap();

    let responses = many(response);
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].result, Some(json!({"opened": "notepad"})));
    assert_eq!(responses[1].status, "ok");

    let sent = bridge.sent_commands();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[2].params["value"], "50");
}

/// Scenario D-style payload: a valid multi-command extraction is
/// dispatched in order without expansion or recovery
#[tokio::test]
async fn valid_multi_command_payload_round_trips() {
    let sender = ScriptedSender::default().with_send(
        json!([
            {"action": "system_status", "params": {}, "uuid": "u1", "timestamp": "2025-01-01T00:00:00Z"},
            {"action": "open_app", "params": {"application": "notepad"}, "uuid": "u2", "timestamp": "2025-01-01T00:00:00Z"},
        ])
        .to_string(),
    );
    let bridge = ScriptedBridge::default();
    let config = RelayConfig::default();

    let response = Pipeline::new(&sender, &bridge, &config)
        .process_text("status and notepad")
        .await
        .unwrap();

    let responses = many(response);
    assert_eq!(responses.len(), 2);

    let sent = bridge.sent_commands();
    assert_eq!(sent[0].action, "system_status");
    assert_eq!(sent[0].uuid, "u1");
    assert_eq!(sent[1].action, "open_app");
}

/// A failure on the very first LLM call propagates to the caller
#[tokio::test]
async fn extraction_failure_propagates() {
    let sender = ScriptedSender::default();
    let bridge = ScriptedBridge::default();
    let config = RelayConfig::default();

    let result = Pipeline::new(&sender, &bridge, &config)
        .process_text("anything")
        .await;

    assert!(result.is_err());
    assert!(bridge.sent_commands().is_empty());
}
