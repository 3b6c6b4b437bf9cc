//! LLM integration: provider client, prompt templates, output parsing
//!
//! The rest of the crate talks to the model through the [`LlmSender`]
//! capability so tests and local development can swap in doubles
//! without touching the pipeline.

pub mod client;
pub mod parser;
pub mod prompts;

use async_trait::async_trait;

use crate::core::error::Result;

/// Capability for sending prompts to a chat-completion backend.
///
/// Implementations are expected to be slow and fallible; callers own
/// all retry policy.
#[async_trait]
pub trait LlmSender: Send + Sync {
    /// Send the command-extraction prompt and return the raw completion
    async fn send(&self, prompt: &str) -> Result<String>;

    /// Ask for a direct natural-language answer to the user's text
    async fn answer(&self, user_text: &str) -> Result<String>;

    /// Send a fully custom prompt (multi-step plans, error resolution)
    async fn complete_custom(&self, prompt: &str) -> Result<String>;
}

pub use client::{EchoSender, LlmClient, PromptSender};
pub use parser::parse_json_safely;
