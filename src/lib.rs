//! Command Relay - voice/text commands to structured bridge dispatch

pub mod bridge;
pub mod command;
pub mod core;
pub mod llm;
pub mod pipeline;
