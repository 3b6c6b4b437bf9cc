//! Command Relay - Entry Point
//!
//! Interactive demo front-end for the command pipeline: reads user
//! text from stdin (or a one-shot --text argument), runs it through
//! extraction/validation/dispatch, and prints the bridge's JSON
//! response.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;
use tokio::runtime::Runtime;

use command_relay::bridge::HttpBridge;
use command_relay::core::config::RelayConfig;
use command_relay::core::error::Result;
use command_relay::llm::{EchoSender, LlmSender, PromptSender};
use command_relay::pipeline::{Pipeline, PipelineResponse};

#[derive(Parser)]
#[command(name = "command-relay", about = "Relay text commands to the desktop bridge")]
struct Args {
    /// Bridge endpoint override (default: RELAY_BRIDGE_ENDPOINT or http://localhost:5055)
    #[arg(long)]
    endpoint: Option<String>,

    /// Process a single query and print the JSON result
    #[arg(long)]
    text: Option<String>,

    /// Path to the known-applications registry JSON
    #[arg(long)]
    app_registry: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "command_relay=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = RelayConfig::from_env();
    if let Some(endpoint) = args.endpoint {
        config.bridge_endpoint = endpoint;
    }
    if let Some(registry) = args.app_registry {
        config.app_registry_path = Some(registry);
    }

    // Fall back to the offline echo sender so the pipeline can be
    // exercised without an API key.
    let sender: Box<dyn LlmSender> = match PromptSender::from_env() {
        Ok(sender) => Box::new(sender),
        Err(_) => {
            tracing::warn!("LLM_API_KEY not set - using the offline echo sender");
            Box::new(EchoSender)
        }
    };

    let bridge = HttpBridge::from_config(&config);
    let rt = Runtime::new()?;

    if let Some(text) = args.text {
        let pipeline = Pipeline::new(sender.as_ref(), &bridge, &config);
        match rt.block_on(pipeline.process_text(&text)) {
            Ok(response) => println!(
                "{}",
                serde_json::json!({"status": "ok", "result": response_to_json(response)})
            ),
            Err(error) => {
                println!(
                    "{}",
                    serde_json::json!({"status": "error", "error": error.to_string()})
                );
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    println!("=== COMMAND RELAY ===");
    println!("Type a request to relay it to the bridge at {}", bridge.endpoint());
    println!();
    println!("Commands:");
    println!("  status          - Check bridge availability");
    println!("  quit / q        - Exit");
    println!("  <any text>      - Natural language request");
    println!();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "q" {
            break;
        }
        if input == "status" {
            match rt.block_on(bridge.get_status()) {
                Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
                None => println!("Bridge is unreachable."),
            }
            continue;
        }

        let pipeline = Pipeline::new(sender.as_ref(), &bridge, &config);
        match rt.block_on(pipeline.process_text(input)) {
            Ok(Some(response)) => {
                println!("{}", serde_json::to_string_pretty(&response_to_json(Some(response)))?)
            }
            Ok(None) => println!("No response from the bridge."),
            Err(error) => println!("Error: {error}"),
        }
    }

    Ok(())
}

fn response_to_json(response: Option<PipelineResponse>) -> Value {
    match response {
        None => Value::Null,
        Some(PipelineResponse::Single(response)) => {
            serde_json::to_value(response).unwrap_or(Value::Null)
        }
        Some(PipelineResponse::Many(responses)) => {
            serde_json::to_value(responses).unwrap_or(Value::Null)
        }
    }
}
