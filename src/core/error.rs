use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("empty response from LLM")]
    EmptyResponse,

    #[error("LLM did not return valid JSON at line {line}, column {column}: {snippet}")]
    JsonExtraction {
        line: usize,
        column: usize,
        snippet: String,
    },

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
