use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Request could not be delivered: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("Remote answered {status} for {url}: {body}")]
    RemoteStatusError { status: StatusCode, url: String, body: String },

    #[error("Timed out: {0}")]
    TimeoutError(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl Error {
    /// Short text shown to the operator. Validation messages are already written for humans
    /// and are passed through; everything remote collapses into a generic line.
    pub fn user_message(&self) -> String {
        match self {
            Error::ValidationError(message) => message.clone(),
            Error::ConfigError(message) => format!("Configuration error: {}", message),
            Error::ExecutionFailed(_) => "Execution failed. Please try again.".to_string(),
            Error::TimeoutError(_) => "The request timed out.".to_string(),
            Error::TransportError(_) => "Could not reach the orchestrator.".to_string(),
            Error::RemoteStatusError { status, .. } => format!("The orchestrator rejected the request ({}).", status),
            Error::IoError(e) => format!("File error: {}", e),
            Error::DeserializationError(_) => "Received an unreadable response.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
