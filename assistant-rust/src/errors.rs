use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;
