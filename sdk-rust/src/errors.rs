use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The request to the provider failed or the parsing of the response
    /// failed.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The request returned a non-success status code
    #[error("Status error: {1} (Status {0})")]
    StatusCode(reqwest::StatusCode, String),
    /// The operation is not offered by this binding
    /// (e.g. image generation over the chat completions shape)
    #[error("Unsupported by {0}: {1}")]
    Unsupported(&'static str, String),
    /// The response from the provider was unexpected. (e.g. an undecodable
    /// stream chunk or invalid base64 in inline data)
    #[error("Invariant from {0}: {1}")]
    Invariant(&'static str, String),
    /// The model refused to process the input.
    #[error("Refusal: {0}")]
    Refusal(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
