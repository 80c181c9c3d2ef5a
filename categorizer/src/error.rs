use std::time::Duration;

use derive_more::derive::Display;

pub type CategorizerResult<T> = Result<T, CategorizerError>;

#[derive(Debug, Display)]
pub enum CategorizerError {
    #[display("Configuration error: {_0}")]
    Config(config::ConfigError),
    #[display("Invalid configuration: {_0}")]
    InvalidConfig(String),
    #[display("Invalid email: {_0}")]
    InvalidEmail(String),
    #[display("Vectorization produced an empty vocabulary")]
    EmptyVocabulary,
    #[display("Clustering failed: {_0}")]
    Clustering(String),
    #[display("LLM error: {_0}")]
    Llm(String),
    #[display("LLM request timed out after {}s", _0.as_secs_f32())]
    LlmTimeout(Duration),
    #[display("HTTP error: {_0}")]
    Http(reqwest::Error),
    #[display("Internal error: {_0}")]
    Internal(anyhow::Error),
}

impl std::error::Error for CategorizerError {}

impl From<anyhow::Error> for CategorizerError {
    fn from(error: anyhow::Error) -> Self {
        CategorizerError::Internal(error)
    }
}

impl From<config::ConfigError> for CategorizerError {
    fn from(error: config::ConfigError) -> Self {
        CategorizerError::Config(error)
    }
}

impl From<reqwest::Error> for CategorizerError {
    fn from(error: reqwest::Error) -> Self {
        tracing::error!("Reqwest error: {:?}", error);
        if error.is_timeout() {
            return CategorizerError::LlmTimeout(Duration::ZERO);
        }
        CategorizerError::Http(error)
    }
}

impl From<serde_json::Error> for CategorizerError {
    fn from(error: serde_json::Error) -> Self {
        CategorizerError::InvalidEmail(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for CategorizerError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        CategorizerError::LlmTimeout(Duration::ZERO)
    }
}

impl CategorizerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CategorizerError::LlmTimeout(_))
    }
}
