use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Remote service error: {0}")]
    RemoteService(String),

    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Identifier pool exhausted: {0}")]
    IdentifierExhausted(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<toml::de::Error> for AppError {
    fn from(error: toml::de::Error) -> Self {
        AppError::Config(error.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
