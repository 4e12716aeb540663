use sitegraph_redirect::RedirectError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Rule set rejected: {0}")]
    Redirect(#[from] RedirectError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Analysis pass cancelled")]
    Cancelled,

    #[error("Analysis task failed: {0}")]
    TaskFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        CoreError::TaskFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
