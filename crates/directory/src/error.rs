use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Authorization failed, have you sourced your openrc? ({0})")]
    Unauthorized(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Directory returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Directory request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid fixture: {0}")]
    Fixture(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;
