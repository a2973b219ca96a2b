use crate::model::ServerError;
use itertools::Itertools;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-JSON response with an unexpected status. Fatal to the operation, never retried.
    #[error("Got \"{status_text}\" from {method} request at {url}")]
    Protocol {
        status_text: String,
        method: String,
        url: String,
    },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A single-flight guard rejected a concurrent operation on the same key.
    #[error("operation already in flight for {0}")]
    Busy(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A typed read received an `{errors: [...]}` document instead of data.
    #[error("server rejected request: {}", render_errors(.0))]
    Rejected(Vec<ServerError>),
}

fn render_errors(errors: &[ServerError]) -> String {
    errors.iter().map(ServerError::render).join("; ")
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
