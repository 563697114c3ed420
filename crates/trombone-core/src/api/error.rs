use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced by the API access layer.
///
/// The three runtime classes (`Transport`, `Application`, `Decode`) are passed
/// through the fetcher and the cache unchanged; interpreting them is up to the
/// caller.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request failed with status {status}: {body}")]
    Application { status: StatusCode, body: String },

    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No API provider mounted in this scope")]
    NoProvider,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }

        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        ApiError::Application {
            status,
            body: Self::truncate_body(body),
        }
    }

    /// HTTP status of an application error
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Application { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    pub fn is_application(&self) -> bool {
        matches!(self, ApiError::Application { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, ApiError::Decode(_))
    }
}
