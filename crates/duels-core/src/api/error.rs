use serde::Deserialize;
use thiserror::Error;

use crate::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized(Option<String>),

    #[error("Rejected with status {status}: {body}")]
    Rejected {
        status: u16,
        message: Option<String>,
        body: String,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body written by the duels API: `{"message": "...", "status": 400}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the user-facing message out of an error body. Falls back to the
    /// raw text when the body is not the API's JSON error shape.
    fn extract_message(body: &str) -> Option<String> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return None;
        }
        match serde_json::from_str::<ErrorBody>(trimmed) {
            Ok(parsed) => parsed.message.filter(|m| !m.is_empty()),
            Err(_) => Some(Self::truncate_body(trimmed)),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::extract_message(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            code => ApiError::Rejected {
                status: code,
                message,
                body: Self::truncate_body(body),
            },
        }
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(message) => Error::RemoteRejected {
                status: 401,
                message,
            },
            ApiError::Rejected {
                status, message, ..
            } => Error::RemoteRejected { status, message },
            ApiError::NetworkError(e) if e.is_decode() => {
                Error::NetworkFailure(format!("malformed response: {}", e))
            }
            ApiError::NetworkError(e) => Error::NetworkFailure(e.to_string()),
            ApiError::InvalidResponse(msg) => Error::NetworkFailure(msg),
        }
    }
}
