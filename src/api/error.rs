use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - session rejected by server")]
    Unauthorized,

    #[error("Request rejected by server (code {code})")]
    Rejected { code: i64, message: Option<String> },

    #[error("Server returned status {status}")]
    Status { status: u16, message: Option<String> },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Minimal view of an error response body, just enough to recover the
/// backend's human-readable message when one is present.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid carrying excessive data.
    /// Cuts at a char boundary so multi-byte content cannot panic the slice.
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..end],
            body.len()
        )
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if status.as_u16() == 401 {
            return ApiError::Unauthorized;
        }
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message);
        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }

    pub(crate) fn invalid_response(detail: impl std::fmt::Display, body: &str) -> Self {
        ApiError::InvalidResponse(format!("{}: {}", detail, Self::truncate_body(body)))
    }

    /// The backend's message for this failure, when it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { message, .. } | ApiError::Status { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }
}
