use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model request failed to send: {0}")]
    Transport(String),

    #[error("Model API rejected the credentials (status {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("Model API rate limit reached: {0}")]
    RateLimited(String),

    /// The API refused the request shape itself, e.g. a schema constraint the
    /// selected model does not support.
    #[error("Model API rejected the request: {0}")]
    MalformedRequest(String),

    #[error("Model request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Model response could not be decoded: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelError::Authentication {
                status: status.as_u16(),
                message,
            },
            StatusCode::TOO_MANY_REQUESTS => ModelError::RateLimited(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ModelError::MalformedRequest(message)
            }
            _ => ModelError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    pub fn is_malformed_request(&self) -> bool {
        matches!(self, ModelError::MalformedRequest(_))
    }
}
