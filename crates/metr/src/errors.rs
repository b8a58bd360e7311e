use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the search backend
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API error: {status}")]
    Status { status: StatusCode },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Response stream interrupted: {0}")]
    Stream(reqwest::Error),
}

impl ApiError {
    /// HTTP status carried by a non-2xx response, if that is what failed
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status } => Some(*status),
            ApiError::Request(err) | ApiError::Stream(err) => err.status(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Failures surfaced by the chat controller
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Cannot send an empty message")]
    EmptyQuery,

    #[error("A reply is still streaming, wait for it to finish")]
    Busy,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Conversation store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ApiError::Status {
            status: StatusCode::BAD_GATEWAY,
        };
        assert_eq!(err.to_string(), "API error: 502 Bad Gateway");
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn test_chat_error_wraps_api_error() {
        let err: ChatError = ApiError::Status {
            status: StatusCode::NOT_FOUND,
        }
        .into();
        assert!(matches!(err, ChatError::Api(_)));
        assert_eq!(err.to_string(), "API error: 404 Not Found");
    }
}
