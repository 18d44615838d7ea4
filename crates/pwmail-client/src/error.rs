//! Client error types

use reqwest::StatusCode;
use thiserror::Error;

use crate::ExitCode;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not reach server: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("Request rejected: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Mail not found")]
    NotFound,

    #[error("Server error ({status}): {message}")]
    Server { status: StatusCode, message: String },

    #[error("Unexpected response: {0}")]
    Protocol(String),
}

impl ClientError {
    /// Map a non-success HTTP status and its error message
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::BAD_REQUEST => ClientError::BadRequest(message),
            StatusCode::NOT_FOUND => ClientError::NotFound,
            status => ClientError::Server { status, message },
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            ClientError::InvalidCredential(_) | ClientError::InvalidInput(_) | ClientError::Io { .. } => {
                ExitCode::InvalidInput
            }
            ClientError::Connection(_) => ExitCode::ConnectionFailed,
            ClientError::Unauthorized(_) => ExitCode::AuthenticationFailed,
            ClientError::BadRequest(_) => ExitCode::InvalidInput,
            ClientError::NotFound => ExitCode::NotFound,
            ClientError::Server { .. } | ClientError::Protocol(_) => ExitCode::ServerError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ClientError::from_status(StatusCode::UNAUTHORIZED, "replayed".into()),
            ClientError::Unauthorized(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::BAD_REQUEST, "bad".into()),
            ClientError::BadRequest(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::NOT_FOUND, String::new()),
            ClientError::NotFound
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::BAD_GATEWAY, String::new()),
            ClientError::Server { .. }
        ));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            ClientError::Unauthorized(String::new()).exit_code(),
            ExitCode::AuthenticationFailed
        );
        assert_eq!(ClientError::NotFound.exit_code(), ExitCode::NotFound);
        assert_eq!(
            ClientError::InvalidCredential(String::new()).exit_code(),
            ExitCode::InvalidInput
        );
        assert_eq!(
            ClientError::Protocol(String::new()).exit_code(),
            ExitCode::ServerError
        );
    }
}
