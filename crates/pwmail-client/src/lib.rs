#![forbid(unsafe_code)]

//! pwmail client
//!
//! Every command signs its request with the account derived from the
//! user's private scalar. The scalar never leaves the process.

pub mod cli;
pub mod client;
pub mod error;
pub mod model;
pub mod output;

pub use cli::Cli;
pub use client::MailClient;
pub use error::ClientError;
pub use output::{OutputFormat, OutputFormatter};

/// Process exit codes
///
/// - 0: success
/// - 1: argument errors, reported by clap before a command runs
/// - 2: the server rejected the signature, timestamp or nonce
/// - 3: the server could not be reached
/// - 4: bad arguments, credential or input file
/// - 5: the mail does not exist or is not visible to this account
/// - 6: the server failed or answered with something unexpected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    AuthenticationFailed = 2,
    ConnectionFailed = 3,
    InvalidInput = 4,
    NotFound = 5,
    ServerError = 6,
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::AuthenticationFailed => "AUTH_FAILED",
            ExitCode::ConnectionFailed => "CONNECTION_FAILED",
            ExitCode::InvalidInput => "INVALID_INPUT",
            ExitCode::NotFound => "NOT_FOUND",
            ExitCode::ServerError => "SERVER_ERROR",
        }
    }
}

#[cfg(test)]
mod exit_code_tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as u8, 0);
        assert_eq!(ExitCode::AuthenticationFailed as u8, 2);
        assert_eq!(ExitCode::ConnectionFailed as u8, 3);
        assert_eq!(ExitCode::InvalidInput as u8, 4);
        assert_eq!(ExitCode::NotFound as u8, 5);
        assert_eq!(ExitCode::ServerError as u8, 6);
    }

    #[test]
    fn test_exit_code_names() {
        assert_eq!(ExitCode::AuthenticationFailed.name(), "AUTH_FAILED");
        assert_eq!(ExitCode::NotFound.name(), "NOT_FOUND");
    }
}
