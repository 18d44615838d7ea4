//! Request error taxonomy.

use pwmail_crypto::IdentityError;
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::LedgerError;

/// Every way a mail request can fail.
///
/// The set is closed: transports match on the variant (or on
/// [`AuthError::class`]), never on the rendered message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid scalar: {0}")]
    InvalidScalar(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("nonce {nonce} is already used")]
    Replayed { nonce: Uuid },

    #[error("request timestamp outside the freshness window")]
    Timeout,

    #[error("not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse outcome classes a transport maps onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Unauthorized,
    ClientError,
    NotFound,
    ServerError,
}

impl AuthError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidSignature | Self::Replayed { .. } | Self::Timeout => ErrorClass::Unauthorized,
            Self::InvalidScalar(_) | Self::InvalidAddress(_) | Self::BadRequest(_) => {
                ErrorClass::ClientError
            }
            Self::NotFound => ErrorClass::NotFound,
            Self::Internal(_) => ErrorClass::ServerError,
        }
    }
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidScalar(reason) => Self::InvalidScalar(reason.to_string()),
            IdentityError::InvalidAddress(reason) => Self::InvalidAddress(reason.to_string()),
        }
    }
}

impl From<LedgerError> for AuthError {
    fn from(err: LedgerError) -> Self {
        Self::Internal(err.to_string())
    }
}
