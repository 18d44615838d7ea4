//! Input files and server responses

use std::path::Path;

use chrono::{DateTime, Utc};
use pwmail_crypto::{Account, Address};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::ClientError;

/// Hex digits in a user credential.
pub const CREDENTIAL_HEX_LEN: usize = 64;

/// Derive the account for a 32-byte hex credential.
pub fn account_from_credential(credential: &str) -> Result<Account, ClientError> {
    let credential = Zeroizing::new(credential.trim().to_string());
    if credential.len() != CREDENTIAL_HEX_LEN || !credential.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ClientError::InvalidCredential(format!(
            "expected {} hex characters",
            CREDENTIAL_HEX_LEN
        )));
    }
    Account::from_scalar_hex(&credential).map_err(|e| ClientError::InvalidCredential(e.to_string()))
}

/// Read and parse a JSON input file.
pub async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, ClientError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|source| ClientError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content)
        .map_err(|e| ClientError::InvalidInput(format!("{}: {}", path.display(), e)))
}

/// Inbox page selection, `{ "page": int, "limit": int }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxQuery {
    pub page: i64,
    pub limit: i64,
}

impl InboxQuery {
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.page <= 0 {
            return Err(ClientError::InvalidInput("page must be greater than 0".to_string()));
        }
        if self.limit <= 0 {
            return Err(ClientError::InvalidInput("limit must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// A mail to send, `{ "to": str, "subject": str, "body": str }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailDraft {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl MailDraft {
    /// Checks the recipient locally before anything is signed.
    pub fn validate(&self) -> Result<Address, ClientError> {
        Address::parse(&self.to).map_err(|e| ClientError::InvalidInput(format!("to: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mail {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxResponse {
    pub inbox: Vec<Mail>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ALICE: &str = "1baa694c49154f63b1503c7138f184c80f221670f035403ff428a65183bab247";

    #[test]
    fn test_credential_length_enforced() {
        assert!(account_from_credential(ALICE).is_ok());
        assert!(account_from_credential(&ALICE[..62]).is_err());
        assert!(account_from_credential(&format!("{ALICE}00")).is_err());
    }

    #[test]
    fn test_credential_must_be_hex() {
        let bad = format!("{}zz", &ALICE[..62]);
        assert!(matches!(
            account_from_credential(&bad),
            Err(ClientError::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_zero_credential_rejected() {
        let zero = "0".repeat(CREDENTIAL_HEX_LEN);
        assert!(account_from_credential(&zero).is_err());
    }

    #[test]
    fn test_query_validation() {
        assert!(InboxQuery { page: 1, limit: 10 }.validate().is_ok());
        assert!(InboxQuery { page: 0, limit: 10 }.validate().is_err());
        assert!(InboxQuery { page: 1, limit: -1 }.validate().is_err());
    }

    #[test]
    fn test_draft_validation() {
        let alice = account_from_credential(ALICE).unwrap();
        let draft = MailDraft {
            to: alice.address().to_string(),
            subject: "hi".into(),
            body: "there".into(),
        };
        assert_eq!(&draft.validate().unwrap(), alice.address());

        let bad = MailDraft {
            to: "nobody".into(),
            ..draft
        };
        assert!(matches!(bad.validate(), Err(ClientError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_read_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("query.json");
        std::fs::write(&path, r#"{ "page": 2, "limit": 5 }"#).unwrap();

        let query: InboxQuery = read_json_file(&path).await.unwrap();
        assert_eq!(query, InboxQuery { page: 2, limit: 5 });
    }

    #[tokio::test]
    async fn test_read_json_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            read_json_file::<InboxQuery>(&missing).await,
            Err(ClientError::Io { .. })
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ page: 2").unwrap();
        assert!(matches!(
            read_json_file::<InboxQuery>(&broken).await,
            Err(ClientError::InvalidInput(_))
        ));
    }
}
