//! Action messages and the signed request envelope.
//!
//! The envelope carries the serialized message as a string. That string is
//! the canonical payload: it is signed as-is and verified as-is, and the
//! parsed message is never serialized again for verification.

use chrono::{DateTime, SecondsFormat, Utc};
use pwmail_crypto::{Account, Address};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// A mail action carried inside a [`SignedEnvelope`].
pub trait ActionMessage: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Human-readable action name for logs.
    const ACTION: &'static str;

    /// Single-use request identifier.
    fn nonce(&self) -> Uuid;

    /// RFC3339 issue time as sent by the client.
    fn timestamp(&self) -> &str;

    /// Action-specific field checks run after the payload parses.
    fn validate(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Format a timestamp the way clients embed it in messages.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Extra fields are rejected so a payload signed for one action
/// never parses as another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetInbox {
    pub id: Uuid,
    pub timestamp: String,
}

impl GetInbox {
    pub fn new() -> Self {
        Self::issued_at(Utc::now())
    }

    pub fn issued_at(at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: format_timestamp(at),
        }
    }
}

impl Default for GetInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionMessage for GetInbox {
    const ACTION: &'static str = "get inbox";

    fn nonce(&self) -> Uuid {
        self.id
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetEmail {
    pub id: Uuid,
    pub timestamp: String,
    pub email_id: Uuid,
}

impl GetEmail {
    pub fn new(email_id: Uuid) -> Self {
        Self::issued_at(email_id, Utc::now())
    }

    pub fn issued_at(email_id: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: format_timestamp(at),
            email_id,
        }
    }
}

impl ActionMessage for GetEmail {
    const ACTION: &'static str = "get email";

    fn nonce(&self) -> Uuid {
        self.id
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendEmail {
    pub id: Uuid,
    pub timestamp: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl SendEmail {
    pub fn new(recipient: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::issued_at(recipient, subject, body, Utc::now())
    }

    pub fn issued_at(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: format_timestamp(at),
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// The recipient as a decoded address.
    pub fn recipient_address(&self) -> Result<Address, AuthError> {
        Address::parse(&self.recipient)
            .map_err(|e| AuthError::BadRequest(format!("recipient: {e}")))
    }
}

impl ActionMessage for SendEmail {
    const ACTION: &'static str = "send email";

    fn nonce(&self) -> Uuid {
        self.id
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }

    fn validate(&self) -> Result<(), AuthError> {
        self.recipient_address().map(|_| ())
    }
}

/// Wire envelope: the canonical payload and its DER signature.
///
/// On the wire the signature is standard base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub data: String,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl SignedEnvelope {
    /// Serialize `message` once and sign exactly those bytes.
    pub fn seal<M: ActionMessage>(account: &Account, message: &M) -> Result<Self, serde_json::Error> {
        let data = serde_json::to_string(message)?;
        Ok(Self::sign_payload(account, data))
    }

    /// Sign an already-serialized payload.
    pub fn sign_payload(account: &Account, data: String) -> Self {
        let signature = account.sign(data.as_bytes());
        Self { data, signature }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
