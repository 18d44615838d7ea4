//! HTTP client for the mail server

use pwmail_auth::{ActionMessage, GetEmail, GetInbox, SendEmail, SignedEnvelope};
use pwmail_crypto::Account;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::error::ClientError;
use crate::model::{InboxQuery, InboxResponse, Mail, MailDraft, SendResponse};

/// Header carrying the caller's address.
pub const PUBLIC_KEY_HEADER: &str = "x-public-key";

/// Signs and sends mail requests on behalf of one account.
pub struct MailClient {
    http: reqwest::Client,
    base_url: String,
    account: Account,
}

impl MailClient {
    pub fn new(base_url: impl Into<String>, account: Account) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().use_rustls_tls().build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account,
        })
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// List one page of this account's inbox.
    pub async fn inbox(&self, query: InboxQuery) -> Result<InboxResponse, ClientError> {
        query.validate()?;
        let path = format!("/mail/inbox?page={}&limit={}", query.page, query.limit);
        self.post(&path, &GetInbox::new()).await
    }

    /// Fetch one mail this account sent or received.
    pub async fn read(&self, email_id: Uuid) -> Result<Mail, ClientError> {
        self.post("/mail/read", &GetEmail::new(email_id)).await
    }

    /// Send a mail from this account.
    pub async fn send(&self, draft: &MailDraft) -> Result<SendResponse, ClientError> {
        let to = draft.validate()?;
        let message = SendEmail::new(to.to_string(), draft.subject.clone(), draft.body.clone());
        self.post("/mail/send", &message).await
    }

    /// Serialize `message` once, sign those bytes and post the envelope.
    async fn post<M: ActionMessage, R: DeserializeOwned>(
        &self,
        path: &str,
        message: &M,
    ) -> Result<R, ClientError> {
        let envelope = SignedEnvelope::seal(&self.account, message)
            .map_err(|e| ClientError::InvalidInput(e.to_string()))?;
        let url = format!("{}{}", self.base_url, path);
        debug!(action = M::ACTION, %url, nonce = %message.nonce(), "sending request");

        let response = self
            .http
            .post(&url)
            .header(PUBLIC_KEY_HEADER, self.account.address().to_string())
            .json(&envelope)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, error_message(&body)));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ClientError::Protocol(e.to_string()))
    }
}

/// The `error` field of a JSON error body, or the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
