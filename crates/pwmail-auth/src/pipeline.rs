//! The authenticated request pipeline.
//!
//! ```text
//! Received -> VerifySignature -> ParseMessage -> CheckFreshness
//!          -> CheckNonceUnused -> InsertNonce -> Accepted
//! ```
//!
//! Every request reaches exactly one terminal outcome. Nothing is retried.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pwmail_crypto::{verify_signature, Address};
use tracing::debug;

use crate::error::AuthError;
use crate::freshness::FreshnessGate;
use crate::ledger::{NonceInsert, NonceLedger, NonceLookup};
use crate::message::{ActionMessage, SignedEnvelope};

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    VerifySignature,
    ParseMessage,
    CheckFreshness,
    CheckNonceUnused,
    InsertNonce,
    Accepted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::VerifySignature => "verify_signature",
            Stage::ParseMessage => "parse_message",
            Stage::CheckFreshness => "check_freshness",
            Stage::CheckNonceUnused => "check_nonce_unused",
            Stage::InsertNonce => "insert_nonce",
            Stage::Accepted => "accepted",
        };
        f.write_str(name)
    }
}

/// An accepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated<M> {
    pub sender: Address,
    pub message: M,
    pub issued_at: DateTime<Utc>,
}

/// Decides whether a signed request may be acted upon.
#[derive(Clone)]
pub struct RequestPipeline {
    ledger: Arc<dyn NonceLedger>,
    freshness: FreshnessGate,
}

impl RequestPipeline {
    pub fn new(ledger: Arc<dyn NonceLedger>, freshness: FreshnessGate) -> Self {
        Self { ledger, freshness }
    }

    pub fn freshness(&self) -> &FreshnessGate {
        &self.freshness
    }

    pub fn ledger(&self) -> &Arc<dyn NonceLedger> {
        &self.ledger
    }

    /// Run the full pipeline for `envelope` claimed by `sender`.
    ///
    /// On success the message nonce has been consumed.
    pub async fn authenticate<M: ActionMessage>(
        &self,
        envelope: &SignedEnvelope,
        sender: &Address,
        now: DateTime<Utc>,
    ) -> Result<Authenticated<M>, AuthError> {
        let mut stage = Stage::Received;
        let result = self.run::<M>(envelope, sender, now, &mut stage).await;

        match &result {
            Ok(accepted) => debug!(
                action = M::ACTION,
                sender = %sender.short(),
                nonce = %accepted.message.nonce(),
                "request accepted"
            ),
            Err(err) => debug!(
                action = M::ACTION,
                sender = %sender.short(),
                %stage,
                error = %err,
                "request rejected"
            ),
        }
        result
    }

    async fn run<M: ActionMessage>(
        &self,
        envelope: &SignedEnvelope,
        sender: &Address,
        now: DateTime<Utc>,
        stage: &mut Stage,
    ) -> Result<Authenticated<M>, AuthError> {
        advance(stage, Stage::VerifySignature);
        if !verify_signature(sender, envelope.data.as_bytes(), &envelope.signature) {
            return Err(AuthError::InvalidSignature);
        }

        advance(stage, Stage::ParseMessage);
        let message: M = serde_json::from_str(&envelope.data)
            .map_err(|e| AuthError::BadRequest(format!("payload: {e}")))?;
        message.validate()?;

        advance(stage, Stage::CheckFreshness);
        let issued_at = self.freshness.check(message.timestamp(), now)?;

        let nonce = message.nonce();
        advance(stage, Stage::CheckNonceUnused);
        if let NonceLookup::Found(_) = self.ledger.lookup(&nonce).await? {
            return Err(AuthError::Replayed { nonce });
        }

        advance(stage, Stage::InsertNonce);
        match self.ledger.insert(&nonce, now).await? {
            NonceInsert::Inserted => {}
            // Lost a race against a concurrent request with the same nonce
            NonceInsert::AlreadyUsed => return Err(AuthError::Replayed { nonce }),
        }

        advance(stage, Stage::Accepted);
        Ok(Authenticated {
            sender: sender.clone(),
            message,
            issued_at,
        })
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = %stage, to = %next, "pipeline stage");
    *stage = next;
}
