//! Mail operations behind the authentication pipeline

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pwmail_auth::{AuthError, GetEmail, GetInbox, RequestPipeline, SendEmail, SignedEnvelope};
use pwmail_crypto::Address;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::{Mail, MailStore, NewMail};

/// One page of an inbox listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxPage {
    pub inbox: Vec<Mail>,
    pub total: u64,
}

/// Requested inbox page, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Store offset and limit, or `BadRequest` when out of range.
    pub fn bounds(&self, max_page_size: u64) -> Result<(u64, u64), AuthError> {
        let page = u64::try_from(self.page)
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| AuthError::BadRequest("page must be >= 1".to_string()))?;
        let limit = u64::try_from(self.limit)
            .ok()
            .filter(|l| (1..=max_page_size).contains(l))
            .ok_or_else(|| {
                AuthError::BadRequest(format!("limit must be between 1 and {max_page_size}"))
            })?;
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| AuthError::BadRequest("page out of range".to_string()))?;
        Ok((offset, limit))
    }
}

/// Authenticates each request, then performs the store call for it.
///
/// The acting identity is always the address the request was verified
/// against, never a field inside the message.
pub struct MailService {
    pipeline: RequestPipeline,
    store: Arc<dyn MailStore>,
    max_page_size: u64,
}

impl MailService {
    pub fn new(pipeline: RequestPipeline, store: Arc<dyn MailStore>, max_page_size: u64) -> Self {
        Self {
            pipeline,
            store,
            max_page_size,
        }
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// List the sender's own inbox.
    pub async fn inbox(
        &self,
        envelope: &SignedEnvelope,
        sender: &Address,
        page: PageRequest,
        now: DateTime<Utc>,
    ) -> Result<InboxPage, AuthError> {
        // Range errors are rejected before the nonce is spent
        let (offset, limit) = page.bounds(self.max_page_size)?;
        let request = self.pipeline.authenticate::<GetInbox>(envelope, sender, now).await?;

        let inbox = self.store.inbox(&request.sender, offset, limit).await?;
        let total = self.store.total_count(&request.sender).await?;
        Ok(InboxPage { inbox, total })
    }

    /// Read one mail the sender took part in.
    pub async fn read(
        &self,
        envelope: &SignedEnvelope,
        sender: &Address,
        now: DateTime<Utc>,
    ) -> Result<Mail, AuthError> {
        let request = self.pipeline.authenticate::<GetEmail>(envelope, sender, now).await?;

        // Absent and not-yours look the same to the caller
        self.store
            .get_mail(&request.message.email_id, &request.sender)
            .await?
            .ok_or(AuthError::NotFound)
    }

    /// Store a mail from the sender.
    pub async fn send(
        &self,
        envelope: &SignedEnvelope,
        sender: &Address,
        now: DateTime<Utc>,
    ) -> Result<Mail, AuthError> {
        let request = self.pipeline.authenticate::<SendEmail>(envelope, sender, now).await?;
        let to = request.message.recipient_address()?;
        let from = request.sender.short();

        let mail = self
            .store
            .insert_mail(NewMail {
                from: request.sender,
                to,
                subject: request.message.subject,
                body: request.message.body,
                sent_at: now,
            })
            .await?;

        info!("Stored mail {} from {}", mail.id, from);
        Ok(mail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryMailStore;
    use pwmail_auth::{FreshnessGate, MemoryNonceLedger};
    use pwmail_crypto::Account;
    use uuid::Uuid;

    const ALICE: &str = "1baa694c49154f63b1503c7138f184c80f221670f035403ff428a65183bab247";
    const BOB: &str = "fd778940ddae63e19e5d2a05604a4d0eaec18b977801299a7f54aa95e33cbec2";
    const CAROL: &str = "923cebb3d8809d3caf09faa74ae2a39c23824a6fe75c44cab2a73dc6a0f3b606";

    struct Fixture {
        service: MailService,
        store: Arc<MemoryMailStore>,
        ledger: Arc<MemoryNonceLedger>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryMailStore::new());
        let ledger = Arc::new(MemoryNonceLedger::new());
        let pipeline = RequestPipeline::new(ledger.clone(), FreshnessGate::default());
        Fixture {
            service: MailService::new(pipeline, store.clone(), 50),
            store,
            ledger,
        }
    }

    fn account(scalar: &str) -> Account {
        Account::from_scalar_hex(scalar).unwrap()
    }

    async fn send(service: &MailService, from: &Account, to: &Account, subject: &str) -> Mail {
        let message = SendEmail::new(to.address().to_string(), subject, "hello");
        let envelope = SignedEnvelope::seal(from, &message).unwrap();
        service.send(&envelope, from.address(), Utc::now()).await.unwrap()
    }

    fn page(page: i64, limit: i64) -> PageRequest {
        PageRequest { page, limit }
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page(1, 10).bounds(50).unwrap(), (0, 10));
        assert_eq!(page(3, 10).bounds(50).unwrap(), (20, 10));
        assert_eq!(page(2, 50).bounds(50).unwrap(), (50, 50));

        for bad in [page(0, 10), page(-1, 10), page(1, 0), page(1, -5), page(1, 51)] {
            assert!(
                matches!(bad.bounds(50), Err(AuthError::BadRequest(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_send_then_inbox() {
        let f = fixture();
        let alice = account(ALICE);
        let bob = account(BOB);

        let mail = send(&f.service, &alice, &bob, "lunch?").await;
        assert_eq!(mail.from, alice.address().to_string());
        assert_eq!(mail.to, bob.address().to_string());

        let envelope = SignedEnvelope::seal(&bob, &GetInbox::new()).unwrap();
        let listing = f
            .service
            .inbox(&envelope, bob.address(), page(1, 10), Utc::now())
            .await
            .unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.inbox, vec![mail]);
    }

    #[tokio::test]
    async fn test_total_counts_all_pages() {
        let f = fixture();
        let alice = account(ALICE);
        let bob = account(BOB);
        for i in 0..3 {
            send(&f.service, &alice, &bob, &format!("mail {i}")).await;
        }

        let envelope = SignedEnvelope::seal(&bob, &GetInbox::new()).unwrap();
        let listing = f
            .service
            .inbox(&envelope, bob.address(), page(2, 2), Utc::now())
            .await
            .unwrap();
        assert_eq!(listing.inbox.len(), 1);
        assert_eq!(listing.total, 3);
    }

    #[tokio::test]
    async fn test_bad_page_keeps_nonce_unspent() {
        let f = fixture();
        let bob = account(BOB);
        let envelope = SignedEnvelope::seal(&bob, &GetInbox::new()).unwrap();

        let result = f
            .service
            .inbox(&envelope, bob.address(), page(0, 10), Utc::now())
            .await;
        assert!(matches!(result, Err(AuthError::BadRequest(_))));
        assert!(f.ledger.is_empty());

        // The same envelope is still usable with a valid page
        assert!(f
            .service
            .inbox(&envelope, bob.address(), page(1, 10), Utc::now())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_read_by_participants() {
        let f = fixture();
        let alice = account(ALICE);
        let bob = account(BOB);
        let mail = send(&f.service, &alice, &bob, "for bob").await;

        for reader in [&alice, &bob] {
            let envelope = SignedEnvelope::seal(reader, &GetEmail::new(mail.id)).unwrap();
            let read = f
                .service
                .read(&envelope, reader.address(), Utc::now())
                .await
                .unwrap();
            assert_eq!(read, mail);
        }
    }

    #[tokio::test]
    async fn test_read_hides_mail_from_outsiders() {
        let f = fixture();
        let alice = account(ALICE);
        let bob = account(BOB);
        let carol = account(CAROL);
        let mail = send(&f.service, &alice, &bob, "private").await;

        let envelope = SignedEnvelope::seal(&carol, &GetEmail::new(mail.id)).unwrap();
        let result = f.service.read(&envelope, carol.address(), Utc::now()).await;
        assert_eq!(result, Err(AuthError::NotFound));

        let envelope = SignedEnvelope::seal(&carol, &GetEmail::new(Uuid::new_v4())).unwrap();
        let result = f.service.read(&envelope, carol.address(), Utc::now()).await;
        assert_eq!(result, Err(AuthError::NotFound));
    }

    #[tokio::test]
    async fn test_send_to_malformed_recipient() {
        let f = fixture();
        let alice = account(ALICE);
        let message = SendEmail::new("bad key heehee! ow!", "hi", "there");
        let envelope = SignedEnvelope::seal(&alice, &message).unwrap();

        let result = f.service.send(&envelope, alice.address(), Utc::now()).await;
        assert!(matches!(result, Err(AuthError::BadRequest(_))));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_replayed_send_stores_once() {
        let f = fixture();
        let alice = account(ALICE);
        let bob = account(BOB);
        let message = SendEmail::new(bob.address().to_string(), "once", "only once");
        let envelope = SignedEnvelope::seal(&alice, &message).unwrap();

        f.service.send(&envelope, alice.address(), Utc::now()).await.unwrap();
        let replay = f.service.send(&envelope, alice.address(), Utc::now()).await;
        assert!(matches!(replay, Err(AuthError::Replayed { .. })));
        assert_eq!(f.store.len(), 1);
    }
}
