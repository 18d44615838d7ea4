//! Mail and nonce storage

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pwmail_auth::{AuthError, LedgerError, NonceInsert, NonceLedger, NonceLookup, NonceRecord};
use pwmail_crypto::Address;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Storage task failed: {0}")]
    Task(String),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        error!("Store error: {}", err);
        AuthError::Internal(err.to_string())
    }
}

/// A stored mail as returned to participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mail {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// A mail about to be stored.
#[derive(Debug, Clone)]
pub struct NewMail {
    pub from: Address,
    pub to: Address,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Mail store trait
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Mails addressed to `recipient`, newest first.
    async fn inbox(&self, recipient: &Address, offset: u64, limit: u64) -> Result<Vec<Mail>, StoreError>;
    async fn total_count(&self, recipient: &Address) -> Result<u64, StoreError>;
    async fn insert_mail(&self, mail: NewMail) -> Result<Mail, StoreError>;
    /// Some iff the mail exists and `participant` sent or received it.
    async fn get_mail(&self, id: &Uuid, participant: &Address) -> Result<Option<Mail>, StoreError>;
}

/// Newest first, ties broken by id so paging is stable.
fn inbox_order(a: &Mail, b: &Mail) -> std::cmp::Ordering {
    b.sent_at.cmp(&a.sent_at).then_with(|| a.id.cmp(&b.id))
}

/// In-memory mail store for tests
#[derive(Debug, Default)]
pub struct MemoryMailStore {
    mails: DashMap<Uuid, Mail>,
}

impl MemoryMailStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mails.is_empty()
    }
}

#[async_trait]
impl MailStore for MemoryMailStore {
    async fn inbox(&self, recipient: &Address, offset: u64, limit: u64) -> Result<Vec<Mail>, StoreError> {
        let recipient = recipient.to_string();
        let mut inbox: Vec<Mail> = self
            .mails
            .iter()
            .filter(|entry| entry.to == recipient)
            .map(|entry| entry.value().clone())
            .collect();
        inbox.sort_by(inbox_order);

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(inbox.into_iter().skip(offset).take(limit).collect())
    }

    async fn total_count(&self, recipient: &Address) -> Result<u64, StoreError> {
        let recipient = recipient.to_string();
        Ok(self.mails.iter().filter(|entry| entry.to == recipient).count() as u64)
    }

    async fn insert_mail(&self, mail: NewMail) -> Result<Mail, StoreError> {
        let mail = Mail {
            id: Uuid::new_v4(),
            from: mail.from.to_string(),
            to: mail.to.to_string(),
            subject: mail.subject,
            body: mail.body,
            sent_at: mail.sent_at,
        };
        self.mails.insert(mail.id, mail.clone());
        Ok(mail)
    }

    async fn get_mail(&self, id: &Uuid, participant: &Address) -> Result<Option<Mail>, StoreError> {
        let participant = participant.to_string();
        Ok(self
            .mails
            .get(id)
            .filter(|mail| mail.from == participant || mail.to == participant)
            .map(|mail| mail.value().clone()))
    }
}

/// SQLite-backed store for both mail and consumed nonces
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Task("connection lock poisoned".to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS mail (
                    id TEXT PRIMARY KEY,
                    recipient TEXT NOT NULL,
                    sender TEXT NOT NULL,
                    subject TEXT NOT NULL,
                    body TEXT NOT NULL,
                    sent_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_mail_recipient
                ON mail (recipient, sent_at);

                CREATE TABLE IF NOT EXISTS used_nonce (
                    nonce TEXT PRIMARY KEY,
                    created_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_used_nonce_created
                ON used_nonce (created_at);
                "#,
            )?;
            Ok(())
        })
        .await
    }
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {millis}")))
}

fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("bad uuid {raw:?}: {e}")))
}

type MailRow = (String, String, String, String, String, i64);

fn read_mail_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MailRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn mail_from_row((id, recipient, sender, subject, body, sent_at): MailRow) -> Result<Mail, StoreError> {
    Ok(Mail {
        id: parse_uuid(&id)?,
        from: sender,
        to: recipient,
        subject,
        body,
        sent_at: millis_to_datetime(sent_at)?,
    })
}

#[async_trait]
impl MailStore for SqliteStore {
    async fn inbox(&self, recipient: &Address, offset: u64, limit: u64) -> Result<Vec<Mail>, StoreError> {
        let recipient = recipient.to_string();
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, recipient, sender, subject, body, sent_at FROM mail
                    WHERE recipient = ?1
                    ORDER BY sent_at DESC, id ASC
                    LIMIT ?2 OFFSET ?3
                    "#,
                )?;
                let rows = stmt.query_map(params![recipient, limit, offset], read_mail_row)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row?);
                }
                Ok(results)
            })
            .await?;

        rows.into_iter().map(mail_from_row).collect()
    }

    async fn total_count(&self, recipient: &Address) -> Result<u64, StoreError> {
        let recipient = recipient.to_string();
        let count: i64 = self
            .with_conn(move |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM mail WHERE recipient = ?1",
                    params![recipient],
                    |row| row.get(0),
                )?)
            })
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn insert_mail(&self, mail: NewMail) -> Result<Mail, StoreError> {
        let sent_at_millis = mail.sent_at.timestamp_millis();
        let stored = Mail {
            id: Uuid::new_v4(),
            from: mail.from.to_string(),
            to: mail.to.to_string(),
            subject: mail.subject,
            body: mail.body,
            sent_at: millis_to_datetime(sent_at_millis)?,
        };

        let row = stored.clone();
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO mail (id, recipient, sender, subject, body, sent_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    row.id.to_string(),
                    row.to,
                    row.from,
                    row.subject,
                    row.body,
                    sent_at_millis,
                ],
            )?;
            Ok(())
        })
        .await?;

        Ok(stored)
    }

    async fn get_mail(&self, id: &Uuid, participant: &Address) -> Result<Option<Mail>, StoreError> {
        let id = id.to_string();
        let participant = participant.to_string();

        let row = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        r#"
                        SELECT id, recipient, sender, subject, body, sent_at FROM mail
                        WHERE id = ?1 AND (recipient = ?2 OR sender = ?2)
                        "#,
                        params![id, participant],
                        read_mail_row,
                    )
                    .optional()?)
            })
            .await?;

        row.map(mail_from_row).transpose()
    }
}

#[async_trait]
impl NonceLedger for SqliteStore {
    async fn lookup(&self, nonce: &Uuid) -> Result<NonceLookup, LedgerError> {
        let key = nonce.to_string();
        let created_at = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT created_at FROM used_nonce WHERE nonce = ?1",
                        params![key],
                        |row| row.get::<_, i64>(0),
                    )
                    .optional()?)
            })
            .await?;

        match created_at {
            Some(millis) => Ok(NonceLookup::Found(NonceRecord {
                nonce: *nonce,
                created_at: millis_to_datetime(millis)?,
            })),
            None => Ok(NonceLookup::NotFound),
        }
    }

    async fn insert(&self, nonce: &Uuid, at: DateTime<Utc>) -> Result<NonceInsert, LedgerError> {
        let key = nonce.to_string();
        let created_at = at.timestamp_millis();

        let outcome = self
            .with_conn(move |conn| {
                let result = conn.execute(
                    "INSERT INTO used_nonce (nonce, created_at) VALUES (?1, ?2)",
                    params![key, created_at],
                );
                match result {
                    Ok(_) => Ok(NonceInsert::Inserted),
                    // The primary key decides which of two racing inserts wins
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == ErrorCode::ConstraintViolation =>
                    {
                        Ok(NonceInsert::AlreadyUsed)
                    }
                    Err(e) => Err(StoreError::Database(e)),
                }
            })
            .await?;
        Ok(outcome)
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize, LedgerError> {
        let cutoff = cutoff.timestamp_millis();
        let removed = self
            .with_conn(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM used_nonce WHERE created_at < ?1",
                    params![cutoff],
                )?)
            })
            .await?;
        Ok(removed)
    }
}
