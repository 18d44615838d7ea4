//! Used-nonce ledger.
//!
//! Each request id may be accepted at most once. The ledger backend must
//! make `insert` atomic: when two callers race on the same nonce, exactly
//! one sees [`NonceInsert::Inserted`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger storage error: {0}")]
    Storage(String),
}

/// A consumed nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRecord {
    pub nonce: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceLookup {
    Found(NonceRecord),
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceInsert {
    Inserted,
    AlreadyUsed,
}

/// Backend for consumed nonces.
#[async_trait]
pub trait NonceLedger: Send + Sync {
    /// Look up a nonce.
    async fn lookup(&self, nonce: &Uuid) -> Result<NonceLookup, LedgerError>;

    /// Record a nonce as consumed at `at`. Atomic per nonce.
    async fn insert(&self, nonce: &Uuid, at: DateTime<Utc>) -> Result<NonceInsert, LedgerError>;

    /// Drop records created before `cutoff`; returns how many were removed.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize, LedgerError>;
}

/// In-memory ledger for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryNonceLedger {
    used: DashMap<Uuid, DateTime<Utc>>,
}

impl MemoryNonceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

#[async_trait]
impl NonceLedger for MemoryNonceLedger {
    async fn lookup(&self, nonce: &Uuid) -> Result<NonceLookup, LedgerError> {
        Ok(match self.used.get(nonce) {
            Some(entry) => NonceLookup::Found(NonceRecord {
                nonce: *nonce,
                created_at: *entry.value(),
            }),
            None => NonceLookup::NotFound,
        })
    }

    async fn insert(&self, nonce: &Uuid, at: DateTime<Utc>) -> Result<NonceInsert, LedgerError> {
        // The shard lock held by the entry makes check-and-insert atomic
        Ok(match self.used.entry(*nonce) {
            Entry::Occupied(_) => NonceInsert::AlreadyUsed,
            Entry::Vacant(slot) => {
                slot.insert(at);
                NonceInsert::Inserted
            }
        })
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize, LedgerError> {
        let before = self.used.len();
        self.used.retain(|_, created_at| *created_at >= cutoff);
        Ok(before.saturating_sub(self.used.len()))
    }
}
