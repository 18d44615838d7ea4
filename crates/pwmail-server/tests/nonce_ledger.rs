//! Single-use guarantees of the SQLite nonce ledger under concurrency

use std::sync::Arc;

use chrono::Utc;
use pwmail_auth::{FreshnessGate, GetInbox, NonceInsert, NonceLedger, RequestPipeline, SignedEnvelope};
use pwmail_crypto::Account;
use pwmail_server::SqliteStore;
use tempfile::TempDir;
use uuid::Uuid;

const ALICE: &str = "1baa694c49154f63b1503c7138f184c80f221670f035403ff428a65183bab247";

async fn store() -> (TempDir, Arc<SqliteStore>) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::new(dir.path().join("ledger.db")).await.unwrap();
    (dir, Arc::new(store))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_exactly_once() {
    let (_dir, store) = store().await;
    let nonce = Uuid::new_v4();
    let now = Utc::now();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.insert(&nonce, now).await.unwrap() })
        })
        .collect();

    let mut inserted = 0;
    for task in tasks {
        if task.await.unwrap() == NonceInsert::Inserted {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_accept_once() {
    let (_dir, store) = store().await;
    let pipeline = RequestPipeline::new(store, FreshnessGate::default());
    let alice = Account::from_scalar_hex(ALICE).unwrap();
    let envelope = SignedEnvelope::seal(&alice, &GetInbox::new()).unwrap();
    let address = alice.address().clone();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let pipeline = pipeline.clone();
            let envelope = envelope.clone();
            let address = address.clone();
            tokio::spawn(async move {
                pipeline
                    .authenticate::<GetInbox>(&envelope, &address, Utc::now())
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut accepted = 0;
    for task in tasks {
        if task.await.unwrap() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
}
