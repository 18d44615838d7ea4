#![forbid(unsafe_code)]

//! pwmail-server: passwordless mail over HTTP
//!
//! Every mail request is a signed envelope. The server verifies it against
//! the caller's address, enforces freshness and single use of its nonce, and
//! only then touches the mail store.

pub mod api;
pub mod config;
pub mod metrics;
pub mod server;
pub mod service;
pub mod store;

#[cfg(test)]
mod proptests;

pub use config::{ConfigError, ServerConfig};
pub use server::{compact_nonces, MailServer};
pub use service::{InboxPage, MailService, PageRequest};
pub use store::{Mail, MailStore, MemoryMailStore, NewMail, SqliteStore, StoreError};
