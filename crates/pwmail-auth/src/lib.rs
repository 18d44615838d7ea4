#![forbid(unsafe_code)]

//! Request authentication for pwmail.
//!
//! A signed request is accepted only when all of the following hold:
//! - the signature verifies over the exact payload bytes
//! - the embedded timestamp is inside the freshness window
//! - the nonce has never been consumed before
//!
//! [`RequestPipeline`] composes these checks into a single outcome.

pub mod error;
pub mod freshness;
pub mod ledger;
pub mod message;
pub mod pipeline;

#[cfg(test)]
mod proptests;

pub use error::{AuthError, ErrorClass};
pub use freshness::FreshnessGate;
pub use ledger::{LedgerError, MemoryNonceLedger, NonceInsert, NonceLedger, NonceLookup, NonceRecord};
pub use message::{ActionMessage, GetEmail, GetInbox, SendEmail, SignedEnvelope};
pub use pipeline::{Authenticated, RequestPipeline, Stage};
