#![forbid(unsafe_code)]

//! Identity primitives for pwmail.
//!
//! - Deterministic P-256 key pairs derived from a raw private scalar
//! - Fixed-width hex addresses for public keys
//! - ECDSA request signatures over caller-supplied payload bytes

pub mod address;
pub mod identity;

#[cfg(test)]
mod proptests;

pub use address::Address;
pub use identity::{verify_signature, Account, IdentityError};
