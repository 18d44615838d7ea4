//! Account key pairs and request signatures.
//!
//! An [`Account`] is computed directly from the caller's private scalar:
//! no random key generation is involved, so the same scalar always yields
//! the same address. Signing, on the other hand, mixes fresh OS randomness
//! into every signature.

use p256::ecdsa::signature::{RandomizedSigner, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::{NonZeroScalar, Scalar};
use rand_core::OsRng;
use zeroize::Zeroizing;

use crate::address::Address;

/// Error type for identity operations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid scalar: {0}")]
    InvalidScalar(&'static str),
    #[error("invalid address: {0}")]
    InvalidAddress(&'static str),
}

/// A P-256 key pair bound to its address.
///
/// The signing key is zeroized when the account is dropped. Accounts are
/// meant to live for a single invocation and are never persisted.
pub struct Account {
    // SigningKey zeroizes its scalar on drop
    signing_key: SigningKey,
    address: Address,
}

impl Account {
    /// Derive an account from a hex-encoded private scalar.
    ///
    /// The input may be of any length (odd lengths are accepted) and is
    /// reduced modulo the group order. A scalar congruent to zero has no
    /// public point and is rejected.
    pub fn from_scalar_hex(scalar_hex: &str) -> Result<Self, IdentityError> {
        let scalar = parse_scalar(scalar_hex)?;
        let scalar = Option::<NonZeroScalar>::from(NonZeroScalar::new(scalar))
            .ok_or(IdentityError::InvalidScalar("scalar is zero modulo the group order"))?;

        let signing_key = SigningKey::from(scalar);
        let address = Address::from_verifying_key(signing_key.verifying_key());

        Ok(Self {
            signing_key,
            address,
        })
    }

    /// The account's public address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The ECDSA verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign the exact payload bytes.
    ///
    /// Returns the DER encoding of the `(r, s)` pair. Each call uses a fresh
    /// random value, so signing the same payload twice yields different bytes.
    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign_with_rng(&mut OsRng, payload);
        signature.to_der().as_bytes().to_vec()
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Verify a DER-encoded signature over `payload`.
///
/// Never fails loudly: malformed signatures simply verify as `false`.
pub fn verify_signature(address: &Address, payload: &[u8], signature: &[u8]) -> bool {
    match Signature::from_der(signature) {
        Ok(sig) => address.verifying_key().verify(payload, &sig).is_ok(),
        Err(_) => false,
    }
}

/// Parse an arbitrary-length hex integer into a scalar modulo the group order.
fn parse_scalar(scalar_hex: &str) -> Result<Scalar, IdentityError> {
    if scalar_hex.is_empty() {
        return Err(IdentityError::InvalidScalar("empty input"));
    }

    let digits = if scalar_hex.len() % 2 == 1 {
        Zeroizing::new(format!("0{scalar_hex}"))
    } else {
        Zeroizing::new(scalar_hex.to_owned())
    };
    let bytes = Zeroizing::new(
        hex::decode(digits.as_bytes()).map_err(|_| IdentityError::InvalidScalar("not hex"))?,
    );

    // Horner's rule in the scalar field: reduces inputs longer than 32 bytes
    let radix = Scalar::from(256u64);
    let mut acc = Scalar::ZERO;
    for byte in bytes.iter() {
        acc = acc * radix + Scalar::from(u64::from(*byte));
    }
    Ok(acc)
}
