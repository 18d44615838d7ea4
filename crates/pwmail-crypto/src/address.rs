//! Address codec.
//!
//! An address is the lowercase hex encoding of `X || Y`, where each affine
//! coordinate of the public point is written big-endian and left-padded to
//! the 32-byte field width. The fixed width is what makes the encoding
//! reversible: stripping leading zero bytes from a coordinate would make the
//! split point between X and Y ambiguous.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use p256::ecdsa::VerifyingKey;
use p256::{EncodedPoint, FieldBytes};

use crate::identity::IdentityError;

/// Byte width of one P-256 field element.
pub const COORDINATE_BYTES: usize = 32;

/// Decoded address length in bytes.
pub const ADDRESS_BYTES: usize = 2 * COORDINATE_BYTES;

/// Encoded address length in hex characters.
pub const ADDRESS_HEX_LEN: usize = 2 * ADDRESS_BYTES;

/// A public identity: a P-256 public key with its canonical encoding.
#[derive(Clone)]
pub struct Address {
    bytes: [u8; ADDRESS_BYTES],
    key: VerifyingKey,
}

impl Address {
    /// Encode a verifying key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        // Uncompressed SEC1: 0x04 || X || Y, both coordinates at full field width
        let point = key.to_encoded_point(false);
        let mut bytes = [0u8; ADDRESS_BYTES];
        bytes.copy_from_slice(&point.as_bytes()[1..]);
        Self {
            bytes,
            key: key.clone(),
        }
    }

    /// Build an address from big-endian coordinates of any width up to 32 bytes.
    ///
    /// Shorter coordinates are left-padded with zeros before the point is
    /// reconstructed and checked against the curve equation.
    pub fn from_coordinates(x: &[u8], y: &[u8]) -> Result<Self, IdentityError> {
        let x = pad_coordinate(x)?;
        let y = pad_coordinate(y)?;

        let point = EncodedPoint::from_affine_coordinates(
            &FieldBytes::from(x),
            &FieldBytes::from(y),
            false,
        );
        let key = VerifyingKey::from_encoded_point(&point)
            .map_err(|_| IdentityError::InvalidAddress("point is not on the curve"))?;

        let mut bytes = [0u8; ADDRESS_BYTES];
        bytes[..COORDINATE_BYTES].copy_from_slice(&x);
        bytes[COORDINATE_BYTES..].copy_from_slice(&y);
        Ok(Self { bytes, key })
    }

    /// Decode an address string.
    ///
    /// Requires exactly [`ADDRESS_HEX_LEN`] hex characters; either case is accepted.
    pub fn parse(address: &str) -> Result<Self, IdentityError> {
        if address.len() != ADDRESS_HEX_LEN {
            return Err(IdentityError::InvalidAddress("expected 128 hex characters"));
        }
        let bytes =
            hex::decode(address).map_err(|_| IdentityError::InvalidAddress("not hex"))?;
        let (x, y) = bytes.split_at(COORDINATE_BYTES);
        Self::from_coordinates(x, y)
    }

    /// Raw `X || Y` bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.bytes
    }

    /// The verifying key behind this address.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }

    /// Leading 8 bytes in hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.bytes[..8])
    }
}

fn pad_coordinate(coordinate: &[u8]) -> Result<[u8; COORDINATE_BYTES], IdentityError> {
    if coordinate.len() > COORDINATE_BYTES {
        return Err(IdentityError::InvalidAddress("coordinate wider than field element"));
    }
    let mut padded = [0u8; COORDINATE_BYTES];
    padded[COORDINATE_BYTES - coordinate.len()..].copy_from_slice(coordinate);
    Ok(padded)
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.bytes))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
