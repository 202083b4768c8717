//! Identifiers for metadata rows and audit positions
//!
//! `ObjectId` is the 16-byte identity every metadata row carries:
//! - Opaque: no structure is assumed beyond the byte string
//! - Totally ordered: plain lexicographic comparison, most significant
//!   byte first
//! - Printable: 32 lowercase hex characters, round-trips exactly
//!
//! `AuditLogId` is the position of a row in the audit trail. Positions are
//! assigned by the backend, increase monotonically and are never reused.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Error returned when a hex identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("identifier must be {expected} hex characters, got {got}")]
    Length { expected: usize, got: usize },

    #[error("identifier contains a non-hex character at position {0}")]
    Digit(usize),
}

/// A totally ordered, opaque 16-byte identity.
///
/// The derived ordering compares the full byte string, so for any two
/// distinct ids exactly one of `<` and `>` holds and the order is
/// transitive. Map keys and range scans rely on this.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; Self::LEN]);

impl ObjectId {
    /// Width of an identifier in bytes.
    pub const LEN: usize = 16;

    /// The all-zero identifier, smaller than every other id.
    pub const MIN: ObjectId = ObjectId([0u8; Self::LEN]);

    /// Creates an id from its raw bytes.
    #[inline]
    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Returns true for the all-zero id.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; Self::LEN]
    }

    /// Formats the id as 32 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(Self::LEN * 2);
        for byte in self.0 {
            out.push(hex_digit(byte >> 4));
            out.push(hex_digit(byte & 0x0f));
        }
        out
    }

    /// Parses an id from 32 hex characters (either case).
    pub fn from_hex(input: &str) -> Result<Self, IdParseError> {
        let bytes = input.as_bytes();
        if bytes.len() != Self::LEN * 2 {
            return Err(IdParseError::Length {
                expected: Self::LEN * 2,
                got: bytes.len(),
            });
        }
        let mut raw = [0u8; Self::LEN];
        for (i, chunk) in bytes.chunks_exact(2).enumerate() {
            let hi = hex_value(chunk[0]).ok_or(IdParseError::Digit(i * 2))?;
            let lo = hex_value(chunk[1]).ok_or(IdParseError::Digit(i * 2 + 1))?;
            raw[i] = (hi << 4) | lo;
        }
        Ok(Self(raw))
    }
}

fn hex_digit(nibble: u8) -> char {
    char::from_digit(nibble as u32, 16).unwrap_or('0')
}

fn hex_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl From<Uuid> for ObjectId {
    fn from(uuid: Uuid) -> Self {
        Self(*uuid.as_bytes())
    }
}

impl From<ObjectId> for Uuid {
    fn from(id: ObjectId) -> Self {
        Uuid::from_bytes(id.0)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ObjectId::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// A position in the append-only audit trail.
///
/// Assigned by the backend, strictly increasing, never reused. The diff
/// engine's watermark is the highest position it has fully applied.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AuditLogId(u64);

impl AuditLogId {
    /// The position before the first audit row.
    pub const ZERO: AuditLogId = AuditLogId(0);

    /// Creates an AuditLogId with the given value.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AuditLogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
