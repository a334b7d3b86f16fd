//! Identifier types for the loyalty ledger.
//!
//! `UserId` is a UUID newtype. `OrderNumber` is a digit string that has
//! passed the Luhn check: every constructor validates, so holding an
//! `OrderNumber` is proof the number is well formed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::luhn;

/// Errors produced when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,

    /// The input is not a non-negative integer string.
    #[error("order number must contain only digits")]
    NotNumeric,

    /// The input is numeric but fails the Luhn checksum.
    #[error("order number fails the checksum")]
    BadChecksum,
}

/// A user identifier.
///
/// Users are authenticated outside this crate; the ledger only ever
/// receives the already-verified identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(uuid::Uuid);

impl UserId {
    /// Create a new identifier from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a new random identifier (primarily for testing).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Return the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0.to_string()
    }
}

/// A checksum-valid purchase order number.
///
/// Order numbers are kept as strings: they can exceed any fixed-width
/// integer and leading zeros are significant to the upstream service.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Borrow the digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderNumber {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::NotNumeric);
        }
        if !luhn::is_valid(s) {
            return Err(IdError::BadChecksum);
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Debug for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderNumber({})", self.0)
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_roundtrip() {
        let id = UserId::generate();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn user_id_rejects_garbage() {
        assert_eq!("not-a-uuid".parse::<UserId>(), Err(IdError::InvalidUuid));
    }

    #[test]
    fn order_number_accepts_luhn_valid() {
        let number: OrderNumber = "12345678903".parse().unwrap();
        assert_eq!(number.as_str(), "12345678903");
        assert_eq!(number.to_string(), "12345678903");
    }

    #[test]
    fn order_number_distinguishes_format_from_checksum() {
        assert_eq!("12a45".parse::<OrderNumber>(), Err(IdError::NotNumeric));
        assert_eq!("".parse::<OrderNumber>(), Err(IdError::NotNumeric));
        assert_eq!(
            "12345678904".parse::<OrderNumber>(),
            Err(IdError::BadChecksum)
        );
    }

    #[test]
    fn order_number_deserialize_validates() {
        let ok: Result<OrderNumber, _> = serde_json::from_str("\"79927398713\"");
        assert!(ok.is_ok());

        let bad: Result<OrderNumber, _> = serde_json::from_str("\"79927398710\"");
        assert!(bad.is_err());
    }
}
