//! Opaque caller identities.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// An opaque account identifier supplied by the execution environment.
///
/// The ledger never interprets addresses beyond equality and the null check.
/// An address is null when it is empty, or consists only of zeros with an
/// optional `0x` prefix (`"0"`, `"0x0000"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(String);

impl Address {
    pub fn new(id: impl Into<String>) -> Self {
        Address(id.into().trim().to_string())
    }

    /// The canonical null address.
    pub fn null() -> Self {
        Address(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty or all-zero address.
    pub fn is_null(&self) -> bool {
        let digits = self.0.strip_prefix("0x").unwrap_or(&self.0);
        digits.chars().all(|c| c == '0')
    }
}

impl From<&str> for Address {
    fn from(id: &str) -> Self {
        Address::new(id)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Address::new(s))
    }
}
