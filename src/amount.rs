//! Integral money amounts.
//!
//! Every balance in the ledger is a whole number of base units held in a
//! `u128`. There is no scaling and no floating point; the only place value is
//! ever rounded is the vesting calculation, which floors.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// A non-negative amount of base currency units.
///
/// Arithmetic is explicit: `checked_*` for anything that may fail and
/// `saturating_sub` where a floor of zero is the intended semantics.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use stream_ledger::Amount;
///
/// let amount = Amount::from_str(" 1000 ").unwrap();
/// assert_eq!(amount, Amount::new(1000));
/// assert_eq!(amount.to_string(), "1000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u128);

impl Amount {
    /// Zero value.
    pub const ZERO: Self = Amount(0);

    /// Largest representable amount.
    pub const MAX: Self = Amount(u128::MAX);

    pub const fn new(units: u128) -> Self {
        Amount(units)
    }

    /// Returns the raw number of base units.
    pub const fn units(self) -> u128 {
        self.0
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        Amount(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

impl From<u128> for Amount {
    fn from(units: u128) -> Self {
        Amount(units)
    }
}

impl FromStr for Amount {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// u128 is not portable through every serde format, so amounts travel as strings.
impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}
