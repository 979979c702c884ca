//! Fixed-point monetary amounts.
//!
//! Amounts are stored as signed minor units (cents) of the single accounting
//! currency. All arithmetic is checked; there is no floating point anywhere in
//! the reconciliation path.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Amount in minor currency units (e.g. cents).
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    /// Rounding tolerance (0.01) used when deriving settlement status.
    pub const EPSILON: Money = Money(1);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Build an amount from whole units and cents, e.g. `Money::new(1080, 0)`.
    pub const fn new(units: i64, cents: i64) -> Self {
        Self(units * 100 + cents)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Money) -> DomainResult<Money> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .ok_or_else(|| DomainError::overflow(format!("{self} + {rhs}")))
    }

    pub fn checked_sub(self, rhs: Money) -> DomainResult<Money> {
        self.0
            .checked_sub(rhs.0)
            .map(Money)
            .ok_or_else(|| DomainError::overflow(format!("{self} - {rhs}")))
    }

    /// Sum a sequence of amounts, failing on overflow.
    pub fn try_sum<I>(amounts: I) -> DomainResult<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }

    /// `true` when both amounts differ by no more than [`Money::EPSILON`].
    pub fn approx_eq(self, other: Money) -> bool {
        (self.0 as i128 - other.0 as i128).abs() <= Money::EPSILON.0 as i128
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    /// Parses `"1080"`, `"1080.5"` or `"-12.34"`. More than two decimals is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || DomainError::validation(format!("invalid amount: {raw:?}"));

        let (negative, digits) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let (units, cents) = match digits.split_once('.') {
            Some((u, c)) => (u, c),
            None => (digits, ""),
        };
        if units.is_empty() || cents.len() > 2 {
            return Err(invalid());
        }
        if !units.bytes().all(|b| b.is_ascii_digit()) || !cents.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let units: i64 = units.parse().map_err(|_| invalid())?;
        let cents: i64 = match cents.len() {
            0 => 0,
            1 => cents.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => cents.parse().map_err(|_| invalid())?,
        };
        let minor = units
            .checked_mul(100)
            .and_then(|u| u.checked_add(cents))
            .ok_or_else(|| DomainError::overflow(raw.to_string()))?;

        Ok(Money(if negative { -minor } else { minor }))
    }
}
