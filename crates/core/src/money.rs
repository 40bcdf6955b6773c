//! Fixed-point monetary amounts and ISO 4217 currency codes.
//!
//! Per spec.md DESIGN NOTES ("Floating-point money: forbid"), all amounts are
//! fixed-point decimals with scale 2. `rust_decimal::Decimal` gives exact
//! base-10 arithmetic; comparisons and tolerance checks are done against the
//! decimal representation directly rather than converting through floats.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::DomainError;

/// A monetary amount, fixed at scale 2 (whole cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Construct from a decimal value, rounding to scale 2 (banker's
    /// rounding, matching `rust_decimal`'s default `round_dp`).
    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp(2))
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let cleaned: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',' && *c != '$')
            .collect();
        let d = Decimal::from_str(&cleaned)
            .map_err(|e| DomainError::validation(format!("invalid amount '{s}': {e}")))?;
        Ok(Self::new(d))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Self::new)
    }

    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Self::new)
    }

    /// Absolute difference between two amounts.
    pub fn abs_diff(&self, other: Money) -> Money {
        Self::new((self.0 - other.0).abs())
    }

    /// |self - other| / max(self, other), as a ratio in [0, 1] (or more, if
    /// both sides are zero the ratio is defined as zero).
    pub fn variance_ratio(&self, other: Money) -> Decimal {
        let denom = self.0.abs().max(other.0.abs());
        if denom.is_zero() {
            return Decimal::ZERO;
        }
        (self.0 - other.0).abs() / denom
    }

    /// True when `self` equals `other` within `tolerance` absolute units.
    pub fn within_tolerance(&self, other: Money, tolerance: Money) -> bool {
        (self.0 - other.0).abs() <= tolerance.0
    }
}

impl TryFrom<Decimal> for Money {
    type Error = core::convert::Infallible;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Ok(Self::new(value))
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// An ISO 4217 currency code, always stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let upper = s.trim().to_uppercase();
        if upper.len() != 3 || !upper.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::validation(format!(
                "invalid ISO 4217 currency code: '{s}'"
            )));
        }
        Ok(Self(upper))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_strips_symbols() {
        let m = Money::parse("$1,045.00").unwrap();
        assert_eq!(m.to_string(), "1045.00");
    }

    #[test]
    fn variance_ratio_matches_spec_example() {
        let po = Money::from_cents(100_000); // 1000.00
        let inv = Money::from_cents(104_500); // 1045.00
        let r = po.variance_ratio(inv);
        assert_eq!(r.round_dp(3), Decimal::new(45, 3)); // 0.045
    }

    #[test]
    fn currency_code_uppercases() {
        assert_eq!(CurrencyCode::parse("usd").unwrap().as_str(), "USD");
        assert!(CurrencyCode::parse("US").is_err());
    }
}
