//! Fixed-point money handling.
//!
//! The canonical internal amount type is a decimal with exactly two fractional
//! digits, regardless of how a given provider represents amounts on the wire
//! (some accept two decimal places, others require the currency's minor unit
//! as an integer). Each adapter is responsible for its own wire conversion;
//! this module only guards the internal representation.

use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("invalid amount format")]
    InvalidFormat,
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount may carry at most two fractional digits")]
    TooPrecise,
}

/// A non-negative amount with exactly two fractional digits of precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Validates and normalises a decimal amount to two fractional digits.
    ///
    /// Rejects zero, negative, and over-precise values. Callers that need a
    /// zero-or-negative check skipped (e.g. storing a provider's echoed
    /// amount) should use [`Money::from_decimal_unchecked`] instead.
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value <= Decimal::ZERO {
            return Err(MoneyError::NotPositive);
        }
        if value.scale() > 2 {
            return Err(MoneyError::TooPrecise);
        }
        Ok(Money(value.round_dp(2)))
    }

    /// Accepts any non-negative decimal, rounding to two fractional digits.
    ///
    /// Used for amounts we must store verbatim even if outside the strict
    /// ingress validation (e.g. a provider's response echo).
    pub fn from_decimal_unchecked(value: Decimal) -> Self {
        Money(value.round_dp(2))
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Formats the amount with exactly two decimal places, as required by
    /// every provider's signed-payload checksum construction.
    pub fn to_fixed_string(&self) -> String {
        format!("{:.2}", self.0)
    }

    /// The amount expressed as an integer count of the currency's minor unit
    /// (cents), dropping the decimal point. Used by adapters whose upstream
    /// protocol accepts integer-only amounts (e.g. the OAuth-gated provider).
    pub fn minor_units(&self) -> i64 {
        (self.0.round_dp(2) * Decimal::from(100)).trunc().to_string().parse().unwrap_or(0)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = Decimal::from_str(s).map_err(|_| MoneyError::InvalidFormat)?;
        Money::new(parsed)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fixed_string())
    }
}

/// An ISO-4217-style three-letter currency code, always upper-cased on
/// construction (e.g. `"LSL"`, `"KES"`, `"USD"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

static CURRENCY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]{3}$").unwrap());

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("currency code must be exactly three letters")]
pub struct CurrencyCodeError;

impl CurrencyCode {
    pub fn parse(s: &str) -> Result<Self, CurrencyCodeError> {
        if !CURRENCY_PATTERN.is_match(s) {
            return Err(CurrencyCodeError);
        }
        let upper = s.to_ascii_uppercase();
        let bytes = upper.as_bytes();
        Ok(CurrencyCode([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).expect("currency code is ASCII")
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CurrencyCode::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.as_str().to_string()
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_negative() {
        assert_eq!(Money::new(Decimal::ZERO), Err(MoneyError::NotPositive));
        assert_eq!(Money::new(Decimal::new(-100, 2)), Err(MoneyError::NotPositive));
    }

    #[test]
    fn rejects_over_precise_amounts() {
        assert_eq!(Money::new(Decimal::new(12345, 3)), Err(MoneyError::TooPrecise));
    }

    #[test]
    fn formats_with_two_decimals() {
        let m = Money::new(Decimal::new(500, 1)).unwrap(); // 50.0
        assert_eq!(m.to_fixed_string(), "50.00");
        assert_eq!(m.minor_units(), 5000);
    }

    #[test]
    fn currency_code_uppercases() {
        let c = CurrencyCode::parse("lsl").unwrap();
        assert_eq!(c.as_str(), "LSL");
        assert!(CurrencyCode::parse("LS").is_err());
        assert!(CurrencyCode::parse("LSLL").is_err());
    }
}
