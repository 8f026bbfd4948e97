//! Fixed-precision decimal types for prices and amounts
//!
//! Uses rust_decimal for exact arithmetic (no binary floating point at any
//! layer). Values carry up to 8 fractional digits; excess digits are rounded
//! HALF_UP during normalization. The canonical text form has no exponent and
//! keeps a single zero after the point for integral values ("30000.0").

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

/// Maximum fractional digits carried by prices and amounts.
pub const SCALE: u32 = 8;

/// Round to the supported scale and strip trailing zeros.
fn canonicalize(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// Write a decimal in canonical text form.
fn write_canonical(value: Decimal, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if value.fract().is_zero() {
        write!(f, "{}.0", value.trunc())
    } else {
        write!(f, "{}", value)
    }
}

/// Price type with fixed-precision decimal representation
///
/// Always strictly positive. Serialized as a string to prevent JSON number
/// precision loss. The f64 projection is only ever used as a secondary
/// ordering key; comparisons between prices go through the decimal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price from a Decimal
    ///
    /// # Panics
    /// Panics if the price is negative or zero
    pub fn new(value: Decimal) -> Self {
        assert!(value > Decimal::ZERO, "Price must be positive");
        Self(canonicalize(value))
    }

    /// Try to create a Price, returning None if not strictly positive
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(canonicalize(value)))
        } else {
            None
        }
    }

    /// Create from integer (for testing/convenience)
    pub fn from_u64(value: u64) -> Self {
        Self::new(Decimal::from(value))
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Project onto the store's score domain.
    ///
    /// Lossy for extreme magnitudes; never used for equality decisions.
    pub fn to_score(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s)?;
        Ok(Self::new(decimal))
    }
}

impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("Price must be positive"))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_canonical(self.0, f)
    }
}

/// Amount (quantity) type with fixed-precision decimal representation
///
/// Non-negative: zero is a valid value for the remaining quantity of a
/// filled order. Serialized as a string, same as [`Price`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    /// Create a new Amount from a Decimal
    ///
    /// # Panics
    /// Panics if the amount is negative
    pub fn new(value: Decimal) -> Self {
        assert!(value >= Decimal::ZERO, "Amount cannot be negative");
        Self(canonicalize(value))
    }

    /// Try to create an Amount, returning None if negative
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(canonicalize(value)))
        } else {
            None
        }
    }

    /// Zero amount (remaining quantity of a fully filled order)
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Create from integer (for testing/convenience)
    pub fn from_u64(value: u64) -> Self {
        Self::new(Decimal::from(value))
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Check if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Check if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Subtract, clamping at zero.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if rhs.0 >= self.0 {
            Self::zero()
        } else {
            Self(self.0 - rhs.0)
        }
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s)?;
        Ok(Self::new(decimal))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("Amount cannot be negative"))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_canonical(self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_creation() {
        let price = Price::from_u64(30000);
        assert_eq!(price.as_decimal(), Decimal::from(30000));
    }

    #[test]
    #[should_panic(expected = "Price must be positive")]
    fn test_price_zero_panics() {
        Price::new(Decimal::ZERO);
    }

    #[test]
    fn test_price_canonical_text() {
        assert_eq!(Price::from_u64(30000).to_string(), "30000.0");
        assert_eq!("1.50".parse::<Price>().unwrap().to_string(), "1.5");
        assert_eq!("0.00000001".parse::<Price>().unwrap().to_string(), "0.00000001");
    }

    #[test]
    fn test_canonical_roundtrip() {
        for text in ["30000.0", "1.5", "0.00000001", "49900.25"] {
            let price: Price = text.parse().unwrap();
            assert_eq!(price.to_string(), text);
        }
    }

    #[test]
    fn test_excess_scale_rounded_half_up() {
        let price: Price = "1.234567895".parse().unwrap();
        assert_eq!(price.to_string(), "1.2345679");
    }

    #[test]
    fn test_price_serialization() {
        let price: Price = "30000.25".parse().unwrap();
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"30000.25\"");

        let deserialized: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(price, deserialized);
    }

    #[test]
    fn test_negative_price_rejected_on_deserialize() {
        assert!(serde_json::from_str::<Price>("\"-5\"").is_err());
        assert!(serde_json::from_str::<Price>("\"0\"").is_err());
    }

    #[test]
    fn test_amount_zero() {
        let amount = Amount::zero();
        assert!(amount.is_zero());
        assert!(!amount.is_positive());
        assert_eq!(amount.to_string(), "0.0");
    }

    #[test]
    fn test_amount_addition() {
        let a: Amount = "2.5".parse().unwrap();
        let b: Amount = "1.5".parse().unwrap();

        assert_eq!((a + b).to_string(), "4.0");
    }

    #[test]
    fn test_amount_saturating_sub() {
        let a: Amount = "1.0".parse().unwrap();
        let b: Amount = "2.5".parse().unwrap();
        assert!(a.saturating_sub(b).is_zero());
        assert_eq!(b.saturating_sub(a).to_string(), "1.5");
    }

    #[test]
    fn test_amount_min() {
        let a: Amount = "1.5".parse().unwrap();
        let b: Amount = "1.0".parse().unwrap();
        assert_eq!(a.min(b), b);
    }

    #[test]
    fn test_score_projection_orders_like_decimal() {
        let low: Price = "49800.0".parse().unwrap();
        let high: Price = "49900.0".parse().unwrap();
        assert!(low.to_score() < high.to_score());
    }

    #[test]
    fn test_deterministic_comparison() {
        let a: Price = "30000.00000001".parse().unwrap();
        let b: Price = "30000.00000002".parse().unwrap();
        assert!(a < b);
        assert_ne!(a, b);
    }
}
