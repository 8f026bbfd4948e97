//! Identifier types for exchange entities
//!
//! Order and trade ids are opaque strings in the wire format
//! `order:{unix_ts}:{rand_hex}` / `trade:{unix_ts}:{rand_hex}`, assigned at
//! ingress so the embedded timestamp makes ids sort chronologically.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading-pair symbol (e.g. "BTCUSDT")
///
/// Tags are case-insensitive and canonicalized to uppercase, so any casing
/// of the same pair names the same store keys. Non-empty, no whitespace or
/// ':' (symbols are embedded in key paths).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new Symbol
    ///
    /// # Panics
    /// Panics if the tag is empty or contains whitespace
    pub fn new(tag: impl Into<String>) -> Self {
        Self::try_new(tag).expect("Symbol must be non-empty without whitespace")
    }

    /// Try to create a Symbol, returning None if invalid
    pub fn try_new(tag: impl Into<String>) -> Option<Self> {
        let s = tag.into();
        if s.is_empty() || s.contains(char::is_whitespace) || s.contains(':') {
            None
        } else {
            Some(Self(s.to_ascii_uppercase()))
        }
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generate a fresh id embedding the given unix-seconds timestamp
    pub fn generate(unix_ts: i64) -> Self {
        Self(format!("order:{}:{:08x}", unix_ts, rand::random::<u32>()))
    }

    /// Wrap an existing id string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a trade
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(String);

impl TradeId {
    /// Generate a fresh id embedding the given unix-seconds timestamp
    pub fn generate(unix_ts: i64) -> Self {
        Self(format!("trade:{}:{:08x}", unix_ts, rand::random::<u32>()))
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
