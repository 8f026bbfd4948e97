//! Order lifecycle types
//!
//! An order moves open -> (partially_filled)* -> filled | cancelled | failed.
//! Terminal statuses are write-once. Orders persist in the store as string
//! field maps, so every enum here has a stable wire name.

use crate::ids::{OrderId, Symbol};
use crate::numeric::{Amount, Price};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order type
///
/// Cancel intents carry only id + symbol and never persist as resting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
    Cancel,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
            OrderType::Cancel => "cancel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "limit" => Some(OrderType::Limit),
            "market" => Some(OrderType::Market),
            "cancel" => Some(OrderType::Cancel),
            _ => None,
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Failed,
}

impl OrderStatus {
    /// Check if the status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(OrderStatus::Open),
            "partially_filled" => Some(OrderStatus::PartiallyFilled),
            "filled" => Some(OrderStatus::Filled),
            "cancelled" => Some(OrderStatus::Cancelled),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error decoding an order from its store field map
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderFieldError {
    #[error("missing order field: {0}")]
    MissingField(&'static str),

    #[error("invalid order field {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Complete order record
///
/// `remaining` tracks the open quantity: remaining = amount - total traded.
/// `price` is present for limit orders only. `error` is set iff the order
/// failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub amount: Amount,
    pub remaining: Amount,
    pub status: OrderStatus,
    pub timestamp: i64,
    pub error: Option<String>,
}

impl Order {
    /// Create a new open limit order
    pub fn new_limit(
        id: OrderId,
        symbol: Symbol,
        side: Side,
        price: Price,
        amount: Amount,
        timestamp: i64,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            order_type: OrderType::Limit,
            price: Some(price),
            amount,
            remaining: amount,
            status: OrderStatus::Open,
            timestamp,
            error: None,
        }
    }

    /// Create a new open market order
    pub fn new_market(
        id: OrderId,
        symbol: Symbol,
        side: Side,
        amount: Amount,
        timestamp: i64,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            order_type: OrderType::Market,
            price: None,
            amount,
            remaining: amount,
            status: OrderStatus::Open,
            timestamp,
            error: None,
        }
    }

    /// Whether the order can still trade or be cancelled
    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Open | OrderStatus::PartiallyFilled
        )
    }

    /// Check quantity invariant: remaining never exceeds the original amount
    pub fn check_invariant(&self) -> bool {
        self.remaining.as_decimal() <= self.amount.as_decimal()
    }

    /// Encode as the store hash field map
    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".to_string(), self.id.to_string()),
            ("symbol".to_string(), self.symbol.to_string()),
            ("side".to_string(), self.side.as_str().to_string()),
            ("type".to_string(), self.order_type.as_str().to_string()),
            ("amount".to_string(), self.amount.to_string()),
            ("remaining".to_string(), self.remaining.to_string()),
            ("status".to_string(), self.status.as_str().to_string()),
            ("timestamp".to_string(), self.timestamp.to_string()),
        ];
        if let Some(price) = self.price {
            fields.push(("price".to_string(), price.to_string()));
        }
        if let Some(error) = &self.error {
            fields.push(("error".to_string(), error.clone()));
        }
        fields
    }

    /// Decode from the store hash field map
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, OrderFieldError> {
        fn required<'a>(
            fields: &'a HashMap<String, String>,
            name: &'static str,
        ) -> Result<&'a str, OrderFieldError> {
            fields
                .get(name)
                .map(String::as_str)
                .ok_or(OrderFieldError::MissingField(name))
        }

        let invalid = |field: &'static str, value: &str| OrderFieldError::InvalidField {
            field,
            value: value.to_string(),
        };

        let side_raw = required(fields, "side")?;
        let type_raw = required(fields, "type")?;
        let status_raw = required(fields, "status")?;
        let amount_raw = required(fields, "amount")?;
        let remaining_raw = required(fields, "remaining")?;
        let timestamp_raw = required(fields, "timestamp")?;

        let price = match fields.get("price") {
            Some(raw) => Some(raw.parse::<Price>().map_err(|_| invalid("price", raw))?),
            None => None,
        };

        Ok(Self {
            id: OrderId::from_string(required(fields, "id")?),
            symbol: Symbol::try_new(required(fields, "symbol")?)
                .ok_or_else(|| invalid("symbol", fields.get("symbol").map_or("", String::as_str)))?,
            side: Side::parse(side_raw).ok_or_else(|| invalid("side", side_raw))?,
            order_type: OrderType::parse(type_raw).ok_or_else(|| invalid("type", type_raw))?,
            price,
            amount: amount_raw
                .parse::<Amount>()
                .map_err(|_| invalid("amount", amount_raw))?,
            remaining: remaining_raw
                .parse::<Amount>()
                .map_err(|_| invalid("remaining", remaining_raw))?,
            status: OrderStatus::parse(status_raw).ok_or_else(|| invalid("status", status_raw))?,
            timestamp: timestamp_raw
                .parse::<i64>()
                .map_err(|_| invalid("timestamp", timestamp_raw))?,
            error: fields.get("error").cloned(),
        })
    }
}
