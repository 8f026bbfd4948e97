//! Validation boundary for inbound order payloads
//!
//! The pending list carries loosely-typed JSON. Everything past this module
//! works with the tagged [`OrderIntent`] variant instead: parse once,
//! validate once, and the book never sees a malformed order.

use serde_json::Value;
use types::errors::ValidationError;
use types::ids::{OrderId, Symbol};
use types::numeric::{Amount, Price};
use types::order::{Order, OrderType, Side};

/// A validated order intent popped from a pending list
#[derive(Debug, Clone, PartialEq)]
pub enum OrderIntent {
    Limit {
        id: OrderId,
        symbol: Symbol,
        side: Side,
        price: Price,
        amount: Amount,
        timestamp: i64,
    },
    Market {
        id: OrderId,
        symbol: Symbol,
        side: Side,
        amount: Amount,
        timestamp: i64,
    },
    Cancel { id: OrderId, symbol: Symbol },
}

impl OrderIntent {
    pub fn symbol(&self) -> &Symbol {
        match self {
            OrderIntent::Limit { symbol, .. } => symbol,
            OrderIntent::Market { symbol, .. } => symbol,
            OrderIntent::Cancel { symbol, .. } => symbol,
        }
    }

    pub fn id(&self) -> &OrderId {
        match self {
            OrderIntent::Limit { id, .. } => id,
            OrderIntent::Market { id, .. } => id,
            OrderIntent::Cancel { id, .. } => id,
        }
    }

    /// Operation label used for latency metrics and counters.
    pub fn op_name(&self) -> &'static str {
        match self {
            OrderIntent::Limit { .. } => "add_limit",
            OrderIntent::Market { .. } => "add_market",
            OrderIntent::Cancel { .. } => "cancel",
        }
    }

    /// Build the order record a limit/market intent persists as.
    ///
    /// Cancel intents have no order representation and return None.
    pub fn to_order(&self) -> Option<Order> {
        match self {
            OrderIntent::Limit {
                id,
                symbol,
                side,
                price,
                amount,
                timestamp,
            } => Some(Order::new_limit(
                id.clone(),
                symbol.clone(),
                *side,
                *price,
                *amount,
                *timestamp,
            )),
            OrderIntent::Market {
                id,
                symbol,
                side,
                amount,
                timestamp,
            } => Some(Order::new_market(
                id.clone(),
                symbol.clone(),
                *side,
                *amount,
                *timestamp,
            )),
            OrderIntent::Cancel { .. } => None,
        }
    }
}

/// Parse and validate one raw pending-list payload.
///
/// `now` supplies the timestamp for payloads that carry none.
pub fn parse_payload(raw: &str, now: i64) -> Result<OrderIntent, ValidationError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| ValidationError::MalformedPayload(err.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ValidationError::MalformedPayload("expected a JSON object".to_string()))?;

    let pair = obj
        .get("trading_pair")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingField("trading_pair"))?;
    let symbol =
        Symbol::try_new(pair).ok_or_else(|| ValidationError::UnknownSymbol(pair.to_string()))?;

    let type_raw = obj.get("type").and_then(Value::as_str).unwrap_or("limit");
    let order_type = OrderType::parse(type_raw)
        .ok_or_else(|| ValidationError::UnknownOrderType(type_raw.to_string()))?;

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .map(OrderId::from_string)
        .ok_or(ValidationError::MissingField("id"))?;

    if order_type == OrderType::Cancel {
        return Ok(OrderIntent::Cancel { id, symbol });
    }

    let side_raw = obj
        .get("side")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingField("side"))?;
    let side = Side::parse(side_raw)
        .ok_or_else(|| ValidationError::MalformedPayload(format!("unknown side: {}", side_raw)))?;

    let amount = positive_amount(obj, "amount")?;
    let timestamp = obj
        .get("timestamp")
        .and_then(Value::as_i64)
        .unwrap_or(now);

    match order_type {
        OrderType::Limit => {
            let price_raw =
                decimal_text(obj, "price").ok_or(ValidationError::MissingField("price"))?;
            let price = price_raw
                .parse::<rust_decimal::Decimal>()
                .ok()
                .and_then(Price::try_new)
                .ok_or_else(|| ValidationError::InvalidPrice(price_raw.clone()))?;
            Ok(OrderIntent::Limit {
                id,
                symbol,
                side,
                price,
                amount,
                timestamp,
            })
        }
        OrderType::Market => Ok(OrderIntent::Market {
            id,
            symbol,
            side,
            amount,
            timestamp,
        }),
        OrderType::Cancel => unreachable!("cancel handled above"),
    }
}

/// Read a decimal field that clients may send as string or JSON number.
fn decimal_text(obj: &serde_json::Map<String, Value>, name: &str) -> Option<String> {
    match obj.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn positive_amount(
    obj: &serde_json::Map<String, Value>,
    name: &'static str,
) -> Result<Amount, ValidationError> {
    let raw = decimal_text(obj, name).ok_or(ValidationError::MissingField(name))?;
    raw.parse::<rust_decimal::Decimal>()
        .ok()
        .and_then(Amount::try_new)
        .filter(Amount::is_positive)
        .ok_or(ValidationError::InvalidAmount(raw))
}
