//! Trade records
//!
//! A trade is immutable once created: it is written in the same atomic batch
//! as the order updates that produced it and never mutated afterwards.

use crate::ids::{OrderId, Symbol, TradeId};
use crate::numeric::{Amount, Price};
use serde::{Deserialize, Serialize};

/// An executed trade between a resting bid and a resting ask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: Symbol,
    pub price: Price,
    pub amount: Amount,
    pub bid_order_id: OrderId,
    pub ask_order_id: OrderId,
    pub timestamp: i64,
}

impl Trade {
    /// Create a new trade, generating its id from the execution timestamp
    pub fn new(
        symbol: Symbol,
        price: Price,
        amount: Amount,
        bid_order_id: OrderId,
        ask_order_id: OrderId,
        timestamp: i64,
    ) -> Self {
        Self {
            id: TradeId::generate(timestamp),
            symbol,
            price,
            amount,
            bid_order_id,
            ask_order_id,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade() -> Trade {
        Trade::new(
            Symbol::new("BTCUSDT"),
            "30000".parse().unwrap(),
            "0.5".parse().unwrap(),
            OrderId::from_string("order:1708123456:000000b1"),
            OrderId::from_string("order:1708123457:000000a1"),
            1708123458,
        )
    }

    #[test]
    fn test_trade_id_embeds_timestamp() {
        let trade = sample_trade();
        assert!(trade.id.as_str().starts_with("trade:1708123458:"));
    }

    #[test]
    fn test_trade_json_roundtrip() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let decoded: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, decoded);
    }

    #[test]
    fn test_trade_serializes_decimals_as_strings() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        assert!(json.contains("\"price\":\"30000.0\""));
        assert!(json.contains("\"amount\":\"0.5\""));
    }
}
