//! Authoritative key layout
//!
//! ```text
//! pending:{symbol}            list of JSON order payloads (right = oldest)
//! failed_orders:{symbol}      list of JSON {order, error, timestamp}
//! order:{symbol}:{id}         hash of order fields
//! {symbol}:buy_orders         sorted set, score = price
//! {symbol}:sell_orders        sorted set, score = price
//! trades:{symbol}             list of JSON trades, newest at head, cap 1000
//! trading_pairs               set of active symbols
//! metrics:{symbol}:{op}       sorted set, score = timestamp
//! count:{symbol}:{op}         integer counter
//! ```

/// Set of active symbols; processors are started only for members.
pub const TRADING_PAIRS: &str = "trading_pairs";

pub fn pending(symbol: &str) -> String {
    format!("pending:{}", symbol)
}

pub fn failed_orders(symbol: &str) -> String {
    format!("failed_orders:{}", symbol)
}

pub fn order(symbol: &str, order_id: &str) -> String {
    format!("order:{}:{}", symbol, order_id)
}

pub fn buy_orders(symbol: &str) -> String {
    format!("{}:buy_orders", symbol)
}

pub fn sell_orders(symbol: &str) -> String {
    format!("{}:sell_orders", symbol)
}

pub fn trades(symbol: &str) -> String {
    format!("trades:{}", symbol)
}

pub fn metrics(symbol: &str, op: &str) -> String {
    format!("metrics:{}:{}", symbol, op)
}

pub fn op_count(symbol: &str, op: &str) -> String {
    format!("count:{}:{}", symbol, op)
}
