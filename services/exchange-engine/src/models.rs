use serde::{Deserialize, Serialize};
use serde_json::Value;
use types::ids::OrderId;

/// Body of `POST /api/v1/orders`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub trading_pair: String,
    pub side: String,
    /// Decimal string; required for limit orders, ignored for market orders.
    #[serde(default)]
    pub price: Option<String>,
    pub amount: String,
    /// "limit" (default) or "market".
    #[serde(rename = "type", default)]
    pub order_type: Option<String>,
}

/// 202 response: the order was accepted onto the symbol's pending queue.
#[derive(Debug, Clone, Serialize)]
pub struct OrderAccepted {
    pub order_id: OrderId,
}

/// `GET /health` response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub time: i64,
    pub trading_pairs: Vec<String>,
    pub store_reachable: bool,
}

/// `GET /api/v1/failed_orders` response
#[derive(Debug, Clone, Serialize)]
pub struct FailedOrdersResponse {
    pub failed_orders: Vec<Value>,
}
