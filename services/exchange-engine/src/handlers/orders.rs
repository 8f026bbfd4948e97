//! Order ingress handlers
//!
//! Ingress validates, assigns the order id, and enqueues onto the symbol's
//! pending list. Clients never observe matching latency: every accepted
//! intent returns 202 immediately and the processor picks it up from there.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use store::{keys, Store};
use tracing::info;
use types::clock;
use types::ids::{OrderId, Symbol};
use types::numeric::{Amount, Price};
use types::order::{Order, OrderType, Side};

use crate::error::ApiError;
use crate::models::{CreateOrderRequest, FailedOrdersResponse, OrderAccepted};
use crate::state::AppState;

/// Cap on entries returned from the failed queues.
const FAILED_ORDERS_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct PairQuery {
    pub trading_pair: String,
}

/// `POST /api/v1/orders`
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderAccepted>), ApiError> {
    let symbol = state
        .lookup_symbol(&payload.trading_pair)
        .cloned()
        .ok_or_else(|| {
            ApiError::BadRequest(format!("unknown trading pair: {}", payload.trading_pair))
        })?;

    let side = Side::parse(&payload.side)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid side: {}", payload.side)))?;

    let type_raw = payload.order_type.as_deref().unwrap_or("limit");
    let order_type = match OrderType::parse(type_raw) {
        Some(OrderType::Limit) => OrderType::Limit,
        Some(OrderType::Market) => OrderType::Market,
        _ => {
            return Err(ApiError::BadRequest(format!(
                "invalid order type: {}",
                type_raw
            )))
        }
    };

    let amount = parse_positive_amount(&payload.amount)?;

    let now = clock::unix_now();
    let order_id = OrderId::generate(now);

    let mut intent = json!({
        "id": order_id,
        "trading_pair": symbol.as_str(),
        "type": order_type.as_str(),
        "side": side.as_str(),
        "amount": amount.to_string(),
        "timestamp": now,
    });
    if order_type == OrderType::Limit {
        let price_raw = payload
            .price
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("price is required for limit orders".into()))?;
        let price = parse_positive_price(price_raw)?;
        intent["price"] = Value::String(price.to_string());
    }

    state
        .store
        .list_push_left(&keys::pending(symbol.as_str()), &intent.to_string())
        .await?;

    info!(order = %order_id, symbol = %symbol, "order accepted");
    Ok((StatusCode::ACCEPTED, Json(OrderAccepted { order_id })))
}

/// `DELETE /api/v1/orders/{id}?trading_pair=X`
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(query): Query<PairQuery>,
) -> Result<StatusCode, ApiError> {
    let symbol = require_symbol(&state, &query.trading_pair)?;

    let intent = json!({
        "id": order_id,
        "trading_pair": symbol.as_str(),
        "type": "cancel",
    });
    state
        .store
        .list_push_left(&keys::pending(symbol.as_str()), &intent.to_string())
        .await?;

    info!(order = %order_id, symbol = %symbol, "cancel accepted");
    Ok(StatusCode::ACCEPTED)
}

/// `GET /api/v1/orders/{id}?trading_pair=X`
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(query): Query<PairQuery>,
) -> Result<Json<Order>, ApiError> {
    let symbol = require_symbol(&state, &query.trading_pair)?;

    let fields = state
        .store
        .hash_get_all(&keys::order(symbol.as_str(), &order_id))
        .await?;
    if fields.is_empty() {
        return Err(ApiError::NotFound(format!("order {}", order_id)));
    }
    let order = Order::from_fields(&fields)
        .map_err(|err| ApiError::StoreUnavailable(format!("unreadable order record: {}", err)))?;
    Ok(Json(order))
}

/// `GET /api/v1/failed_orders`
pub async fn failed_orders(
    State(state): State<AppState>,
) -> Result<Json<FailedOrdersResponse>, ApiError> {
    let mut entries = Vec::new();
    for symbol in state.registry.iter() {
        if entries.len() >= FAILED_ORDERS_LIMIT {
            break;
        }
        let remaining = FAILED_ORDERS_LIMIT - entries.len();
        let raw = state
            .store
            .list_range(
                &keys::failed_orders(symbol.as_str()),
                0,
                remaining as isize - 1,
            )
            .await?;
        for item in raw {
            let value =
                serde_json::from_str::<Value>(&item).unwrap_or(Value::String(item));
            entries.push(value);
        }
    }
    Ok(Json(FailedOrdersResponse {
        failed_orders: entries,
    }))
}

fn require_symbol(state: &AppState, tag: &str) -> Result<Symbol, ApiError> {
    state
        .lookup_symbol(tag)
        .cloned()
        .ok_or_else(|| ApiError::BadRequest(format!("unknown trading pair: {}", tag)))
}

fn parse_positive_price(raw: &str) -> Result<Price, ApiError> {
    Decimal::from_str(raw)
        .ok()
        .and_then(Price::try_new)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid price: {}", raw)))
}

fn parse_positive_amount(raw: &str) -> Result<Amount, ApiError> {
    Decimal::from_str(raw)
        .ok()
        .and_then(Amount::try_new)
        .filter(Amount::is_positive)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid amount: {}", raw)))
}
