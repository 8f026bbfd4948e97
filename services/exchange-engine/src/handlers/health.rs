//! Health and telemetry handlers

use axum::extract::State;
use axum::Json;
use matching_engine::{PerformanceMonitor, SymbolMetrics};
use std::sync::Arc;
use store::Store;
use types::clock;

use crate::error::ApiError;
use crate::models::HealthResponse;
use crate::state::AppState;

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_reachable = state.store.ping().await.is_ok();
    Json(HealthResponse {
        status: if store_reachable { "ok" } else { "degraded" },
        time: clock::unix_now(),
        trading_pairs: state
            .registry
            .iter()
            .map(|symbol| symbol.to_string())
            .collect(),
        store_reachable,
    })
}

/// `GET /api/v1/metrics`
pub async fn metrics(State(state): State<AppState>) -> Result<Json<Vec<SymbolMetrics>>, ApiError> {
    let monitor = PerformanceMonitor::new(Arc::clone(&state.store));
    let metrics = monitor.metrics().await?;
    Ok(Json(metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{MemoryStore, Store};
    use types::ids::Symbol;

    #[tokio::test]
    async fn test_health_reports_symbols_and_reachability() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            store as Arc<dyn Store>,
            vec![Symbol::new("BTCUSDT"), Symbol::new("ETHUSDT")],
        );

        let response = health(State(state)).await;
        assert_eq!(response.0.status, "ok");
        assert!(response.0.store_reachable);
        assert_eq!(response.0.trading_pairs, vec!["BTCUSDT", "ETHUSDT"]);
        assert!(response.0.time > 0);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_covers_registered_symbols() {
        let store = Arc::new(MemoryStore::new());
        store.set_add("trading_pairs", "BTCUSDT").await.unwrap();
        let state = AppState::new(
            Arc::clone(&store) as Arc<dyn Store>,
            vec![Symbol::new("BTCUSDT")],
        );

        let response = metrics(State(state)).await.unwrap();
        assert_eq!(response.0.len(), 1);
        assert_eq!(response.0[0].symbol, "BTCUSDT");
    }
}
