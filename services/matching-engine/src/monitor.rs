//! Operational telemetry
//!
//! Latency samples land in per-(symbol, operation) sorted sets keyed by
//! timestamp; samples older than one hour are evicted on the way in. The
//! aggregate view adds queue length and resting-order gauges per symbol.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use store::{keys, Store, StoreError, WriteOp};
use tracing::debug;
use types::clock;
use types::ids::Symbol;

/// Trailing window for latency aggregation.
pub const METRICS_WINDOW_SECS: i64 = 3600;

/// Operations tracked per symbol.
pub const OPERATIONS: [&str; 3] = ["add_limit", "add_market", "cancel"];

/// Aggregated latency statistics for one operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpStats {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Telemetry snapshot for one symbol
#[derive(Debug, Clone, Serialize)]
pub struct SymbolMetrics {
    pub symbol: String,
    pub queue_length: u64,
    pub resting_buy_orders: u64,
    pub resting_sell_orders: u64,
    pub operations: BTreeMap<String, OpStats>,
}

/// Records operation latencies and serves aggregate views.
#[derive(Clone)]
pub struct PerformanceMonitor {
    store: Arc<dyn Store>,
}

impl PerformanceMonitor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record one operation latency and bump its counter.
    ///
    /// Samples older than the trailing window are evicted in the same pass.
    pub async fn record(
        &self,
        operation: &str,
        duration_ms: f64,
        symbol: &Symbol,
    ) -> Result<(), StoreError> {
        let now = clock::unix_now();
        let key = keys::metrics(symbol.as_str(), operation);
        // Member embeds a microsecond stamp so equal durations stay distinct.
        let member = format!("{}:{}", clock::unix_now_micros(), duration_ms);
        self.store.zset_add(&key, now as f64, &member).await?;

        let cutoff = (now - METRICS_WINDOW_SECS) as f64;
        let stale = self.store.zset_range_by_score(&key, 0.0, cutoff).await?;
        if !stale.is_empty() {
            debug!(key = %key, evicted = stale.len(), "evicting stale latency samples");
            let ops = stale
                .into_iter()
                .map(|member| WriteOp::ZRem {
                    key: key.clone(),
                    member,
                })
                .collect();
            self.store.txn(ops).await?;
        }

        self.store
            .counter_incr(&keys::op_count(symbol.as_str(), operation))
            .await?;
        Ok(())
    }

    /// Latency samples for the trailing window, unsorted.
    pub async fn samples(&self, operation: &str, symbol: &Symbol) -> Result<Vec<f64>, StoreError> {
        let key = keys::metrics(symbol.as_str(), operation);
        let cutoff = (clock::unix_now() - METRICS_WINDOW_SECS) as f64;
        let members = self
            .store
            .zset_range_by_score(&key, cutoff, f64::INFINITY)
            .await?;
        Ok(members
            .iter()
            .filter_map(|member| member.split_once(':'))
            .filter_map(|(_, duration)| duration.parse::<f64>().ok())
            .collect())
    }

    /// Percentile over the trailing window by nearest rank.
    pub async fn percentile(
        &self,
        operation: &str,
        p: f64,
        symbol: &Symbol,
    ) -> Result<Option<f64>, StoreError> {
        let mut samples = self.samples(operation, symbol).await?;
        samples.sort_by(f64::total_cmp);
        Ok(nearest_rank(&samples, p))
    }

    /// Full telemetry snapshot across every registered symbol.
    pub async fn metrics(&self) -> Result<Vec<SymbolMetrics>, StoreError> {
        let mut tags = self.store.set_members(keys::TRADING_PAIRS).await?;
        tags.sort();

        let mut result = Vec::with_capacity(tags.len());
        for tag in tags {
            let symbol = match Symbol::try_new(&tag) {
                Some(symbol) => symbol,
                None => continue,
            };
            let queue_length = self.store.list_len(&keys::pending(&tag)).await?;
            let resting_buy_orders = self.store.zset_card(&keys::buy_orders(&tag)).await?;
            let resting_sell_orders = self.store.zset_card(&keys::sell_orders(&tag)).await?;

            let mut operations = BTreeMap::new();
            for op in OPERATIONS {
                let mut samples = self.samples(op, &symbol).await?;
                if samples.is_empty() {
                    continue;
                }
                samples.sort_by(f64::total_cmp);
                operations.insert(op.to_string(), aggregate(&samples));
            }

            result.push(SymbolMetrics {
                symbol: tag,
                queue_length,
                resting_buy_orders,
                resting_sell_orders,
                operations,
            });
        }
        Ok(result)
    }
}

/// Nearest-rank percentile over sorted samples.
fn nearest_rank(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    Some(sorted[rank.clamp(1, sorted.len()) - 1])
}

fn aggregate(sorted: &[f64]) -> OpStats {
    let count = sorted.len();
    let sum: f64 = sorted.iter().sum();
    OpStats {
        count,
        min_ms: sorted[0],
        max_ms: sorted[count - 1],
        avg_ms: sum / count as f64,
        p95_ms: nearest_rank(sorted, 95.0).unwrap_or(0.0),
        p99_ms: nearest_rank(sorted, 99.0).unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryStore;

    fn make_monitor() -> (PerformanceMonitor, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            PerformanceMonitor::new(Arc::clone(&store) as Arc<dyn Store>),
            store,
        )
    }

    #[tokio::test]
    async fn test_record_and_count() {
        let (monitor, store) = make_monitor();
        let symbol = Symbol::new("BTCUSDT");

        monitor.record("add_limit", 1.5, &symbol).await.unwrap();
        monitor.record("add_limit", 2.5, &symbol).await.unwrap();

        assert_eq!(
            store.counter_get("count:BTCUSDT:add_limit").await.unwrap(),
            2
        );
        let samples = monitor.samples("add_limit", &symbol).await.unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[tokio::test]
    async fn test_percentiles() {
        let (monitor, _) = make_monitor();
        let symbol = Symbol::new("BTCUSDT");

        for duration in 1..=100 {
            monitor
                .record("add_limit", duration as f64, &symbol)
                .await
                .unwrap();
        }

        let p50 = monitor
            .percentile("add_limit", 50.0, &symbol)
            .await
            .unwrap()
            .unwrap();
        let p99 = monitor
            .percentile("add_limit", 99.0, &symbol)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p50, 50.0);
        assert_eq!(p99, 99.0);
    }

    #[tokio::test]
    async fn test_percentile_empty_is_none() {
        let (monitor, _) = make_monitor();
        let symbol = Symbol::new("BTCUSDT");
        assert!(monitor
            .percentile("cancel", 95.0, &symbol)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_metrics_snapshot_includes_gauges() {
        let (monitor, store) = make_monitor();
        let symbol = Symbol::new("BTCUSDT");

        store.set_add("trading_pairs", "BTCUSDT").await.unwrap();
        store
            .list_push_left("pending:BTCUSDT", "{}")
            .await
            .unwrap();
        store
            .zset_add("BTCUSDT:buy_orders", 30000.0, "o1")
            .await
            .unwrap();
        monitor.record("add_limit", 3.0, &symbol).await.unwrap();

        let metrics = monitor.metrics().await.unwrap();
        assert_eq!(metrics.len(), 1);
        let m = &metrics[0];
        assert_eq!(m.symbol, "BTCUSDT");
        assert_eq!(m.queue_length, 1);
        assert_eq!(m.resting_buy_orders, 1);
        assert_eq!(m.resting_sell_orders, 0);

        let stats = m.operations.get("add_limit").unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.min_ms, 3.0);
        assert_eq!(stats.max_ms, 3.0);
    }

    #[test]
    fn test_nearest_rank() {
        let sorted: Vec<f64> = (1..=4).map(|v| v as f64).collect();
        assert_eq!(nearest_rank(&sorted, 50.0), Some(2.0));
        assert_eq!(nearest_rank(&sorted, 95.0), Some(4.0));
        assert_eq!(nearest_rank(&sorted, 1.0), Some(1.0));
        assert_eq!(nearest_rank(&[], 50.0), None);
    }
}
