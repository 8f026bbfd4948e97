//! Per-symbol order processor
//!
//! A single-consumer loop bound to one symbol: it is the only writer of that
//! symbol's order hashes, price indices, and trade journal. Failures never
//! escape the loop; they surface as failed-queue entries or order status.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use store::{keys, Store};
use tracing::{debug, error, info, warn};
use types::clock;
use types::ids::Symbol;

use crate::book::{BookError, OrderBook};
use crate::intent::{self, OrderIntent};
use crate::monitor::PerformanceMonitor;

/// Bounded wait on the pending-list pop.
const POP_TIMEOUT: Duration = Duration::from_secs(1);

/// Yield between iterations so a spuriously returning pop cannot spin hot.
const IDLE_YIELD: Duration = Duration::from_millis(1);

/// Back-off after a store failure on the pop path.
const POP_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Single-consumer processing loop for one symbol.
pub struct OrderProcessor {
    symbol: Symbol,
    store: Arc<dyn Store>,
    book: OrderBook,
    monitor: PerformanceMonitor,
    running: Arc<AtomicBool>,
}

impl OrderProcessor {
    pub fn new(symbol: Symbol, store: Arc<dyn Store>, running: Arc<AtomicBool>) -> Self {
        let book = OrderBook::new(symbol.clone(), Arc::clone(&store));
        let monitor = PerformanceMonitor::new(Arc::clone(&store));
        Self {
            symbol,
            store,
            book,
            monitor,
            running,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Drive the loop until the shared running flag is cleared.
    pub async fn run(self) {
        let pending_key = keys::pending(self.symbol.as_str());
        info!(symbol = %self.symbol, "order processor started");

        while self.running.load(Ordering::Relaxed) {
            match self.store.list_bpop_right(&pending_key, POP_TIMEOUT).await {
                Ok(Some(payload)) => self.process(&payload).await,
                Ok(None) => {}
                Err(err) => {
                    warn!(symbol = %self.symbol, error = %err, "pending-list pop failed");
                    tokio::time::sleep(POP_RETRY_DELAY).await;
                }
            }
            tokio::time::sleep(IDLE_YIELD).await;
        }

        info!(symbol = %self.symbol, "order processor stopped");
    }

    /// Handle one raw payload. Never propagates an error.
    pub async fn process(&self, raw: &str) {
        let now = clock::unix_now();

        let parsed = intent::parse_payload(raw, now);
        let intent = match parsed {
            Ok(intent) => intent,
            Err(err) => {
                debug!(symbol = %self.symbol, error = %err, "rejecting payload");
                self.push_failed(raw, &err.to_string(), now).await;
                return;
            }
        };

        // Misroute repair: hand the untouched payload to the owning symbol.
        if intent.symbol() != &self.symbol {
            let target = keys::pending(intent.symbol().as_str());
            info!(
                symbol = %self.symbol,
                target = %intent.symbol(),
                order = %intent.id(),
                "re-enqueueing misrouted order"
            );
            if let Err(err) = self.store.list_push_left(&target, raw).await {
                error!(symbol = %self.symbol, error = %err, "misroute re-enqueue failed");
                self.push_failed(raw, &err.to_string(), now).await;
            }
            return;
        }

        let op = intent.op_name();
        let started = Instant::now();
        let outcome = self.dispatch(&intent, now).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        if let Err(err) = self.monitor.record(op, elapsed_ms, &self.symbol).await {
            warn!(symbol = %self.symbol, error = %err, "failed to record latency sample");
        }

        if let Err(err) = outcome {
            warn!(symbol = %self.symbol, op, error = %err, "order operation failed");
            self.push_failed(raw, &err.to_string(), now).await;
        }
    }

    async fn dispatch(&self, intent: &OrderIntent, now: i64) -> Result<(), BookError> {
        match intent {
            OrderIntent::Limit { .. } => {
                let order = intent.to_order().ok_or_else(|| {
                    BookError::Corrupt("limit intent without order form".to_string())
                })?;
                let trades = self.book.add_limit(&order, now).await?;
                debug!(
                    symbol = %self.symbol,
                    order = %order.id,
                    trades = trades.len(),
                    "limit order processed"
                );
            }
            OrderIntent::Market { .. } => {
                let order = intent.to_order().ok_or_else(|| {
                    BookError::Corrupt("market intent without order form".to_string())
                })?;
                let matched = self.book.add_market(&order, now).await?;
                debug!(
                    symbol = %self.symbol,
                    order = %order.id,
                    matched,
                    "market order processed"
                );
            }
            OrderIntent::Cancel { id, .. } => {
                let cancelled = self.book.cancel(id).await?;
                debug!(symbol = %self.symbol, order = %id, cancelled, "cancel processed");
            }
        }
        Ok(())
    }

    /// Append a diagnostic record to the symbol's failed queue.
    ///
    /// Failure to record is logged and swallowed; there is nowhere further
    /// to report it without killing the loop.
    async fn push_failed(&self, raw: &str, error: &str, now: i64) {
        let order_value =
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        let entry = json!({
            "order": order_value,
            "error": error,
            "timestamp": now,
        });
        let key = keys::failed_orders(self.symbol.as_str());
        if let Err(err) = self.store.list_push_left(&key, &entry.to_string()).await {
            error!(symbol = %self.symbol, error = %err, "failed-queue push failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemoryStore;

    fn make_processor(symbol: &str) -> (OrderProcessor, Arc<MemoryStore>, Arc<AtomicBool>) {
        let store = Arc::new(MemoryStore::new());
        let running = Arc::new(AtomicBool::new(true));
        let processor = OrderProcessor::new(
            Symbol::new(symbol),
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::clone(&running),
        );
        (processor, store, running)
    }

    #[tokio::test]
    async fn test_valid_limit_is_dispatched() {
        let (processor, store, _) = make_processor("BTCUSDT");
        processor
            .process(r#"{"id":"o1","trading_pair":"BTCUSDT","side":"buy","price":"30000","amount":"1.0"}"#)
            .await;

        let fields = store.hash_get_all("order:BTCUSDT:o1").await.unwrap();
        assert_eq!(fields.get("status").map(String::as_str), Some("open"));
        assert_eq!(store.zset_card("BTCUSDT:buy_orders").await.unwrap(), 1);
        assert_eq!(store.list_len("failed_orders:BTCUSDT").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_goes_to_failed_queue() {
        let (processor, store, _) = make_processor("BTCUSDT");
        processor.process("{{{ not json").await;

        let entries = store
            .list_range("failed_orders:BTCUSDT", 0, -1)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        let entry: Value = serde_json::from_str(&entries[0]).unwrap();
        assert!(entry["error"].as_str().unwrap().contains("malformed"));
        assert!(entry["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn test_invalid_amount_goes_to_failed_queue() {
        let (processor, store, _) = make_processor("BTCUSDT");
        processor
            .process(r#"{"id":"o1","trading_pair":"BTCUSDT","side":"buy","price":"30000","amount":"-1"}"#)
            .await;

        assert_eq!(store.list_len("failed_orders:BTCUSDT").await.unwrap(), 1);
        // The order never reached the book.
        assert!(store.hash_get_all("order:BTCUSDT:o1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_misroute_re_enqueued_untouched() {
        let (processor, store, _) = make_processor("BTCUSDT");
        let raw = r#"{"id":"o1","trading_pair":"ETHUSDT","side":"buy","price":"2000","amount":"1.0"}"#;
        processor.process(raw).await;

        let moved = store.list_range("pending:ETHUSDT", 0, -1).await.unwrap();
        assert_eq!(moved, vec![raw.to_string()]);
        // No failed entry and no local state change.
        assert_eq!(store.list_len("failed_orders:BTCUSDT").await.unwrap(), 0);
        assert_eq!(store.zset_card("BTCUSDT:buy_orders").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_of_unknown_id_is_quiet() {
        let (processor, store, _) = make_processor("BTCUSDT");
        processor
            .process(r#"{"id":"missing","trading_pair":"BTCUSDT","type":"cancel"}"#)
            .await;

        assert_eq!(store.list_len("failed_orders:BTCUSDT").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_market_failure_is_status_not_failed_queue() {
        let (processor, store, _) = make_processor("BTCUSDT");
        processor
            .process(r#"{"id":"m1","trading_pair":"BTCUSDT","type":"market","side":"buy","amount":"1.0"}"#)
            .await;

        let fields = store.hash_get_all("order:BTCUSDT:m1").await.unwrap();
        assert_eq!(fields.get("status").map(String::as_str), Some("failed"));
        assert_eq!(
            fields.get("error").map(String::as_str),
            Some("No matching orders available")
        );
        assert_eq!(store.list_len("failed_orders:BTCUSDT").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_latency_recorded_per_operation() {
        let (processor, store, _) = make_processor("BTCUSDT");
        processor
            .process(r#"{"id":"o1","trading_pair":"BTCUSDT","side":"buy","price":"30000","amount":"1.0"}"#)
            .await;

        assert_eq!(
            store.counter_get("count:BTCUSDT:add_limit").await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_run_drains_queue_in_fifo_order() {
        let (processor, store, running) = make_processor("BTCUSDT");

        // Ingress pushes left; oldest payload sits at the right.
        store
            .list_push_left(
                "pending:BTCUSDT",
                r#"{"id":"b1","trading_pair":"BTCUSDT","side":"buy","price":"30000","amount":"1.0"}"#,
            )
            .await
            .unwrap();
        store
            .list_push_left(
                "pending:BTCUSDT",
                r#"{"id":"s1","trading_pair":"BTCUSDT","side":"sell","price":"30000","amount":"1.0"}"#,
            )
            .await
            .unwrap();

        let handle = tokio::spawn(processor.run());
        tokio::time::sleep(Duration::from_millis(200)).await;
        running.store(false, Ordering::Relaxed);
        handle.await.unwrap();

        // b1 processed before s1, so they matched.
        let bid = store.hash_get_all("order:BTCUSDT:b1").await.unwrap();
        let ask = store.hash_get_all("order:BTCUSDT:s1").await.unwrap();
        assert_eq!(bid.get("status").map(String::as_str), Some("filled"));
        assert_eq!(ask.get("status").map(String::as_str), Some("filled"));
        assert_eq!(store.list_len("trades:BTCUSDT").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stop_flag_exits_loop() {
        let (processor, _, running) = make_processor("BTCUSDT");
        running.store(false, Ordering::Relaxed);
        // Returns immediately without touching the queue.
        processor.run().await;
    }
}
