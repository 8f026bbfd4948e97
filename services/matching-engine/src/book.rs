//! Per-symbol order book over the shared store
//!
//! Resting state lives entirely in the store: one hash per order plus two
//! price-indexed sorted sets per symbol. Matching walks best bid against
//! best ask under price-time priority; every matching step (trade append,
//! both order updates, index removals) is submitted as one atomic batch, so
//! readers never observe a half-applied fill.
//!
//! Prices inside sorted-set scores are a secondary index only; every price
//! decision re-reads the canonical decimal from the order hash.

use std::sync::Arc;

use store::{keys, Store, StoreError, WriteOp};
use thiserror::Error;
use tracing::{debug, warn};
use types::ids::{OrderId, Symbol};
use types::numeric::{Amount, Price};
use types::order::{Order, OrderStatus, Side};
use types::trade::Trade;

/// Trade journal cap: only this many newest trades are retained per symbol.
pub const TRADE_JOURNAL_CAP: usize = 1000;

/// Error text persisted on market orders that find no liquidity.
pub const NO_MATCH_ERROR: &str = "No matching orders available";

/// Order book failure
#[derive(Error, Debug)]
pub enum BookError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt book state: {0}")]
    Corrupt(String),
}

/// Aggregated resting amount at one price
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DepthLevel {
    pub price: Price,
    pub amount: Amount,
}

/// Book depth, best price first on each side
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Depth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

/// Order book bound to one symbol.
///
/// The single-writer rule holds by construction: only the symbol's processor
/// owns a book with write intent, so matching needs no locking and stays
/// deterministic.
pub struct OrderBook {
    symbol: Symbol,
    store: Arc<dyn Store>,
}

impl OrderBook {
    pub fn new(symbol: Symbol, store: Arc<dyn Store>) -> Self {
        Self { symbol, store }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    fn order_key(&self, id: &OrderId) -> String {
        keys::order(self.symbol.as_str(), id.as_str())
    }

    fn index_key(&self, side: Side) -> String {
        match side {
            Side::Buy => keys::buy_orders(self.symbol.as_str()),
            Side::Sell => keys::sell_orders(self.symbol.as_str()),
        }
    }

    fn trades_key(&self) -> String {
        keys::trades(self.symbol.as_str())
    }

    /// Load an order hash; None when the key does not exist.
    pub async fn load_order(&self, id: &OrderId) -> Result<Option<Order>, BookError> {
        let fields = self.store.hash_get_all(&self.order_key(id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let order =
            Order::from_fields(&fields).map_err(|err| BookError::Corrupt(err.to_string()))?;
        if !order.check_invariant() {
            return Err(BookError::Corrupt(format!(
                "order {} remaining exceeds amount",
                order.id
            )));
        }
        Ok(Some(order))
    }

    /// Insert a validated limit order and run the matching loop.
    ///
    /// Returns the trades executed while the book was crossed. The order
    /// rests (open or partially filled) if the far side no longer crosses.
    pub async fn add_limit(&self, order: &Order, timestamp: i64) -> Result<Vec<Trade>, BookError> {
        let price = order
            .price
            .ok_or_else(|| BookError::Corrupt(format!("limit order {} without price", order.id)))?;

        self.store
            .txn(vec![
                WriteOp::HashSet {
                    key: self.order_key(&order.id),
                    fields: order.to_fields(),
                },
                WriteOp::ZAdd {
                    key: self.index_key(order.side),
                    score: price.to_score(),
                    member: order.id.to_string(),
                },
            ])
            .await?;

        let mut trades = Vec::new();
        loop {
            let bid = match self.best_resting(Side::Buy).await? {
                Some(order) => order,
                None => break,
            };
            let ask = match self.best_resting(Side::Sell).await? {
                Some(order) => order,
                None => break,
            };
            let bid_price = resting_price(&bid)?;
            let ask_price = resting_price(&ask)?;
            if bid_price < ask_price {
                break;
            }

            // Execution price is the ask side's resting price. For an
            // aggressive buy this is the maker's price; an aggressive ask
            // trades at its own limit, giving the buyer the improvement.
            let trade_price = ask_price;
            let trade_amount = bid.remaining.min(ask.remaining);
            let trade = Trade::new(
                self.symbol.clone(),
                trade_price,
                trade_amount,
                bid.id.clone(),
                ask.id.clone(),
                timestamp,
            );

            let mut ops = self.journal_ops(&trade)?;
            ops.extend(self.fill_ops(&bid, trade_amount));
            ops.extend(self.fill_ops(&ask, trade_amount));
            self.store.txn(ops).await?;

            debug!(
                symbol = %self.symbol,
                price = %trade.price,
                amount = %trade.amount,
                bid = %trade.bid_order_id,
                ask = %trade.ask_order_id,
                "trade executed"
            );
            trades.push(trade);
        }
        Ok(trades)
    }

    /// Execute a validated market order against the opposite side.
    ///
    /// Sweeps price levels best-first until the amount is consumed or the
    /// book runs dry. Returns false when no liquidity was available at all;
    /// the order is then persisted with status failed.
    pub async fn add_market(&self, order: &Order, timestamp: i64) -> Result<bool, BookError> {
        let opposite = order.side.opposite();

        if self.store.zset_card(&self.index_key(opposite)).await? == 0 {
            self.persist_failed(order, NO_MATCH_ERROR).await?;
            return Ok(false);
        }

        self.store
            .hash_set(&self.order_key(&order.id), order.to_fields())
            .await?;

        let mut remaining = order.remaining;
        let mut traded = false;
        while remaining.is_positive() {
            let counter = match self.best_resting(opposite).await? {
                Some(order) => order,
                None => break,
            };
            let counter_price = resting_price(&counter)?;
            let fill = remaining.min(counter.remaining);
            let new_remaining = remaining.saturating_sub(fill);

            let (bid_id, ask_id) = match order.side {
                Side::Buy => (order.id.clone(), counter.id.clone()),
                Side::Sell => (counter.id.clone(), order.id.clone()),
            };
            let trade = Trade::new(
                self.symbol.clone(),
                counter_price,
                fill,
                bid_id,
                ask_id,
                timestamp,
            );

            let own_status = if new_remaining.is_zero() {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };
            let mut ops = self.journal_ops(&trade)?;
            ops.extend(self.fill_ops(&counter, fill));
            ops.push(WriteOp::HashSet {
                key: self.order_key(&order.id),
                fields: vec![
                    ("remaining".to_string(), new_remaining.to_string()),
                    ("status".to_string(), own_status.as_str().to_string()),
                ],
            });
            self.store.txn(ops).await?;

            debug!(
                symbol = %self.symbol,
                price = %trade.price,
                amount = %trade.amount,
                remaining = %new_remaining,
                "market fill"
            );
            remaining = new_remaining;
            traded = true;
        }

        if !traded {
            // Liquidity disappeared between the emptiness check and the sweep.
            self.persist_failed(order, NO_MATCH_ERROR).await?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Cancel a resting order.
    ///
    /// Returns false without side effects for unknown ids and orders already
    /// in a terminal state.
    pub async fn cancel(&self, id: &OrderId) -> Result<bool, BookError> {
        let order = match self.load_order(id).await? {
            Some(order) => order,
            None => return Ok(false),
        };
        if !order.is_open() {
            return Ok(false);
        }

        self.store
            .txn(vec![
                WriteOp::ZRem {
                    key: self.index_key(order.side),
                    member: id.to_string(),
                },
                WriteOp::HashSet {
                    key: self.order_key(id),
                    fields: vec![(
                        "status".to_string(),
                        OrderStatus::Cancelled.as_str().to_string(),
                    )],
                },
            ])
            .await?;
        debug!(symbol = %self.symbol, order = %id, "order cancelled");
        Ok(true)
    }

    /// Aggregated remaining amounts by price, best-first, up to `levels`
    /// price levels per side.
    pub async fn depth(&self, levels: usize) -> Result<Depth, BookError> {
        let bids = self.side_depth(Side::Buy, levels).await?;
        let asks = self.side_depth(Side::Sell, levels).await?;
        Ok(Depth { bids, asks })
    }

    /// The `n` newest trades, newest first.
    pub async fn recent_trades(&self, n: usize) -> Result<Vec<Trade>, BookError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let raw = self
            .store
            .list_range(&self.trades_key(), 0, n as isize - 1)
            .await?;
        let mut trades = Vec::with_capacity(raw.len());
        for entry in raw {
            match serde_json::from_str::<Trade>(&entry) {
                Ok(trade) => trades.push(trade),
                Err(err) => {
                    warn!(symbol = %self.symbol, error = %err, "skipping unreadable trade entry");
                }
            }
        }
        Ok(trades)
    }

    /// (buy, sell) price-index cardinalities, for telemetry gauges.
    pub async fn resting_counts(&self) -> Result<(u64, u64), BookError> {
        let buys = self.store.zset_card(&self.index_key(Side::Buy)).await?;
        let sells = self.store.zset_card(&self.index_key(Side::Sell)).await?;
        Ok((buys, sells))
    }

    /// Oldest open order at the side's best price.
    ///
    /// Index entries whose backing hash is missing or terminal can only
    /// appear under corrupted state; they are dropped from the index in
    /// passing and never selected.
    async fn best_resting(&self, side: Side) -> Result<Option<Order>, BookError> {
        let index = self.index_key(side);
        loop {
            let head = match side {
                Side::Buy => self.store.zset_rev_range(&index, 0, 0).await?,
                Side::Sell => self.store.zset_range(&index, 0, 0).await?,
            };
            let head_member = match head.into_iter().next() {
                Some(member) => member,
                None => return Ok(None),
            };

            let head_order = self.load_open_entry(&index, &head_member).await?;
            let head_order = match head_order {
                Some(order) => order,
                None => continue, // dangling head repaired; re-read the index
            };
            let level_price = resting_price(&head_order)?;

            // Oldest entry at this price level wins (time priority).
            let level = self
                .store
                .zset_range_by_score(&index, level_price.to_score(), level_price.to_score())
                .await?;
            for member in level {
                if let Some(order) = self.load_open_entry(&index, &member).await? {
                    if order.price == Some(level_price) {
                        return Ok(Some(order));
                    }
                }
            }
            // Every entry at the level was dangling; start over.
        }
    }

    /// Load the order behind an index member, repairing dangling entries.
    async fn load_open_entry(
        &self,
        index: &str,
        member: &str,
    ) -> Result<Option<Order>, BookError> {
        let id = OrderId::from_string(member);
        match self.load_order(&id).await? {
            Some(order) if order.is_open() => Ok(Some(order)),
            Some(order) => {
                warn!(
                    symbol = %self.symbol,
                    order = %id,
                    status = %order.status,
                    "removing non-open order from price index"
                );
                self.store.zset_rem(index, member).await?;
                Ok(None)
            }
            None => {
                warn!(symbol = %self.symbol, order = %id, "removing orphaned price index entry");
                self.store.zset_rem(index, member).await?;
                Ok(None)
            }
        }
    }

    /// Journal append + trim, shared by limit and market fills.
    fn journal_ops(&self, trade: &Trade) -> Result<Vec<WriteOp>, BookError> {
        Ok(vec![
            WriteOp::ListPushLeft {
                key: self.trades_key(),
                value: serde_json::to_string(trade)?,
            },
            WriteOp::ListTrim {
                key: self.trades_key(),
                start: 0,
                stop: TRADE_JOURNAL_CAP as isize - 1,
            },
        ])
    }

    /// Order-side updates for one fill: decrement remaining, flip status,
    /// drop the index entry on fill-to-zero.
    ///
    /// # Panics
    /// Panics if the fill exceeds the order's remaining quantity
    fn fill_ops(&self, order: &Order, fill: Amount) -> Vec<WriteOp> {
        assert!(
            fill <= order.remaining,
            "fill would exceed remaining quantity of order {}",
            order.id
        );
        let remaining = order.remaining.saturating_sub(fill);
        if remaining.is_zero() {
            vec![
                WriteOp::ZRem {
                    key: self.index_key(order.side),
                    member: order.id.to_string(),
                },
                WriteOp::HashSet {
                    key: self.order_key(&order.id),
                    fields: vec![
                        ("remaining".to_string(), Amount::zero().to_string()),
                        (
                            "status".to_string(),
                            OrderStatus::Filled.as_str().to_string(),
                        ),
                    ],
                },
            ]
        } else {
            vec![WriteOp::HashSet {
                key: self.order_key(&order.id),
                fields: vec![
                    ("remaining".to_string(), remaining.to_string()),
                    (
                        "status".to_string(),
                        OrderStatus::PartiallyFilled.as_str().to_string(),
                    ),
                ],
            }]
        }
    }

    async fn persist_failed(&self, order: &Order, error: &str) -> Result<(), BookError> {
        let mut failed = order.clone();
        failed.status = OrderStatus::Failed;
        failed.error = Some(error.to_string());
        self.store
            .hash_set(&self.order_key(&order.id), failed.to_fields())
            .await?;
        Ok(())
    }

    async fn side_depth(&self, side: Side, levels: usize) -> Result<Vec<DepthLevel>, BookError> {
        let index = self.index_key(side);
        let members = match side {
            Side::Buy => self.store.zset_rev_range(&index, 0, -1).await?,
            Side::Sell => self.store.zset_range(&index, 0, -1).await?,
        };

        let mut depth: Vec<DepthLevel> = Vec::new();
        for member in members {
            let id = OrderId::from_string(&member);
            let order = match self.load_order(&id).await? {
                Some(order) if order.is_open() => order,
                _ => continue,
            };
            let price = resting_price(&order)?;
            match depth.last_mut() {
                Some(level) if level.price == price => {
                    level.amount = level.amount + order.remaining;
                }
                _ => {
                    if depth.len() == levels {
                        break;
                    }
                    depth.push(DepthLevel {
                        price,
                        amount: order.remaining,
                    });
                }
            }
        }
        Ok(depth)
    }
}

fn resting_price(order: &Order) -> Result<Price, BookError> {
    order
        .price
        .ok_or_else(|| BookError::Corrupt(format!("resting order {} without price", order.id)))
}
