//! Property-based invariants over random well-formed input sequences.
//!
//! After any sequence of limit inserts and cancels drains through the book:
//! - the price indices contain exactly the open/partially-filled orders
//! - the book never rests crossed
//! - traded amounts and remaining conserve the original amount
//! - the trade journal stays within its cap, newest first

use std::sync::Arc;

use matching_engine::{OrderBook, TRADE_JOURNAL_CAP};
use proptest::prelude::*;
use rust_decimal::Decimal;
use store::{MemoryStore, Store};
use types::ids::{OrderId, Symbol};
use types::order::{Order, Side};

const TS: i64 = 1_708_123_456;

#[derive(Debug, Clone)]
enum Action {
    Limit {
        side: Side,
        price_level: u8,
        amount_ticks: u8,
    },
    Cancel {
        target: usize,
    },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => (
            prop_oneof![Just(Side::Buy), Just(Side::Sell)],
            1u8..=5,
            1u8..=4,
        )
            .prop_map(|(side, price_level, amount_ticks)| Action::Limit {
                side,
                price_level,
                amount_ticks,
            }),
        1 => (0usize..32).prop_map(|target| Action::Cancel { target }),
    ]
}

fn limit_order(id: &str, side: Side, price_level: u8, amount_ticks: u8, ts: i64) -> Order {
    // A narrow shared price grid so random buys and sells cross often.
    let price = format!("{}", 29_800 + 100 * price_level as u32);
    let amount = format!("{}", Decimal::new(amount_ticks as i64 * 5, 1)); // 0.5 steps
    Order::new_limit(
        OrderId::from_string(id),
        Symbol::new("BTCUSDT"),
        side,
        price.parse().unwrap(),
        amount.parse().unwrap(),
        ts,
    )
}

async fn run_actions(
    book: &OrderBook,
    actions: Vec<Action>,
) -> Vec<OrderId> {
    let mut issued = Vec::new();
    let mut ts = TS;
    for action in actions {
        ts += 1;
        match action {
            Action::Limit {
                side,
                price_level,
                amount_ticks,
            } => {
                let id = format!("o{}", issued.len());
                let order = limit_order(&id, side, price_level, amount_ticks, ts);
                book.add_limit(&order, ts).await.unwrap();
                issued.push(order.id);
            }
            Action::Cancel { target } => {
                if !issued.is_empty() {
                    let id = &issued[target % issued.len()];
                    book.cancel(id).await.unwrap();
                }
            }
        }
    }
    issued
}

async fn check_index_matches_open_orders(
    book: &OrderBook,
    store: &MemoryStore,
    issued: &[OrderId],
) {
    let buys = store.zset_range("BTCUSDT:buy_orders", 0, -1).await.unwrap();
    let sells = store
        .zset_range("BTCUSDT:sell_orders", 0, -1)
        .await
        .unwrap();

    let mut open_count = 0;
    for id in issued {
        let order = book.load_order(id).await.unwrap().unwrap();
        let in_buys = buys.iter().any(|m| m == id.as_str());
        let in_sells = sells.iter().any(|m| m == id.as_str());
        if order.is_open() {
            open_count += 1;
            match order.side {
                Side::Buy => assert!(in_buys && !in_sells, "open buy {} not indexed", id),
                Side::Sell => assert!(in_sells && !in_buys, "open sell {} not indexed", id),
            }
        } else {
            assert!(
                !in_buys && !in_sells,
                "terminal order {} still indexed",
                id
            );
        }
    }
    assert_eq!(buys.len() + sells.len(), open_count);
}

async fn check_not_crossed(book: &OrderBook) {
    let depth = book.depth(1).await.unwrap();
    if let (Some(best_bid), Some(best_ask)) = (depth.bids.first(), depth.asks.first()) {
        assert!(
            best_bid.price < best_ask.price,
            "book rests crossed: bid {} >= ask {}",
            best_bid.price,
            best_ask.price
        );
    }
}

async fn check_conservation(book: &OrderBook, issued: &[OrderId]) {
    let trades = book.recent_trades(TRADE_JOURNAL_CAP).await.unwrap();
    for id in issued {
        let order = book.load_order(id).await.unwrap().unwrap();
        let traded: Decimal = trades
            .iter()
            .filter(|t| &t.bid_order_id == id || &t.ask_order_id == id)
            .map(|t| t.amount.as_decimal())
            .sum();
        assert!(
            traded <= order.amount.as_decimal(),
            "order {} overtraded",
            id
        );
        // Cancelled orders keep the remaining they had at cancel time, which
        // still satisfies remaining + traded = amount.
        assert_eq!(
            order.amount.as_decimal() - traded,
            order.remaining.as_decimal(),
            "conservation violated for {}",
            id
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn book_invariants_hold_after_any_sequence(
        actions in proptest::collection::vec(action_strategy(), 1..40)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async move {
            let store = Arc::new(MemoryStore::new());
            let book = OrderBook::new(
                Symbol::new("BTCUSDT"),
                Arc::clone(&store) as Arc<dyn Store>,
            );

            let issued = run_actions(&book, actions).await;

            check_index_matches_open_orders(&book, &store, &issued).await;
            check_not_crossed(&book).await;
            check_conservation(&book, &issued).await;
        });
    }
}

#[tokio::test]
async fn journal_is_capped_at_newest_thousand() {
    let store = Arc::new(MemoryStore::new());
    let book = OrderBook::new(
        Symbol::new("BTCUSDT"),
        Arc::clone(&store) as Arc<dyn Store>,
    );

    let rounds = TRADE_JOURNAL_CAP + 50;
    let mut ts = TS;
    for i in 0..rounds {
        ts += 1;
        let buy = Order::new_limit(
            OrderId::from_string(format!("b{}", i)),
            Symbol::new("BTCUSDT"),
            Side::Buy,
            "30000".parse().unwrap(),
            "1.0".parse().unwrap(),
            ts,
        );
        book.add_limit(&buy, ts).await.unwrap();
        ts += 1;
        let sell = Order::new_limit(
            OrderId::from_string(format!("s{}", i)),
            Symbol::new("BTCUSDT"),
            Side::Sell,
            "30000".parse().unwrap(),
            "1.0".parse().unwrap(),
            ts,
        );
        book.add_limit(&sell, ts).await.unwrap();
    }

    assert_eq!(
        store.list_len("trades:BTCUSDT").await.unwrap(),
        TRADE_JOURNAL_CAP as u64
    );
    let trades = book.recent_trades(TRADE_JOURNAL_CAP).await.unwrap();
    assert_eq!(trades.len(), TRADE_JOURNAL_CAP);
    // Newest first: the head carries the last execution timestamp.
    assert_eq!(trades[0].timestamp, ts);
    assert!(trades[0].timestamp > trades[TRADE_JOURNAL_CAP - 1].timestamp);
}

#[tokio::test]
async fn equal_price_orders_match_in_arrival_order() {
    let store = Arc::new(MemoryStore::new());
    let book = OrderBook::new(
        Symbol::new("BTCUSDT"),
        Arc::clone(&store) as Arc<dyn Store>,
    );

    let first = Order::new_limit(
        OrderId::from_string("first"),
        Symbol::new("BTCUSDT"),
        Side::Buy,
        "30000".parse().unwrap(),
        "1.0".parse().unwrap(),
        TS,
    );
    let second = Order::new_limit(
        OrderId::from_string("second"),
        Symbol::new("BTCUSDT"),
        Side::Buy,
        "30000".parse().unwrap(),
        "1.0".parse().unwrap(),
        TS + 1,
    );
    book.add_limit(&first, TS).await.unwrap();
    book.add_limit(&second, TS + 1).await.unwrap();

    // A sell smaller than the first bid touches only the first bid.
    let sell = Order::new_limit(
        OrderId::from_string("s1"),
        Symbol::new("BTCUSDT"),
        Side::Sell,
        "30000".parse().unwrap(),
        "0.6".parse().unwrap(),
        TS + 2,
    );
    let trades = book.add_limit(&sell, TS + 2).await.unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].bid_order_id, OrderId::from_string("first"));
    assert_eq!(trades[0].amount, "0.6".parse().unwrap());

    let untouched = book
        .load_order(&OrderId::from_string("second"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.remaining, "1.0".parse().unwrap());
    assert_eq!(untouched.status, types::order::OrderStatus::Open);
}
