//! Store capability contract
//!
//! Every mutation that couples an order hash with its price index goes
//! through [`Store::txn`] as an all-or-nothing batch; readers never observe
//! a half-applied matching step.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Store operation failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store operation timed out: {0}")]
    Timeout(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("connection pool exhausted")]
    PoolExhausted,
}

/// A single write in an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Set hash fields (creating the hash if absent)
    HashSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    /// Add a member to a sorted set with the given score
    ZAdd {
        key: String,
        score: f64,
        member: String,
    },
    /// Remove a member from a sorted set
    ZRem { key: String, member: String },
    /// Push a value onto the head of a list
    ListPushLeft { key: String, value: String },
    /// Trim a list to the inclusive index range (head = 0)
    ListTrim {
        key: String,
        start: isize,
        stop: isize,
    },
    /// Add a member to a set
    SetAdd { key: String, member: String },
    /// Delete a key
    Del { key: String },
}

/// The capability set the matching pipeline requires of the shared store.
///
/// Equal-score sorted-set members are returned in insertion order, which
/// yields time priority as long as all inserts for one symbol come from a
/// single writer.
#[async_trait]
pub trait Store: Send + Sync {
    /// Apply a batch of writes atomically (all-or-nothing).
    async fn txn(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;
    async fn hash_set(&self, key: &str, fields: Vec<(String, String)>) -> Result<(), StoreError>;
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    async fn zset_add(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError>;
    async fn zset_rem(&self, key: &str, member: &str) -> Result<(), StoreError>;
    /// Members with `lo <= score <= hi`, ascending, ties in insertion order.
    async fn zset_range_by_score(
        &self,
        key: &str,
        lo: f64,
        hi: f64,
    ) -> Result<Vec<String>, StoreError>;
    /// Members by rank, ascending. Negative indices count from the tail.
    async fn zset_range(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<String>, StoreError>;
    /// Members by rank, descending.
    async fn zset_rev_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError>;
    async fn zset_card(&self, key: &str) -> Result<u64, StoreError>;

    async fn list_push_left(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn list_trim(&self, key: &str, start: isize, stop: isize) -> Result<(), StoreError>;
    async fn list_range(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<String>, StoreError>;
    async fn list_len(&self, key: &str) -> Result<u64, StoreError>;
    /// Pop from the tail, waiting up to `timeout` for a value.
    async fn list_bpop_right(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError>;

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Increment an integer counter key, returning the new value.
    async fn counter_incr(&self, key: &str) -> Result<u64, StoreError>;
    async fn counter_get(&self, key: &str) -> Result<u64, StoreError>;

    /// Glob-style key scan. Telemetry only; never called on hot paths.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Reachability probe for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}
