//! Redis store backend
//!
//! All access goes through a fixed-size connection pool: callers acquire a
//! pooled connection for the duration of one logical operation and the drop
//! guard returns it on every exit path, including early returns and panics.
//! Write batches are submitted as one atomic MULTI/EXEC pipeline.

use crate::adapter::{Store, StoreError, WriteOp};
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(err.to_string())
        } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

/// Fixed-size pool of multiplexed Redis connections
///
/// Sized to the number of concurrent symbol processors plus API handlers;
/// a saturated pool makes callers wait rather than opening new connections.
pub struct ConnectionPool {
    free: Arc<Mutex<Vec<MultiplexedConnection>>>,
    semaphore: Arc<Semaphore>,
}

impl ConnectionPool {
    /// Open `size` connections against the given Redis URL.
    pub async fn connect(url: &str, size: usize) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(StoreError::from)?;
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = client
                .get_multiplexed_async_connection()
                .await
                .map_err(StoreError::from)?;
            connections.push(conn);
        }
        debug!(url = %url, size, "connected Redis pool");
        Ok(Self {
            free: Arc::new(Mutex::new(connections)),
            semaphore: Arc::new(Semaphore::new(size)),
        })
    }

    /// Acquire a connection, waiting while the pool is saturated.
    pub async fn acquire(&self) -> Result<PooledConnection, StoreError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::PoolExhausted)?;
        let conn = self.free.lock().pop().ok_or(StoreError::PoolExhausted)?;
        Ok(PooledConnection {
            conn: Some(conn),
            free: Arc::clone(&self.free),
            _permit: permit,
        })
    }
}

/// Scoped pool acquisition; returns the connection on drop.
pub struct PooledConnection {
    conn: Option<MultiplexedConnection>,
    free: Arc<Mutex<Vec<MultiplexedConnection>>>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = MultiplexedConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection taken before drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection taken before drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.free.lock().push(conn);
        }
    }
}

/// Redis-backed implementation of the store capability surface
pub struct RedisStore {
    pool: ConnectionPool,
}

impl RedisStore {
    /// Connect with a pool of the given size.
    pub async fn connect(url: &str, pool_size: usize) -> Result<Self, StoreError> {
        let pool = ConnectionPool::connect(url, pool_size).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn txn(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in ops {
            match op {
                WriteOp::HashSet { key, fields } => {
                    let cmd = pipe.cmd("HSET").arg(key);
                    for (field, value) in fields {
                        cmd.arg(field).arg(value);
                    }
                    cmd.ignore();
                }
                WriteOp::ZAdd { key, score, member } => {
                    pipe.cmd("ZADD").arg(key).arg(score).arg(member).ignore();
                }
                WriteOp::ZRem { key, member } => {
                    pipe.cmd("ZREM").arg(key).arg(member).ignore();
                }
                WriteOp::ListPushLeft { key, value } => {
                    pipe.cmd("LPUSH").arg(key).arg(value).ignore();
                }
                WriteOp::ListTrim { key, start, stop } => {
                    pipe.cmd("LTRIM").arg(key).arg(start).arg(stop).ignore();
                }
                WriteOp::SetAdd { key, member } => {
                    pipe.cmd("SADD").arg(key).arg(member).ignore();
                }
                WriteOp::Del { key } => {
                    pipe.cmd("DEL").arg(key).ignore();
                }
            }
        }
        let mut conn = self.pool.acquire().await?;
        pipe.query_async::<_, ()>(&mut *conn).await?;
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let value: Option<String> = redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut *conn)
            .await?;
        Ok(value)
    }

    async fn hash_set(&self, key: &str, fields: Vec<(String, String)>) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        let mut conn = self.pool.acquire().await?;
        cmd.query_async::<_, ()>(&mut *conn).await?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let map: HashMap<String, String> =
            redis::cmd("HGETALL").arg(key).query_async(&mut *conn).await?;
        Ok(map)
    }

    async fn zset_add(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn zset_rem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        redis::cmd("ZREM")
            .arg(key)
            .arg(member)
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn zset_range_by_score(
        &self,
        key: &str,
        lo: f64,
        hi: f64,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let members: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(key)
            .arg(lo)
            .arg(hi)
            .query_async(&mut *conn)
            .await?;
        Ok(members)
    }

    async fn zset_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let members: Vec<String> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut *conn)
            .await?;
        Ok(members)
    }

    async fn zset_rev_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let members: Vec<String> = redis::cmd("ZREVRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut *conn)
            .await?;
        Ok(members)
    }

    async fn zset_card(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let card: u64 = redis::cmd("ZCARD").arg(key).query_async(&mut *conn).await?;
        Ok(card)
    }

    async fn list_push_left(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        redis::cmd("LPUSH")
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn list_trim(&self, key: &str, start: isize, stop: isize) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        redis::cmd("LTRIM")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let values: Vec<String> = redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut *conn)
            .await?;
        Ok(values)
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let len: u64 = redis::cmd("LLEN").arg(key).query_async(&mut *conn).await?;
        Ok(len)
    }

    async fn list_bpop_right(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(key)
            .arg(timeout.as_secs_f64())
            .query_async(&mut *conn)
            .await?;
        Ok(popped.map(|(_, value)| value))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        Ok(members)
    }

    async fn counter_incr(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let value: u64 = redis::cmd("INCR").arg(key).query_async(&mut *conn).await?;
        Ok(value)
    }

    async fn counter_get(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let value: Option<u64> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        Ok(value.unwrap_or(0))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(pattern)
            .query_async(&mut *conn)
            .await?;
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        redis::cmd("PING").query_async::<_, ()>(&mut *conn).await?;
        Ok(())
    }
}
