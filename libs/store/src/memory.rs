//! Deterministic in-memory store backend
//!
//! A single lock guards the whole keyspace, which makes `txn` trivially
//! atomic. Sorted sets remember insertion order so equal-score members come
//! back in time order, the contract the matching loop depends on.

use crate::adapter::{Store, StoreError, WriteOp};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;

const BPOP_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
struct ZEntry {
    member: String,
    score: f64,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    hashes: HashMap<String, HashMap<String, String>>,
    zsets: HashMap<String, Vec<ZEntry>>,
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, BTreeSet<String>>,
    counters: HashMap<String, u64>,
    next_seq: u64,
}

impl Inner {
    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::HashSet { key, fields } => {
                let hash = self.hashes.entry(key).or_default();
                for (field, value) in fields {
                    hash.insert(field, value);
                }
            }
            WriteOp::ZAdd { key, score, member } => self.zadd(&key, score, &member),
            WriteOp::ZRem { key, member } => self.zrem(&key, &member),
            WriteOp::ListPushLeft { key, value } => {
                self.lists.entry(key).or_default().push_front(value);
            }
            WriteOp::ListTrim { key, start, stop } => self.ltrim(&key, start, stop),
            WriteOp::SetAdd { key, member } => {
                self.sets.entry(key).or_default().insert(member);
            }
            WriteOp::Del { key } => {
                self.hashes.remove(&key);
                self.zsets.remove(&key);
                self.lists.remove(&key);
                self.sets.remove(&key);
                self.counters.remove(&key);
            }
        }
    }

    fn zadd(&mut self, key: &str, score: f64, member: &str) {
        let entries = self.zsets.entry(key.to_string()).or_default();
        if let Some(entry) = entries.iter_mut().find(|e| e.member == member) {
            entry.score = score;
        } else {
            let seq = self.next_seq;
            self.next_seq += 1;
            entries.push(ZEntry {
                member: member.to_string(),
                score,
                seq,
            });
        }
        entries.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.seq.cmp(&b.seq)));
    }

    fn zrem(&mut self, key: &str, member: &str) {
        if let Some(entries) = self.zsets.get_mut(key) {
            entries.retain(|e| e.member != member);
            if entries.is_empty() {
                self.zsets.remove(key);
            }
        }
    }

    fn ltrim(&mut self, key: &str, start: isize, stop: isize) {
        if let Some(list) = self.lists.get_mut(key) {
            match resolve_range(list.len(), start, stop) {
                Some((lo, hi)) => {
                    let kept: VecDeque<String> = list
                        .iter()
                        .skip(lo)
                        .take(hi - lo + 1)
                        .cloned()
                        .collect();
                    *list = kept;
                }
                None => {
                    self.lists.remove(key);
                }
            }
        }
    }
}

/// Normalize a Redis-style inclusive index range against a length.
///
/// Returns None when the range selects nothing.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let n = len as isize;
    let mut lo = if start < 0 { n + start } else { start };
    let mut hi = if stop < 0 { n + stop } else { stop };
    if lo < 0 {
        lo = 0;
    }
    if hi >= n {
        hi = n - 1;
    }
    if lo > hi || lo >= n || hi < 0 {
        return None;
    }
    Some((lo as usize, hi as usize))
}

/// Glob match supporting `*` wildcards only, which is all the key layout uses.
fn glob_match(pattern: &str, key: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == key;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut pos = 0usize;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !key.starts_with(part) {
                return false;
            }
            pos = part.len();
        } else if i == parts.len() - 1 {
            return key.len() >= pos + part.len() && key.ends_with(part);
        } else {
            match key[pos..].find(part) {
                Some(idx) => pos += idx + part.len(),
                None => return false,
            }
        }
    }
    true
}

/// In-memory store used by tests and local development
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn txn(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        for op in ops {
            inner.apply(op);
        }
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field).cloned()))
    }

    async fn hash_set(&self, key: &str, fields: Vec<(String, String)>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.apply(WriteOp::HashSet {
            key: key.to_string(),
            fields,
        });
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn zset_add(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.zadd(key, score, member);
        Ok(())
    }

    async fn zset_rem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.zrem(key, member);
        Ok(())
    }

    async fn zset_range_by_score(
        &self,
        key: &str,
        lo: f64,
        hi: f64,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .zsets
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.score >= lo && e.score <= hi)
                    .map(|e| e.member.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn zset_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        let entries = match inner.zsets.get(key) {
            Some(entries) => entries,
            None => return Ok(Vec::new()),
        };
        Ok(match resolve_range(entries.len(), start, stop) {
            Some((lo, hi)) => entries[lo..=hi].iter().map(|e| e.member.clone()).collect(),
            None => Vec::new(),
        })
    }

    async fn zset_rev_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        let entries = match inner.zsets.get(key) {
            Some(entries) => entries,
            None => return Ok(Vec::new()),
        };
        let reversed: Vec<&ZEntry> = entries.iter().rev().collect();
        Ok(match resolve_range(reversed.len(), start, stop) {
            Some((lo, hi)) => reversed[lo..=hi].iter().map(|e| e.member.clone()).collect(),
            None => Vec::new(),
        })
    }

    async fn zset_card(&self, key: &str) -> Result<u64, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.zsets.get(key).map_or(0, |e| e.len() as u64))
    }

    async fn list_push_left(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner
            .lists
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    async fn list_trim(&self, key: &str, start: isize, stop: isize) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.ltrim(key, start, stop);
        Ok(())
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        let list = match inner.lists.get(key) {
            Some(list) => list,
            None => return Ok(Vec::new()),
        };
        Ok(match resolve_range(list.len(), start, stop) {
            Some((lo, hi)) => list.iter().skip(lo).take(hi - lo + 1).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.lists.get(key).map_or(0, |l| l.len() as u64))
    }

    async fn list_bpop_right(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(list) = inner.lists.get_mut(key) {
                    if let Some(value) = list.pop_back() {
                        return Ok(Some(value));
                    }
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(BPOP_POLL_INTERVAL).await;
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn counter_incr(&self, key: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let counter = inner.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn counter_get(&self, key: &str) -> Result<u64, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.counters.get(key).copied().unwrap_or(0))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        let mut matched: Vec<String> = inner
            .hashes
            .keys()
            .chain(inner.zsets.keys())
            .chain(inner.lists.keys())
            .chain(inner.sets.keys())
            .chain(inner.counters.keys())
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        matched.sort();
        matched.dedup();
        Ok(matched)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
