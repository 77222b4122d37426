// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Typed client over a [`KvService`].

use std::sync::Arc;

use crate::storage::{Key, KeyValue, RangeDescriptor, Value, WriteBatch};
use crate::time::Clock;

use super::{KvError, KvService, Method, Request, RequestBody, Response, ResponseBody};

/// A client handle: typed single-operation calls over a shared service.
///
/// Cloning is cheap. Transactions are run with
/// [`Db::run_transaction`](crate::txn), which hands the body a [`Db`]-like
/// handle bound to a transactional session.
#[derive(Clone)]
pub struct Db {
    kv: Arc<dyn KvService>,
    clock: Arc<dyn Clock>,
    user: String,
}

impl Db {
    /// Creates a client over `kv` using `clock` for transaction timestamps.
    pub fn new(kv: Arc<dyn KvService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            clock,
            user: "root".to_string(),
        }
    }

    /// Sets the user stamped on requests that carry none.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the service requests are sent to.
    pub fn service(&self) -> &Arc<dyn KvService> {
        &self.kv
    }

    /// Sends a raw request.
    pub async fn send(&self, mut request: Request) -> Result<Response, KvError> {
        if request.header.user.is_empty() {
            request.header.user = self.user.clone();
        }
        self.kv.send(request).await
    }

    /// Reads the current value of `key`.
    pub async fn get(&self, key: impl Into<Key>) -> Result<Option<Value>, KvError> {
        match self.send(Request::get(key)).await?.body {
            ResponseBody::Get { value } => Ok(value),
            other => Err(unexpected(Method::Get, other)),
        }
    }

    pub async fn put(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), KvError> {
        match self.send(Request::put(key, value)).await?.body {
            ResponseBody::Put => Ok(()),
            other => Err(unexpected(Method::Put, other)),
        }
    }

    /// Adds `delta` to the integer stored at `key` (missing counts as zero) and
    /// returns the new value.
    pub async fn increment(&self, key: impl Into<Key>, delta: i64) -> Result<i64, KvError> {
        match self.send(Request::increment(key, delta)).await?.body {
            ResponseBody::Increment { new_value } => Ok(new_value),
            other => Err(unexpected(Method::Increment, other)),
        }
    }

    pub async fn delete(&self, key: impl Into<Key>) -> Result<(), KvError> {
        match self.send(Request::delete(key)).await?.body {
            ResponseBody::Delete => Ok(()),
            other => Err(unexpected(Method::Delete, other)),
        }
    }

    /// Returns up to `max_results` rows in `[start, end)`; zero means unlimited.
    pub async fn scan(
        &self,
        start: impl Into<Key>,
        end: impl Into<Key>,
        max_results: usize,
    ) -> Result<Vec<KeyValue>, KvError> {
        match self.send(Request::scan(start, end, max_results)).await?.body {
            ResponseBody::Scan { rows } => Ok(rows),
            other => Err(unexpected(Method::Scan, other)),
        }
    }

    /// Applies every write in `batch` atomically.
    pub async fn write_batch(&self, batch: WriteBatch) -> Result<(), KvError> {
        let key = batch.ops().first().map(|op| op.key().clone()).unwrap_or_default();
        match self.send(Request::new(key, RequestBody::Batch { batch })).await?.body {
            ResponseBody::Batch => Ok(()),
            other => Err(unexpected(Method::Batch, other)),
        }
    }

    /// Splits the range containing `split_key` so that a new range starts there.
    pub async fn split_range(
        &self,
        split_key: impl Into<Key>,
    ) -> Result<(RangeDescriptor, RangeDescriptor), KvError> {
        let split_key = split_key.into();
        let request = Request::new(split_key.clone(), RequestBody::AdminSplit { split_key });
        match self.send(request).await?.body {
            ResponseBody::AdminSplit { left, right } => Ok((left, right)),
            other => Err(unexpected(Method::AdminSplit, other)),
        }
    }

    /// Merges the range containing `key` with the range that follows it.
    pub async fn merge_range(&self, key: impl Into<Key>) -> Result<RangeDescriptor, KvError> {
        match self.send(Request::new(key, RequestBody::AdminMerge)).await?.body {
            ResponseBody::AdminMerge { merged } => Ok(merged),
            other => Err(unexpected(Method::AdminMerge, other)),
        }
    }

    /// Returns the descriptor of the range that owns `key`.
    pub async fn lookup_range(&self, key: impl Into<Key>) -> Result<RangeDescriptor, KvError> {
        match self.send(Request::new(key, RequestBody::RangeLookup)).await?.body {
            ResponseBody::RangeLookup { desc } => Ok(desc),
            other => Err(unexpected(Method::RangeLookup, other)),
        }
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").field("user", &self.user).finish_non_exhaustive()
    }
}

fn unexpected(method: Method, got: ResponseBody) -> KvError {
    KvError::UnexpectedResponse {
        method,
        got: format!("{got:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::LocalKv;
    use crate::storage::{MemMvccStore, RangeId, KEY_MAX, KEY_MIN};
    use crate::time::HlcClock;

    fn db() -> Db {
        let clock = Arc::new(HlcClock::default());
        let kv = LocalKv::new(Arc::new(MemMvccStore::new()), clock.clone()).unwrap();
        Db::new(Arc::new(kv), clock)
    }

    #[tokio::test]
    async fn test_single_operations() {
        let db = db();

        assert_eq!(db.get("a").await.unwrap(), None);
        db.put("a", "1").await.unwrap();
        assert_eq!(db.get("a").await.unwrap(), Some(Value::from("1")));

        assert_eq!(db.increment("n", 2).await.unwrap(), 2);
        assert_eq!(db.increment("n", 2).await.unwrap(), 4);

        db.delete("a").await.unwrap();
        assert_eq!(db.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_and_scan() {
        let db = db();
        let mut batch = WriteBatch::new();
        batch
            .put("k1", Value::from("1"))
            .put("k2", Value::from("2"))
            .put("k3", Value::from("3"));
        db.write_batch(batch).await.unwrap();

        let rows = db.scan("k1", "k3", 0).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].value, Value::from("2"));

        assert_eq!(db.scan("k", "l", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_split_lookup_merge() {
        let db = db();

        let (left, right) = db.split_range("g").await.unwrap();
        assert_eq!(left, RangeDescriptor::new(RangeId(1), KEY_MIN, "g"));
        assert_eq!(db.lookup_range("h").await.unwrap(), right);

        let (_, far) = db.split_range("p").await.unwrap();
        assert_eq!(db.lookup_range("z").await.unwrap(), far);

        let merged = db.merge_range("a").await.unwrap();
        assert_eq!(merged, RangeDescriptor::new(RangeId(1), KEY_MIN, "p"));
        assert_eq!(db.lookup_range("h").await.unwrap(), merged);
        assert_eq!(db.lookup_range("q").await.unwrap().end_key, Key::from(KEY_MAX));
    }
}
