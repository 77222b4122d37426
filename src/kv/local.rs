// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Single-node key-value service over an MVCC store.
//!
//! Transactional writes are held as intents until the transaction ends.
//! Conflicts are arbitrated by priority: a pusher with a higher priority
//! aborts the intent holder and gets a resolved conflict back, otherwise the
//! caller is told to back off. Reads and writes that would break timestamp
//! order come back as retry errors carrying the pushed timestamp.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::storage::key::{range_descriptor_key, RANGE_DESCRIPTOR_PREFIX};
use crate::storage::{
    bootstrap_range_addressing, lookup_range, merge_range_addressing, split_range_addressing,
    BatchOp, Key, KeyValue, MvccEntry, MvccStore, RangeDescriptor, RangeId, Value, WriteBatch,
    KEY_MAX, KEY_MIN,
};
use crate::time::{Clock, Timestamp};
use crate::txn::{Transaction, TxnId, TxnStatus};

use super::ts_cache::TimestampCache;
use super::{
    ClientCmdId, KvError, KvService, Method, Request, RequestBody, Response, ResponseBody,
};

/// How long a cached reply stays eligible for replay.
const REPLY_TTL: Duration = Duration::from_secs(10);

/// Cached replies are pruned once the cache grows past this many entries.
const REPLY_CACHE_PRUNE_THRESHOLD: usize = 4096;

/// How long the record of an aborted transaction outlives the abort.
const ABORTED_RECORD_TTL: Duration = Duration::from_secs(10);

/// Finished transaction records are pruned once this many records exist.
const TXN_RECORD_PRUNE_THRESHOLD: usize = 4096;

/// A provisional write; `None` is a provisional delete.
#[derive(Debug)]
struct Intent {
    txn: Transaction,
    value: Option<Value>,
}

#[derive(Debug, Clone, Copy)]
struct TxnRecord {
    status: TxnStatus,
    priority: i32,
    /// When the status last changed.
    updated: Timestamp,
}

#[derive(Debug, Default)]
struct State {
    intents: BTreeMap<Key, Intent>,
    /// Records of live and recently aborted transactions. Finalized
    /// transactions are removed.
    txns: HashMap<TxnId, TxnRecord>,
    /// Transactions that started before this and have no record were pruned
    /// after an abort.
    txn_low_water: Timestamp,
    reads: TimestampCache,
    replies: HashMap<ClientCmdId, Response>,
}

impl State {
    /// Returns the record of `txn`, creating one on first contact.
    fn txn_record(&mut self, txn: &Transaction, now: Timestamp) -> &mut TxnRecord {
        if self.txns.len() >= TXN_RECORD_PRUNE_THRESHOLD {
            self.prune_txn_records(now);
        }
        let forgotten = txn.orig_timestamp < self.txn_low_water;
        let record = self.txns.entry(txn.id.clone()).or_insert(TxnRecord {
            status: if forgotten {
                TxnStatus::Aborted
            } else {
                TxnStatus::Pending
            },
            priority: txn.priority,
            updated: now,
        });
        record.priority = record.priority.max(txn.priority);
        record
    }

    /// Drops aborted records older than the retention window.
    fn prune_txn_records(&mut self, now: Timestamp) {
        let horizon = u64::try_from(ABORTED_RECORD_TTL.as_nanos()).unwrap_or(u64::MAX);
        let cutoff = Timestamp::from_nanos(now.wall_time().saturating_sub(horizon));
        let before = self.txns.len();
        self.txns
            .retain(|_, record| record.status == TxnStatus::Pending || record.updated >= cutoff);
        self.txn_low_water.forward(cutoff);
        debug!(pruned = before - self.txns.len(), %cutoff, "Pruned transaction records");
    }
}

enum IntentCheck {
    /// No intent the caller has to care about.
    Clear,
    /// The caller's own current-epoch intent.
    Own(Option<Value>),
}

/// A single-node [`KvService`].
///
/// Requests execute one at a time under a single lock. On first open over an
/// empty store the service writes the descriptor of the range covering the
/// whole key-space together with its addressing records.
pub struct LocalKv<S: MvccStore + ?Sized, C: Clock + ?Sized> {
    store: Arc<S>,
    clock: Arc<C>,
    state: Mutex<State>,
    next_range_id: AtomicI64,
}

impl<S: MvccStore + ?Sized, C: Clock + ?Sized> LocalKv<S, C> {
    /// Opens the service, bootstrapping the first range if the store is empty.
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Result<Self, KvError> {
        let prefix = Key::from(RANGE_DESCRIPTOR_PREFIX);
        let rows = store.scan(&prefix, &prefix.prefix_end(), &Timestamp::MAX, 0)?;

        let mut max_range_id = 0;
        for row in &rows {
            max_range_id = max_range_id.max(RangeDescriptor::decode(row.value.as_bytes())?.range_id.0);
        }

        if rows.is_empty() {
            let first = RangeDescriptor::new(RangeId(1), KEY_MIN, KEY_MAX);
            let mut batch = WriteBatch::new();
            batch.put(range_descriptor_key(KEY_MIN), first.encode());
            bootstrap_range_addressing(&mut batch, &first)?;
            apply_batch(&*store, batch, clock.now())?;
            info!(range = %first, "Bootstrapped first range");
            max_range_id = first.range_id.0;
        }

        Ok(Self {
            store,
            clock,
            state: Mutex::new(State::default()),
            next_range_id: AtomicI64::new(max_range_id + 1),
        })
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the number of outstanding intents.
    pub fn intent_count(&self) -> usize {
        self.state.lock().intents.len()
    }

    /// Returns the number of transaction records held.
    pub fn txn_record_count(&self) -> usize {
        self.state.lock().txns.len()
    }

    fn execute(&self, request: Request) -> Result<Response, KvError> {
        let method = request.method();
        let mut state = self.state.lock();

        if let Some(cmd_id) = request.header.cmd_id {
            if let Some(reply) = state.replies.get(&cmd_id) {
                debug!(?cmd_id, %method, "Replaying cached reply");
                return Ok(reply.clone());
            }
        }

        let result = match &request.header.txn {
            _ if method == Method::EndTransaction => self.end_transaction(&mut state, &request),
            Some(txn) if method.is_transactional() => {
                self.execute_txn(&mut state, &request, txn)
            }
            _ => self.execute_plain(&mut state, &request),
        };

        if let (Some(cmd_id), Ok(reply)) = (request.header.cmd_id, &result) {
            if !method.is_read_only() {
                Self::cache_reply(&mut state, cmd_id, reply.clone());
            }
        }
        result
    }

    fn cache_reply(state: &mut State, cmd_id: ClientCmdId, reply: Response) {
        if state.replies.len() >= REPLY_CACHE_PRUNE_THRESHOLD {
            let horizon = REPLY_TTL.as_nanos() as u64;
            let cutoff = cmd_id.wall_time.saturating_sub(horizon);
            state.replies.retain(|id, _| id.wall_time >= cutoff);
        }
        state.replies.insert(cmd_id, reply);
    }

    fn execute_txn(
        &self,
        state: &mut State,
        request: &Request,
        txn: &Transaction,
    ) -> Result<Response, KvError> {
        let mut ts = request.header.timestamp;
        ts.forward(txn.timestamp);
        let now = self.clock.update(ts);

        let record = state.txn_record(txn, now);
        match record.status {
            TxnStatus::Pending => {}
            TxnStatus::Aborted => return Err(aborted(txn, record.priority)),
            TxnStatus::Committed => {
                return Err(KvError::InvalidRequest(format!("{txn} is already committed")))
            }
        }

        let key = &request.header.key;
        let body = match &request.body {
            RequestBody::Get => {
                let value = match self.check_intent(state, key, Some(txn))? {
                    IntentCheck::Own(value) => value,
                    IntentCheck::Clear => {
                        self.check_uncertainty(key, ts, txn)?;
                        self.store.get(key, &ts)?.map(|found| found.value)
                    }
                };
                state.reads.record_read(key, ts, Some(&txn.id));
                ResponseBody::Get { value }
            }
            RequestBody::Put { value } => {
                self.prepare_write(state, key, ts, txn)?;
                self.write_intent(state, key, txn, Some(value.clone()));
                ResponseBody::Put
            }
            RequestBody::Delete => {
                self.prepare_write(state, key, ts, txn)?;
                self.write_intent(state, key, txn, None);
                ResponseBody::Delete
            }
            RequestBody::Increment { delta } => {
                let current = self.prepare_write(state, key, ts, txn)?;
                let new_value = increment(key, current, *delta)?;
                self.write_intent(state, key, txn, Some(Value::from_i64(new_value)));
                ResponseBody::Increment { new_value }
            }
            RequestBody::Scan {
                end_key,
                max_results,
            } => {
                if key >= end_key {
                    return Ok(Response::new(ts, ResponseBody::Scan { rows: Vec::new() }));
                }
                self.check_range_intents(state, key, end_key, Some(txn))?;
                state.reads.record_scan(key, end_key, ts, Some(&txn.id));

                let mut rows: BTreeMap<Key, (Value, Timestamp)> = self
                    .store
                    .scan(key, end_key, &ts, 0)?
                    .into_iter()
                    .map(|row| (row.key, (row.value, row.timestamp)))
                    .collect();
                for (intent_key, intent) in state.intents.range(key.clone()..end_key.clone()) {
                    if intent.txn.id != txn.id || intent.txn.epoch != txn.epoch {
                        continue;
                    }
                    match &intent.value {
                        Some(value) => rows.insert(intent_key.clone(), (value.clone(), ts)),
                        None => rows.remove(intent_key),
                    };
                }

                let limit = if *max_results == 0 { usize::MAX } else { *max_results };
                let rows = rows
                    .into_iter()
                    .take(limit)
                    .map(|(key, (value, timestamp))| KeyValue {
                        key,
                        value,
                        timestamp,
                    })
                    .collect();
                ResponseBody::Scan { rows }
            }
            _ => {
                return Err(KvError::InvalidRequest(format!(
                    "{} is not a transactional method",
                    request.method()
                )))
            }
        };

        Ok(Response::new(ts, body))
    }

    fn execute_plain(&self, state: &mut State, request: &Request) -> Result<Response, KvError> {
        let ts = self.clock.update(request.header.timestamp);
        let key = &request.header.key;

        let body = match &request.body {
            RequestBody::Get => {
                self.check_intent(state, key, None)?;
                state.reads.record_read(key, ts, None);
                ResponseBody::Get {
                    value: self.store.get(key, &ts)?.map(|found| found.value),
                }
            }
            RequestBody::Put { value } => {
                self.check_intent(state, key, None)?;
                self.store
                    .batch_write(vec![MvccEntry::new(key.clone(), value.clone(), ts)])?;
                ResponseBody::Put
            }
            RequestBody::Delete => {
                self.check_intent(state, key, None)?;
                self.store
                    .batch_write(vec![MvccEntry::tombstone(key.clone(), ts)])?;
                ResponseBody::Delete
            }
            RequestBody::Increment { delta } => {
                self.check_intent(state, key, None)?;
                let current = self.store.get(key, &ts)?.map(|found| found.value);
                let new_value = increment(key, current, *delta)?;
                self.store.batch_write(vec![MvccEntry::new(
                    key.clone(),
                    Value::from_i64(new_value),
                    ts,
                )])?;
                ResponseBody::Increment { new_value }
            }
            RequestBody::Scan {
                end_key,
                max_results,
            } => {
                self.check_range_intents(state, key, end_key, None)?;
                state.reads.record_scan(key, end_key, ts, None);
                ResponseBody::Scan {
                    rows: self.store.scan(key, end_key, &ts, *max_results)?,
                }
            }
            RequestBody::Batch { batch } => {
                for op in batch.ops() {
                    self.check_intent(state, op.key(), None)?;
                }
                apply_batch(&*self.store, batch.clone(), ts)?;
                ResponseBody::Batch
            }
            RequestBody::AdminSplit { split_key } => self.split(split_key, ts)?,
            RequestBody::AdminMerge => self.merge(key, ts)?,
            RequestBody::RangeLookup => ResponseBody::RangeLookup {
                desc: self.lookup(key, ts)?,
            },
            RequestBody::EndTransaction { .. } => {
                return Err(KvError::InvalidRequest(
                    "EndTransaction requires a transaction".into(),
                ))
            }
        };

        Ok(Response::new(ts, body))
    }

    fn end_transaction(&self, state: &mut State, request: &Request) -> Result<Response, KvError> {
        let RequestBody::EndTransaction { commit } = request.body else {
            return Err(KvError::InvalidRequest("expected EndTransaction".into()));
        };
        let Some(txn) = request.header.txn.as_ref() else {
            return Err(KvError::InvalidRequest(
                "EndTransaction requires a transaction".into(),
            ));
        };

        let mut commit_ts = request.header.timestamp;
        commit_ts.forward(txn.timestamp);
        let now = self.clock.update(commit_ts);

        let record = state.txn_record(txn, now);
        match (record.status, commit) {
            (TxnStatus::Pending, _) => {}
            (TxnStatus::Aborted, false) => {
                state.txns.remove(&txn.id);
                return Ok(Response::new(
                    commit_ts,
                    ResponseBody::EndTransaction {
                        commit_timestamp: commit_ts,
                    },
                ))
            }
            (TxnStatus::Aborted, true) => return Err(aborted(txn, record.priority)),
            (TxnStatus::Committed, _) => {
                return Err(KvError::InvalidRequest(format!("{txn} is already committed")))
            }
        }

        // Intents from earlier epochs were superseded by the restart and are dropped.
        let entries: Vec<MvccEntry> = if commit {
            state
                .intents
                .iter()
                .filter(|(_, intent)| intent.txn.id == txn.id && intent.txn.epoch == txn.epoch)
                .map(|(key, intent)| MvccEntry {
                    key: key.clone(),
                    value: intent.value.clone(),
                    timestamp: commit_ts,
                })
                .collect()
        } else {
            Vec::new()
        };
        let written = entries.len();
        if !entries.is_empty() {
            self.store.batch_write(entries)?;
        }
        state.intents.retain(|_, intent| intent.txn.id != txn.id);
        state.txns.remove(&txn.id);

        debug!(txn = %txn, commit, %commit_ts, written, "Ended transaction");
        Ok(Response::new(
            commit_ts,
            ResponseBody::EndTransaction {
                commit_timestamp: commit_ts,
            },
        ))
    }

    /// Checks `key` for a conflicting intent, pushing the holder if `pusher` outranks it.
    fn check_intent(
        &self,
        state: &mut State,
        key: &Key,
        pusher: Option<&Transaction>,
    ) -> Result<IntentCheck, KvError> {
        let Some(intent) = state.intents.get(key) else {
            return Ok(IntentCheck::Clear);
        };
        if let Some(txn) = pusher {
            if intent.txn.id == txn.id {
                return Ok(if intent.txn.epoch == txn.epoch {
                    IntentCheck::Own(intent.value.clone())
                } else {
                    IntentCheck::Clear
                });
            }
        }

        let mut holder = intent.txn.clone();
        if let Some(record) = state.txns.get(&holder.id) {
            holder.priority = holder.priority.max(record.priority);
        }

        match pusher {
            Some(txn) if txn.priority > holder.priority => {
                debug!(pusher = %txn, holder = %holder, key = %key, "Aborting lower-priority intent holder");
                abort_txn(state, &holder.id, txn.priority, self.clock.now());
                Err(KvError::WriteIntent {
                    key: key.clone(),
                    txn: holder,
                    resolved: true,
                })
            }
            _ => Err(KvError::WriteIntent {
                key: key.clone(),
                txn: holder,
                resolved: false,
            }),
        }
    }

    fn check_range_intents(
        &self,
        state: &mut State,
        start: &Key,
        end: &Key,
        pusher: Option<&Transaction>,
    ) -> Result<(), KvError> {
        if start >= end {
            return Ok(());
        }
        let foreign = state
            .intents
            .range(start.clone()..end.clone())
            .find(|(_, intent)| pusher.map_or(true, |txn| intent.txn.id != txn.id))
            .map(|(key, _)| key.clone());
        if let Some(key) = foreign {
            self.check_intent(state, &key, pusher)?;
        }
        Ok(())
    }

    /// Reads of a version committed inside the uncertainty window must restart above it.
    fn check_uncertainty(&self, key: &Key, ts: Timestamp, txn: &Transaction) -> Result<(), KvError> {
        match self.store.latest_timestamp(key)? {
            Some(latest) if latest > ts && latest <= txn.max_timestamp => {
                Err(retry(txn, latest, format!("uncertain read of {key} at {latest}")))
            }
            _ => Ok(()),
        }
    }

    /// Checks intents and write ordering for a transactional write; returns the current value.
    fn prepare_write(
        &self,
        state: &mut State,
        key: &Key,
        ts: Timestamp,
        txn: &Transaction,
    ) -> Result<Option<Value>, KvError> {
        if let IntentCheck::Own(value) = self.check_intent(state, key, Some(txn))? {
            return Ok(value);
        }
        if let Some(read) = state.reads.blocking_read(key, ts, &txn.id) {
            return Err(retry(txn, read, format!("{key} was read at {read}")));
        }
        if let Some(latest) = self.store.latest_timestamp(key)? {
            if latest >= ts {
                return Err(retry(txn, latest, format!("write too old for {key} at {latest}")));
            }
        }
        Ok(self.store.get(key, &ts)?.map(|found| found.value))
    }

    fn write_intent(&self, state: &mut State, key: &Key, txn: &Transaction, value: Option<Value>) {
        state.intents.insert(
            key.clone(),
            Intent {
                txn: txn.clone(),
                value,
            },
        );
    }

    fn lookup(&self, key: &Key, ts: Timestamp) -> Result<RangeDescriptor, KvError> {
        lookup_range(&*self.store, key.as_bytes(), &ts)?
            .ok_or_else(|| KvError::RangeNotFound { key: key.clone() })
    }

    fn split(&self, split_key: &Key, ts: Timestamp) -> Result<ResponseBody, KvError> {
        let original = self.lookup(split_key, ts)?;
        if original.start_key == *split_key {
            return Err(KvError::InvalidRequest(format!(
                "{split_key} is already the start of {original}"
            )));
        }

        let left = RangeDescriptor::new(
            original.range_id,
            original.start_key.clone(),
            split_key.clone(),
        );
        let right = RangeDescriptor::new(
            RangeId(self.next_range_id.fetch_add(1, Ordering::SeqCst)),
            split_key.clone(),
            original.end_key.clone(),
        );

        let mut batch = WriteBatch::new();
        batch
            .put(range_descriptor_key(left.start_key.as_bytes()), left.encode())
            .put(range_descriptor_key(right.start_key.as_bytes()), right.encode());
        split_range_addressing(&mut batch, &original, &left, &right)?;
        apply_batch(&*self.store, batch, ts)?;

        info!(original = %original, left = %left, right = %right, "Split range");
        Ok(ResponseBody::AdminSplit { left, right })
    }

    fn merge(&self, key: &Key, ts: Timestamp) -> Result<ResponseBody, KvError> {
        let left = self.lookup(key, ts)?;
        if left.end_key.as_bytes() == KEY_MAX {
            return Err(KvError::InvalidRequest(format!(
                "{left} is the last range and has nothing to merge with"
            )));
        }
        let right = self.lookup(&left.end_key, ts)?;
        let merged = RangeDescriptor::new(
            left.range_id,
            left.start_key.clone(),
            right.end_key.clone(),
        );

        let mut batch = WriteBatch::new();
        batch
            .delete(range_descriptor_key(right.start_key.as_bytes()))
            .put(range_descriptor_key(merged.start_key.as_bytes()), merged.encode());
        merge_range_addressing(&mut batch, &left, &right, &merged)?;
        apply_batch(&*self.store, batch, ts)?;

        info!(left = %left, right = %right, merged = %merged, "Merged ranges");
        Ok(ResponseBody::AdminMerge { merged })
    }
}

#[async_trait]
impl<S: MvccStore + ?Sized, C: Clock + ?Sized> KvService for LocalKv<S, C> {
    #[instrument(skip(self, request), fields(method = %request.method(), key = %request.header.key))]
    async fn send(&self, request: Request) -> Result<Response, KvError> {
        self.execute(request)
    }
}

/// Writes every operation of `batch` at `ts` in one atomic store write.
fn apply_batch<S: MvccStore + ?Sized>(
    store: &S,
    batch: WriteBatch,
    ts: Timestamp,
) -> Result<(), KvError> {
    let entries = batch
        .into_ops()
        .into_iter()
        .map(|op| match op {
            BatchOp::Put { key, value } => MvccEntry::new(key, value, ts),
            BatchOp::Delete { key } => MvccEntry::tombstone(key, ts),
        })
        .collect();
    store.batch_write(entries)?;
    Ok(())
}

fn abort_txn(state: &mut State, id: &TxnId, aborter_priority: i32, now: Timestamp) {
    let record = state.txns.entry(id.clone()).or_insert(TxnRecord {
        status: TxnStatus::Pending,
        priority: aborter_priority,
        updated: now,
    });
    record.status = TxnStatus::Aborted;
    record.priority = record.priority.max(aborter_priority);
    record.updated = now;
    state.intents.retain(|_, intent| intent.txn.id != *id);
}

fn aborted(txn: &Transaction, priority: i32) -> KvError {
    let mut txn = txn.clone();
    txn.status = TxnStatus::Aborted;
    txn.upgrade_priority(priority);
    KvError::TransactionAborted { txn }
}

fn retry(txn: &Transaction, conflicting: Timestamp, reason: String) -> KvError {
    let mut txn = txn.clone();
    txn.timestamp.forward(conflicting.next());
    KvError::TransactionRetry { txn, reason }
}

fn increment(key: &Key, current: Option<Value>, delta: i64) -> Result<i64, KvError> {
    let current = current.map(|value| value.as_i64()).transpose()?.unwrap_or(0);
    current
        .checked_add(delta)
        .ok_or_else(|| KvError::InvalidRequest(format!("increment of {key} by {delta} overflows")))
}
