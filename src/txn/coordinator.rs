// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Client-side transaction coordinator.
//!
//! A [`TxnCoordinator`] is a [`KvService`] that wraps another service and
//! turns the requests sent through it into one transaction. It creates the
//! transaction record lazily on the first operation, stamps every request,
//! absorbs conflict errors (retrying, backing off, or adopting a restarted
//! record as appropriate), and finalizes the transaction once all outstanding
//! operations have drained.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::kv::{
    ClientCmdId, Conflict, KvError, KvService, Request, RequestBody, RequestHeader, Response,
};
use crate::storage::Key;
use crate::time::{Clock, Timestamp};

use super::in_flight::{InFlight, InFlightGuard};
use super::retry::Backoff;
use super::{Transaction, TxnConfig};

/// Mutable session state. Never held across an await.
#[derive(Debug, Default)]
struct Session {
    txn: Option<Transaction>,
    /// Newest timestamp observed by the session. Never decreases.
    timestamp: Timestamp,
    done: bool,
}

/// What to do after one attempt of an operation.
enum Step {
    Return(Result<Response, KvError>),
    RetryNow,
    Backoff(KvError),
}

/// Drives one transaction over a wrapped [`KvService`].
///
/// Operations may be sent concurrently; each is stamped with the transaction's
/// current state when it starts. [`commit`](Self::commit) and
/// [`abort`](Self::abort) close the session to new operations, wait for the
/// outstanding ones, and send the finalization directly to the wrapped
/// service.
pub struct TxnCoordinator {
    wrapped: Arc<dyn KvService>,
    clock: Arc<dyn Clock>,
    config: TxnConfig,
    session: Mutex<Session>,
    in_flight: InFlight,
}

impl TxnCoordinator {
    pub fn new(wrapped: Arc<dyn KvService>, clock: Arc<dyn Clock>, config: TxnConfig) -> Self {
        Self {
            wrapped,
            clock,
            config,
            session: Mutex::new(Session::default()),
            in_flight: InFlight::default(),
        }
    }

    /// Returns a snapshot of the current transaction record, if one was created.
    pub fn transaction(&self) -> Option<Transaction> {
        self.session.lock().txn.clone()
    }

    /// Returns the newest timestamp the session has observed.
    pub fn timestamp(&self) -> Timestamp {
        self.session.lock().timestamp
    }

    /// Returns true once the session has been committed or aborted.
    pub fn is_done(&self) -> bool {
        self.session.lock().done
    }

    pub fn config(&self) -> &TxnConfig {
        &self.config
    }

    /// Commits the transaction.
    pub async fn commit(&self) -> Result<(), KvError> {
        self.end_transaction(true).await
    }

    /// Aborts the transaction.
    pub async fn abort(&self) -> Result<(), KvError> {
        self.end_transaction(false).await
    }

    #[instrument(skip(self), fields(user = %self.config.user))]
    async fn end_transaction(&self, commit: bool) -> Result<(), KvError> {
        {
            let mut session = self.session.lock();
            if session.done {
                return Err(KvError::TransactionClosed);
            }
            session.done = true;
        }

        self.in_flight.wait_idle().await;

        let request = {
            let session = self.session.lock();
            let Some(txn) = session.txn.as_ref() else {
                debug!("No operations were sent; nothing to finalize");
                return Ok(());
            };
            Request {
                header: RequestHeader {
                    key: txn.key.clone(),
                    user: self.config.user.clone(),
                    timestamp: session.timestamp,
                    txn: Some(txn.clone()),
                    cmd_id: Some(ClientCmdId::new(self.clock.now())),
                },
                body: RequestBody::EndTransaction { commit },
            }
        };

        let reply = self.wrapped.send(request).await?;
        self.observe(reply.timestamp);
        debug!(commit, timestamp = %reply.timestamp, "Finalized transaction");
        Ok(())
    }

    /// Validates and stamps an operation, registering it as in flight.
    ///
    /// The session lock is held while the operation is registered, so a
    /// concurrent finalization either rejects it or waits for it.
    fn begin(&self, request: &mut Request) -> Result<InFlightGuard<'_>, KvError> {
        let mut session = self.session.lock();
        if session.done {
            return Err(KvError::TransactionClosed);
        }

        let method = request.method();
        if !method.is_transactional() {
            return Err(KvError::NonTransactional { method });
        }

        if session.txn.is_none() {
            let txn = self.new_txn(request.header.key.clone());
            debug!(txn = %txn, "Created transaction");
            session.timestamp.forward(txn.timestamp);
            session.txn = Some(txn);
        }

        self.stamp(&session, request);
        Ok(self.in_flight.enter())
    }

    fn stamp(&self, session: &Session, request: &mut Request) {
        request.header.user = self.config.user.clone();
        request.header.timestamp = session.timestamp;
        request.header.txn = session.txn.clone();
    }

    fn new_txn(&self, key: Key) -> Transaction {
        Transaction::new(
            key,
            self.config.user_priority,
            self.config.isolation,
            self.clock.as_ref(),
        )
    }

    fn observe(&self, timestamp: Timestamp) {
        self.clock.update(timestamp);
        self.session.lock().timestamp.forward(timestamp);
    }

    /// Folds the outcome of one attempt into the session.
    fn absorb(&self, request: &mut Request, result: Result<Response, KvError>) -> Step {
        let err = match result {
            Ok(reply) => {
                self.observe(reply.timestamp);
                return Step::Return(Ok(reply));
            }
            Err(err) => err,
        };

        let mut session = self.session.lock();
        match err.conflict() {
            Conflict::WriteIntent { resolved: true, .. } => {
                debug!(error = %err, "Conflict resolved; retrying immediately");
                self.stamp(&session, request);
                Step::RetryNow
            }
            Conflict::WriteIntent {
                resolved: false,
                priority,
            } => {
                if let Some(txn) = session.txn.as_mut() {
                    txn.upgrade_priority(priority.saturating_sub(1));
                }
                self.stamp(&session, request);
                Step::Backoff(err)
            }
            Conflict::Ordering { txn: pushed } => {
                let mut txn = pushed.clone();
                let mut timestamp = pushed.timestamp;
                timestamp.forward(request.header.timestamp);
                timestamp.forward(session.timestamp);
                txn.timestamp = timestamp;
                if let Some(current) = session.txn.as_ref() {
                    txn.epoch = txn.epoch.max(current.epoch);
                    txn.upgrade_priority(current.priority);
                }
                txn.epoch += 1;

                debug!(txn = %txn, "Restarting transaction at a later timestamp");
                session.timestamp = timestamp;
                session.txn = Some(txn);
                Step::Return(Err(err))
            }
            Conflict::Aborted { priority } => {
                let mut txn = self.new_txn(request.header.key.clone());
                txn.upgrade_priority(priority);
                if let Some(previous) = session.txn.as_ref() {
                    txn.upgrade_priority(previous.priority);
                }
                session.timestamp.forward(txn.timestamp);
                txn.timestamp = session.timestamp;

                debug!(txn = %txn, "Transaction aborted; starting a new record");
                session.txn = Some(txn);
                Step::Return(Err(err))
            }
            Conflict::Other => Step::Return(Err(err)),
        }
    }
}

#[async_trait]
impl KvService for TxnCoordinator {
    #[instrument(skip(self, request), fields(method = %request.method(), key = %request.header.key))]
    async fn send(&self, mut request: Request) -> Result<Response, KvError> {
        let _in_flight = self.begin(&mut request)?;
        let mutating = !request.method().is_read_only();
        let mut backoff = Backoff::new(&self.config.retry);

        loop {
            if mutating {
                request.header.cmd_id = Some(ClientCmdId::new(self.clock.now()));
            }

            let result = self.wrapped.send(request.clone()).await;
            match self.absorb(&mut request, result) {
                Step::Return(result) => return result,
                Step::RetryNow => backoff.reset(),
                Step::Backoff(err) => match backoff.next_delay() {
                    Some(delay) => {
                        debug!(error = %err, ?delay, attempt = backoff.attempts(), "Blocked by write intent; backing off");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!(error = %err, attempts = backoff.attempts(), "Giving up on blocked operation");
                        return Err(err);
                    }
                },
            }
        }
    }
}

impl std::fmt::Debug for TxnCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxnCoordinator")
            .field("config", &self.config)
            .field("session", &*self.session.lock())
            .field("in_flight", &self.in_flight.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use tokio::sync::Notify;

    use crate::kv::{Method, ResponseBody};
    use crate::storage::Value;
    use crate::time::HlcClock;
    use crate::txn::{IsolationLevel, RetryOptions};

    /// Replies from a script, then succeeds; records every request it sees.
    #[derive(Default)]
    struct ScriptedKv {
        script: parking_lot::Mutex<VecDeque<Result<Response, KvError>>>,
        seen: parking_lot::Mutex<Vec<Request>>,
        end_error: parking_lot::Mutex<Option<KvError>>,
    }

    impl ScriptedKv {
        fn with_script(script: Vec<Result<Response, KvError>>) -> Arc<Self> {
            Arc::new(Self {
                script: parking_lot::Mutex::new(script.into()),
                ..Default::default()
            })
        }

        fn seen(&self) -> Vec<Request> {
            self.seen.lock().clone()
        }

        fn methods(&self) -> Vec<Method> {
            self.seen.lock().iter().map(Request::method).collect()
        }
    }

    #[async_trait]
    impl KvService for ScriptedKv {
        async fn send(&self, request: Request) -> Result<Response, KvError> {
            self.seen.lock().push(request.clone());
            if request.method() == Method::EndTransaction {
                if let Some(err) = self.end_error.lock().clone() {
                    return Err(err);
                }
            }
            if let Some(reply) = self.script.lock().pop_front() {
                return reply;
            }
            Ok(Response::new(request.header.timestamp, ResponseBody::Put))
        }
    }

    fn clock() -> Arc<HlcClock> {
        Arc::new(HlcClock::manual(1_000_000, Duration::from_nanos(100)).0)
    }

    fn coordinator(kv: Arc<dyn KvService>, config: TxnConfig) -> TxnCoordinator {
        TxnCoordinator::new(kv, clock(), config)
    }

    fn fixed(priority: i32) -> TxnConfig {
        TxnConfig::default().with_user_priority(-priority)
    }

    fn other_txn(priority: i32) -> Transaction {
        Transaction::new(
            Key::from("other"),
            -priority,
            IsolationLevel::default(),
            &HlcClock::default(),
        )
    }

    fn intent_error(priority: i32, resolved: bool) -> Result<Response, KvError> {
        Err(KvError::WriteIntent {
            key: Key::from("k"),
            txn: other_txn(priority),
            resolved,
        })
    }

    fn ok_at(wall: u64) -> Result<Response, KvError> {
        Ok(Response::new(Timestamp::new(wall, 0), ResponseBody::Put))
    }

    #[tokio::test]
    async fn test_first_operation_creates_anchored_txn() {
        let kv = ScriptedKv::with_script(vec![]);
        let coord = coordinator(kv.clone(), fixed(3).with_user("alice"));
        assert!(coord.transaction().is_none());

        coord.send(Request::put("anchor", "v")).await.unwrap();
        coord.send(Request::get("other")).await.unwrap();

        let txn = coord.transaction().unwrap();
        assert_eq!(txn.key, Key::from("anchor"));
        assert_eq!(txn.priority, 3);
        assert_eq!(txn.epoch, 0);

        for request in kv.seen() {
            assert_eq!(request.header.user, "alice");
            assert_eq!(request.header.txn.as_ref().unwrap().id, txn.id);
            assert!(request.header.timestamp >= txn.orig_timestamp);
        }
    }

    #[tokio::test]
    async fn test_rejects_non_transactional_methods() {
        let kv = ScriptedKv::with_script(vec![]);
        let coord = coordinator(kv.clone(), TxnConfig::default());

        for body in [
            RequestBody::AdminSplit {
                split_key: Key::from("m"),
            },
            RequestBody::AdminMerge,
            RequestBody::RangeLookup,
            RequestBody::EndTransaction { commit: true },
        ] {
            let request = Request::new("k", body);
            let method = request.method();
            let err = coord.send(request).await.unwrap_err();
            assert!(matches!(err, KvError::NonTransactional { method: m } if m == method));
        }

        assert!(kv.seen().is_empty());
        assert!(coord.transaction().is_none());
    }

    #[tokio::test]
    async fn test_only_mutations_carry_cmd_ids() {
        let kv = ScriptedKv::with_script(vec![]);
        let coord = coordinator(kv.clone(), TxnConfig::default());

        coord.send(Request::get("a")).await.unwrap();
        coord.send(Request::put("a", "v")).await.unwrap();
        coord.send(Request::scan("a", "b", 0)).await.unwrap();
        coord.send(Request::increment("n", 1)).await.unwrap();

        let has_id: Vec<bool> = kv.seen().iter().map(|r| r.header.cmd_id.is_some()).collect();
        assert_eq!(has_id, vec![false, true, false, true]);
    }

    #[tokio::test]
    async fn test_fresh_cmd_id_per_attempt() {
        let kv = ScriptedKv::with_script(vec![intent_error(5, true)]);
        let coord = coordinator(kv.clone(), fixed(10));

        coord.send(Request::put("k", "v")).await.unwrap();

        let seen = kv.seen();
        assert_eq!(seen.len(), 2);
        assert_ne!(seen[0].header.cmd_id, seen[1].header.cmd_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolved_intent_retries_without_delay() {
        let kv = ScriptedKv::with_script(vec![intent_error(5, true), intent_error(5, true)]);
        let coord = coordinator(kv.clone(), fixed(10));

        let start = tokio::time::Instant::now();
        coord.send(Request::put("k", "v")).await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(kv.seen().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolved_intent_backs_off_and_upgrades_priority() {
        let kv = ScriptedKv::with_script(vec![intent_error(50, false), intent_error(50, false)]);
        let coord = coordinator(kv.clone(), fixed(1));

        let start = tokio::time::Instant::now();
        coord.send(Request::put("k", "v")).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(150 + 300));
        let seen = kv.seen();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].header.txn.as_ref().unwrap().priority, 1);
        assert_eq!(seen[1].header.txn.as_ref().unwrap().priority, 49);
        assert_eq!(coord.transaction().unwrap().priority, 49);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_attempts_returns_last_conflict() {
        let kv = ScriptedKv::with_script((0..10).map(|_| intent_error(50, false)).collect());
        let config = fixed(1).with_retry(RetryOptions::default().with_max_attempts(3));
        let coord = coordinator(kv.clone(), config);

        let err = coord.send(Request::put("k", "v")).await.unwrap_err();
        assert!(matches!(err, KvError::WriteIntent { resolved: false, .. }));
        assert_eq!(kv.seen().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_error_restarts_epoch_at_pushed_timestamp() {
        let kv = ScriptedKv::with_script(vec![]);
        let coord = coordinator(kv.clone(), fixed(7));
        coord.send(Request::put("k", "v")).await.unwrap();
        let before = coord.transaction().unwrap();

        let mut pushed = before.clone();
        pushed.timestamp = Timestamp::new(9_000_000, 3);
        kv.script.lock().push_back(Err(KvError::TransactionRetry {
            txn: pushed,
            reason: "write too old".into(),
        }));

        let err = coord.send(Request::put("k", "v")).await.unwrap_err();
        assert!(err.is_txn_restart());

        let after = coord.transaction().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.epoch, before.epoch + 1);
        assert_eq!(after.timestamp, Timestamp::new(9_000_000, 3));
        assert_eq!(after.priority, 7);
        assert_eq!(coord.timestamp(), Timestamp::new(9_000_000, 3));
    }

    #[tokio::test]
    async fn test_retry_error_never_moves_timestamp_back() {
        let kv = ScriptedKv::with_script(vec![ok_at(5_000_000)]);
        let coord = coordinator(kv.clone(), fixed(7));
        coord.send(Request::put("k", "v")).await.unwrap();

        let mut stale = coord.transaction().unwrap();
        stale.timestamp = Timestamp::new(1, 0);
        kv.script.lock().push_back(Err(KvError::TransactionRetry {
            txn: stale,
            reason: "uncertain".into(),
        }));
        coord.send(Request::get("k")).await.unwrap_err();

        assert!(coord.timestamp() >= Timestamp::new(5_000_000, 0));
        assert_eq!(coord.transaction().unwrap().timestamp, coord.timestamp());
    }

    #[tokio::test]
    async fn test_aborted_error_starts_new_record_at_operation_key() {
        let kv = ScriptedKv::with_script(vec![]);
        let coord = coordinator(kv.clone(), fixed(4));
        coord.send(Request::put("first", "v")).await.unwrap();
        let before = coord.transaction().unwrap();

        kv.script
            .lock()
            .push_back(Err(KvError::TransactionAborted { txn: other_txn(90) }));
        let err = coord.send(Request::put("second", "v")).await.unwrap_err();
        assert!(matches!(err, KvError::TransactionAborted { .. }));

        let after = coord.transaction().unwrap();
        assert_ne!(after.id, before.id);
        assert_eq!(after.key, Key::from("second"));
        assert_eq!(after.epoch, 0);
        assert_eq!(after.priority, 90);
        assert!(after.timestamp >= before.timestamp);
    }

    #[tokio::test]
    async fn test_priority_survives_repeated_aborts() {
        let kv = ScriptedKv::with_script(vec![
            Err(KvError::TransactionAborted { txn: other_txn(60) }),
            Err(KvError::TransactionAborted { txn: other_txn(20) }),
        ]);
        let coord = coordinator(kv.clone(), fixed(4));

        coord.send(Request::put("k", "v")).await.unwrap_err();
        assert_eq!(coord.transaction().unwrap().priority, 60);

        coord.send(Request::put("k", "v")).await.unwrap_err();
        assert_eq!(coord.transaction().unwrap().priority, 60);
    }

    #[tokio::test]
    async fn test_timestamp_monotonic_across_replies() {
        let kv = ScriptedKv::with_script(vec![ok_at(8_000_000), ok_at(2_000_000), ok_at(9_000_000)]);
        let coord = coordinator(kv.clone(), fixed(1));

        let mut last = Timestamp::ZERO;
        for _ in 0..3 {
            coord.send(Request::put("k", "v")).await.unwrap();
            assert!(coord.timestamp() >= last);
            last = coord.timestamp();
        }
        assert_eq!(last, Timestamp::new(9_000_000, 0));

        coord.send(Request::get("k")).await.unwrap();
        let seen = kv.seen();
        assert_eq!(seen[3].header.timestamp, Timestamp::new(9_000_000, 0));
        assert!(seen[2].header.timestamp >= Timestamp::new(8_000_000, 0));
    }

    #[tokio::test]
    async fn test_other_errors_pass_through() {
        let kv = ScriptedKv::with_script(vec![Err(KvError::InvalidRequest("nope".into()))]);
        let coord = coordinator(kv.clone(), fixed(1));
        let before = coord.timestamp();

        let err = coord.send(Request::put("k", "v")).await.unwrap_err();
        assert!(matches!(err, KvError::InvalidRequest(_)));
        assert_eq!(kv.seen().len(), 1);
        assert_eq!(coord.transaction().unwrap().epoch, 0);
        assert!(coord.timestamp() >= before);
    }

    #[tokio::test]
    async fn test_commit_sends_end_transaction() {
        let kv = ScriptedKv::with_script(vec![]);
        let coord = coordinator(kv.clone(), fixed(1));
        coord.send(Request::put("k", "v")).await.unwrap();
        coord.commit().await.unwrap();

        let seen = kv.seen();
        let end = seen.last().unwrap();
        assert!(matches!(end.body, RequestBody::EndTransaction { commit: true }));
        assert_eq!(end.header.key, Key::from("k"));
        assert!(end.header.txn.is_some());
        assert!(coord.is_done());
    }

    #[tokio::test]
    async fn test_finalize_without_operations_is_noop() {
        let kv = ScriptedKv::with_script(vec![]);
        let coord = coordinator(kv.clone(), TxnConfig::default());
        coord.abort().await.unwrap();
        assert!(kv.seen().is_empty());
    }

    #[tokio::test]
    async fn test_closed_after_finalize() {
        let kv = ScriptedKv::with_script(vec![]);
        let coord = coordinator(kv.clone(), TxnConfig::default());
        coord.send(Request::put("k", "v")).await.unwrap();
        coord.commit().await.unwrap();

        let err = coord.send(Request::put("k", "v")).await.unwrap_err();
        assert!(matches!(err, KvError::TransactionClosed));
        assert!(matches!(coord.commit().await, Err(KvError::TransactionClosed)));
        assert!(matches!(coord.abort().await, Err(KvError::TransactionClosed)));
        assert_eq!(kv.methods(), vec![Method::Put, Method::EndTransaction]);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_admin_as_closed() {
        let kv = ScriptedKv::with_script(vec![]);
        let coord = coordinator(kv.clone(), TxnConfig::default());
        coord.send(Request::put("k", "v")).await.unwrap();
        coord.commit().await.unwrap();

        let err = coord
            .send(Request::new("k", RequestBody::AdminMerge))
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::TransactionClosed));
        assert_eq!(kv.methods(), vec![Method::Put, Method::EndTransaction]);
    }

    #[tokio::test]
    async fn test_finalize_error_is_returned() {
        let kv = ScriptedKv::with_script(vec![]);
        *kv.end_error.lock() = Some(KvError::InvalidRequest("end failed".into()));
        let coord = coordinator(kv.clone(), TxnConfig::default());
        coord.send(Request::put("k", "v")).await.unwrap();

        assert!(matches!(coord.commit().await, Err(KvError::InvalidRequest(_))));
    }

    /// Holds puts until released.
    #[derive(Default)]
    struct GatedKv {
        entered: Notify,
        release: Notify,
        log: parking_lot::Mutex<Vec<Method>>,
    }

    #[async_trait]
    impl KvService for GatedKv {
        async fn send(&self, request: Request) -> Result<Response, KvError> {
            let method = request.method();
            if method == Method::Put {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.log.lock().push(method);
            Ok(Response::new(
                request.header.timestamp,
                match method {
                    Method::EndTransaction => ResponseBody::EndTransaction {
                        commit_timestamp: request.header.timestamp,
                    },
                    _ => ResponseBody::Put,
                },
            ))
        }
    }

    #[tokio::test]
    async fn test_commit_waits_for_outstanding_operations() {
        let kv = Arc::new(GatedKv::default());
        let coord = Arc::new(coordinator(kv.clone(), TxnConfig::default()));

        let put = {
            let coord = coord.clone();
            tokio::spawn(async move { coord.send(Request::put("k", Value::from("v"))).await })
        };
        kv.entered.notified().await;

        let commit = {
            let coord = coord.clone();
            tokio::spawn(async move { coord.commit().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(kv.log.lock().is_empty());
        assert!(!commit.is_finished());

        let late = coord.send(Request::put("late", "v")).await.unwrap_err();
        assert!(matches!(late, KvError::TransactionClosed));

        kv.release.notify_one();
        put.await.unwrap().unwrap();
        commit.await.unwrap().unwrap();

        assert_eq!(*kv.log.lock(), vec![Method::Put, Method::EndTransaction]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use proptest::prelude::*;

    use crate::kv::ResponseBody;
    use crate::time::HlcClock;
    use crate::txn::IsolationLevel;

    #[derive(Debug, Clone)]
    enum Outcome {
        Ok(u64),
        Intent { priority: i32, resolved: bool },
        Retry(u64),
        Aborted(i32),
    }

    fn outcome() -> impl Strategy<Value = Outcome> {
        prop_oneof![
            (0u64..10_000_000).prop_map(Outcome::Ok),
            (1i32..1_000, any::<bool>())
                .prop_map(|(priority, resolved)| Outcome::Intent { priority, resolved }),
            (0u64..10_000_000).prop_map(Outcome::Retry),
            (1i32..1_000).prop_map(Outcome::Aborted),
        ]
    }

    struct ReplayKv {
        script: parking_lot::Mutex<VecDeque<Outcome>>,
    }

    fn foreign(priority: i32) -> Transaction {
        Transaction::new(
            Key::from("x"),
            -priority,
            IsolationLevel::default(),
            &HlcClock::default(),
        )
    }

    #[async_trait]
    impl KvService for ReplayKv {
        async fn send(&self, request: Request) -> Result<Response, KvError> {
            let Some(outcome) = self.script.lock().pop_front() else {
                return Ok(Response::new(request.header.timestamp, ResponseBody::Put));
            };
            match outcome {
                Outcome::Ok(wall) => Ok(Response::new(Timestamp::new(wall, 0), ResponseBody::Put)),
                Outcome::Intent { priority, resolved } => Err(KvError::WriteIntent {
                    key: request.header.key,
                    txn: foreign(priority),
                    resolved,
                }),
                Outcome::Retry(wall) => {
                    let mut txn = request.header.txn.unwrap_or_else(|| foreign(1));
                    txn.timestamp = Timestamp::new(wall, 0);
                    Err(KvError::TransactionRetry {
                        txn,
                        reason: "scripted".into(),
                    })
                }
                Outcome::Aborted(priority) => Err(KvError::TransactionAborted {
                    txn: foreign(priority),
                }),
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn session_priority_and_timestamp_never_regress(
            script in prop::collection::vec(outcome(), 1..24),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            let sends = script.len();
            let kv = Arc::new(ReplayKv { script: parking_lot::Mutex::new(script.into()) });
            let clock = Arc::new(HlcClock::manual(1_000, Duration::from_nanos(10)).0);
            let coord = TxnCoordinator::new(kv, clock, TxnConfig::default().with_user_priority(-1));

            let observed: Vec<(i32, Timestamp)> = rt.block_on(async {
                let mut observed = Vec::new();
                for _ in 0..sends {
                    let _ = coord.send(Request::put("k", "v")).await;
                    let txn = coord.transaction().unwrap();
                    prop_assert!(txn.timestamp <= coord.timestamp());
                    observed.push((txn.priority, coord.timestamp()));
                }
                Ok(observed)
            })?;

            for pair in observed.windows(2) {
                prop_assert!(pair[1].0 >= pair[0].0, "priority regressed: {:?}", pair);
                prop_assert!(pair[1].1 >= pair[0].1, "timestamp regressed: {:?}", pair);
            }
        }
    }
}
