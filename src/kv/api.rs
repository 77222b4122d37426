// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Request and response types exchanged with a [`KvService`](super::KvService).

use crate::storage::{Key, KeyValue, RangeDescriptor, Value, WriteBatch};
use crate::time::Timestamp;
use crate::txn::Transaction;

/// The operations a key-value service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Increment,
    Delete,
    Scan,
    EndTransaction,
    Batch,
    AdminSplit,
    AdminMerge,
    RangeLookup,
}

impl Method {
    /// Returns true if the method may run inside a transactional session.
    ///
    /// Finalization travels through the session's own commit/abort path, and
    /// administrative and batch methods are never transactional.
    pub fn is_transactional(&self) -> bool {
        matches!(
            self,
            Method::Get | Method::Put | Method::Increment | Method::Delete | Method::Scan
        )
    }

    /// Returns true if the method never mutates data.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Method::Get | Method::Scan | Method::RangeLookup)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Method::Get => "Get",
            Method::Put => "Put",
            Method::Increment => "Increment",
            Method::Delete => "Delete",
            Method::Scan => "Scan",
            Method::EndTransaction => "EndTransaction",
            Method::Batch => "Batch",
            Method::AdminSplit => "AdminSplit",
            Method::AdminMerge => "AdminMerge",
            Method::RangeLookup => "RangeLookup",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Client-generated identifier that lets a service recognise a replayed mutation.
///
/// A fresh identifier is generated for every attempt of a mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientCmdId {
    pub wall_time: u64,
    pub random: i64,
}

impl ClientCmdId {
    /// Creates an identifier from the current wall time plus a random component.
    pub fn new(now: Timestamp) -> Self {
        Self {
            wall_time: now.wall_time(),
            random: rand::random(),
        }
    }
}

/// Fields common to every request.
#[derive(Debug, Clone, Default)]
pub struct RequestHeader {
    /// The key the operation targets (start key for scans).
    pub key: Key,
    pub user: String,
    /// Timestamp to execute at. Zero lets the service pick one.
    pub timestamp: Timestamp,
    /// The transaction the request belongs to, if any.
    pub txn: Option<Transaction>,
    pub cmd_id: Option<ClientCmdId>,
}

/// Method-specific request arguments.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Get,
    Put { value: Value },
    Increment { delta: i64 },
    Delete,
    /// Scans `[header.key, end_key)`. A `max_results` of zero means unlimited.
    Scan { end_key: Key, max_results: usize },
    EndTransaction { commit: bool },
    Batch { batch: WriteBatch },
    /// Splits the range containing `split_key` at `split_key`.
    AdminSplit { split_key: Key },
    /// Merges the range containing `header.key` with its right neighbour.
    AdminMerge,
    RangeLookup,
}

/// A single operation sent to a key-value service.
#[derive(Debug, Clone)]
pub struct Request {
    pub header: RequestHeader,
    pub body: RequestBody,
}

impl Request {
    /// Creates a request with a default header targeting `key`.
    pub fn new(key: impl Into<Key>, body: RequestBody) -> Self {
        Self {
            header: RequestHeader {
                key: key.into(),
                ..RequestHeader::default()
            },
            body,
        }
    }

    pub fn get(key: impl Into<Key>) -> Self {
        Self::new(key, RequestBody::Get)
    }

    pub fn put(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Self::new(
            key,
            RequestBody::Put {
                value: value.into(),
            },
        )
    }

    pub fn increment(key: impl Into<Key>, delta: i64) -> Self {
        Self::new(key, RequestBody::Increment { delta })
    }

    pub fn delete(key: impl Into<Key>) -> Self {
        Self::new(key, RequestBody::Delete)
    }

    pub fn scan(start: impl Into<Key>, end: impl Into<Key>, max_results: usize) -> Self {
        Self::new(
            start,
            RequestBody::Scan {
                end_key: end.into(),
                max_results,
            },
        )
    }

    /// Returns the method this request invokes.
    pub fn method(&self) -> Method {
        match self.body {
            RequestBody::Get => Method::Get,
            RequestBody::Put { .. } => Method::Put,
            RequestBody::Increment { .. } => Method::Increment,
            RequestBody::Delete => Method::Delete,
            RequestBody::Scan { .. } => Method::Scan,
            RequestBody::EndTransaction { .. } => Method::EndTransaction,
            RequestBody::Batch { .. } => Method::Batch,
            RequestBody::AdminSplit { .. } => Method::AdminSplit,
            RequestBody::AdminMerge => Method::AdminMerge,
            RequestBody::RangeLookup => Method::RangeLookup,
        }
    }
}

/// Method-specific reply payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Get { value: Option<Value> },
    Put,
    Increment { new_value: i64 },
    Delete,
    Scan { rows: Vec<KeyValue> },
    EndTransaction { commit_timestamp: Timestamp },
    Batch,
    AdminSplit {
        left: RangeDescriptor,
        right: RangeDescriptor,
    },
    AdminMerge { merged: RangeDescriptor },
    RangeLookup { desc: RangeDescriptor },
}

/// A successful reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The timestamp the operation executed at.
    pub timestamp: Timestamp,
    pub body: ResponseBody,
}

impl Response {
    pub fn new(timestamp: Timestamp, body: ResponseBody) -> Self {
        Self { timestamp, body }
    }
}
