// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Key-value protocol: requests, replies, the service trait and a single-node
//! implementation.
//!
//! Every component that executes requests implements [`KvService`], so a
//! transactional session can wrap a [`LocalKv`] (or any other service) and be
//! used wherever a service is expected.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use rangekv::kv::{Db, LocalKv};
//! use rangekv::storage::{MemMvccStore, Value};
//! use rangekv::time::HlcClock;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), rangekv::kv::KvError> {
//! let clock = Arc::new(HlcClock::default());
//! let kv = LocalKv::new(Arc::new(MemMvccStore::new()), clock.clone())?;
//! let db = Db::new(Arc::new(kv), clock);
//!
//! db.put("greeting", "hello").await?;
//! assert_eq!(db.get("greeting").await?, Some(Value::from("hello")));
//! # Ok(())
//! # }
//! ```

mod api;
mod db;
mod error;
mod local;
mod service;
mod ts_cache;

pub use api::{
    ClientCmdId, Method, Request, RequestBody, RequestHeader, Response, ResponseBody,
};
pub use db::Db;
pub use error::{Conflict, KvError};
pub use local::LocalKv;
pub use service::KvService;
