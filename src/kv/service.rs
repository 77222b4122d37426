// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The key-value service abstraction.

use std::sync::Arc;

use async_trait::async_trait;

use super::{KvError, Request, Response};

/// Anything that executes key-value requests.
///
/// Implementations include the single-node [`LocalKv`](super::LocalKv) and the
/// transactional [`TxnCoordinator`](crate::txn::TxnCoordinator), which wraps
/// another service and is itself a service.
#[async_trait]
pub trait KvService: Send + Sync {
    /// Executes one request.
    async fn send(&self, request: Request) -> Result<Response, KvError>;
}

#[async_trait]
impl<T: KvService + ?Sized> KvService for Arc<T> {
    async fn send(&self, request: Request) -> Result<Response, KvError> {
        (**self).send(request).await
    }
}
