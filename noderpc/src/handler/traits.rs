//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Handler-facing traits.

use crate::processor::Payload;
use crate::rpc::{PooledCall, RpcError, RpcRequest};
use std::fmt;
use std::sync::Arc;

/// A named business-logic execution context.
///
/// The runtime only ever hands work over; it never runs handler code on its
/// own tasks. Implementations decide where and when requests execute, and
/// must not process two requests of the same handler concurrently.
pub trait RpcHandler: Send + Sync + 'static {
    /// Name used in the `Handler` part of `Handler.Method`.
    fn name(&self) -> &str;

    /// Queues a request for execution without blocking.
    ///
    /// On success the handler owns the request and must eventually call
    /// [`RpcRequest::complete`] (or drop it). On failure the request is
    /// handed back inside the error.
    fn push_request(&self, request: RpcRequest) -> Result<(), PushError>;

    /// Runs a method synchronously on the calling thread.
    fn call_method(&self, service_method: &str, args: Payload)
        -> Result<Option<Payload>, RpcError>;

    /// Queues a completed asynchronous call whose callback must run on this
    /// handler. Handlers that never issue asynchronous calls can keep the
    /// default, which refuses.
    fn push_call_response(&self, call: PooledCall) -> Result<(), PooledCall> {
        Err(call)
    }
}

/// Resolves handler names.
pub trait HandlerFinder: Send + Sync + 'static {
    /// The handler registered as `name`.
    fn find_rpc_handler(&self, name: &str) -> Option<Arc<dyn RpcHandler>>;
}

/// A request a handler refused to queue.
pub struct PushError {
    request: RpcRequest,
    reason: String,
}

impl PushError {
    /// Refuses `request` for `reason`.
    pub fn new(request: RpcRequest, reason: impl Into<String>) -> Self {
        Self {
            request,
            reason: reason.into(),
        }
    }

    /// Why the handler refused.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Takes the refused request back.
    pub fn into_request(self) -> RpcRequest {
        self.request
    }

    /// Splits the error into the request and the reason.
    pub fn into_parts(self) -> (RpcRequest, String) {
        (self.request, self.reason)
    }
}

impl fmt::Debug for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushError")
            .field("seq", &self.request.seq())
            .field("reason", &self.reason)
            .finish()
    }
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "request {} for {} refused: {}",
            self.request.seq(),
            self.request.service_method(),
            self.reason
        )
    }
}

impl std::error::Error for PushError {}
