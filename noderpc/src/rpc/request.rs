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

//! Pooled inbound requests and their completions.
//!
//! An [`RpcRequest`] is created either by a connection agent decoding a frame
//! or by one of the server's local-call helpers. Whoever holds it owns it
//! exclusively; handing it to a handler moves it. The only way to answer it
//! is [`RpcRequest::complete`], which consumes the request, so a request can
//! be answered at most once. A request that is dropped while a reply is
//! still owed is completed with [`RpcError::Abandoned`], so the caller always
//! hears back exactly once.

use crate::pool::{Pool, PoolStats, Poolable, Pooled};
use crate::processor::{method_name, split_service_method, Payload, ProcessorRef, RequestData};
use crate::rpc::{deliver, PendingCalls, RpcError};
use crate::server::PendingResponse;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where the outcome of a request goes.
pub(crate) enum Completion {
    /// Written back as a response frame on the connection it arrived on.
    Remote(PendingResponse),
    /// Recorded in a local call and delivered to its initiator.
    Local(LocalCompletion),
}

impl Completion {
    fn complete(self, result: Result<Option<Payload>, RpcError>) {
        match self {
            Completion::Remote(response) => response.send(result),
            Completion::Local(local) => local.complete(result),
        }
    }
}

/// Completion of a call issued through the server's local-call helpers.
pub(crate) struct LocalCompletion {
    pending: Arc<PendingCalls>,
    seq: u64,
}

impl LocalCompletion {
    pub(crate) fn new(pending: Arc<PendingCalls>, seq: u64) -> Self {
        Self { pending, seq }
    }

    fn complete(self, result: Result<Option<Payload>, RpcError>) {
        match self.pending.remove_pending(self.seq) {
            Some(mut call) => {
                call.set_result(result);
                deliver(call);
            }
            None => {
                let error = RpcError::Correlation { seq: self.seq };
                warn!(seq = self.seq, %error, "discarding late completion");
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct RequestBody {
    processor: Option<ProcessorRef>,
    data: RequestData,
    completion: Option<Completion>,
    local_args: Option<Payload>,
    local: bool,
}

impl Poolable for RequestBody {
    fn reset(&mut self) {
        self.processor = None;
        self.data.clear();
        self.completion = None;
        self.local_args = None;
        self.local = false;
    }
}

/// Pool of request bodies shared by every agent of a server.
#[derive(Clone, Debug, Default)]
pub struct RequestPool {
    pool: Pool<RequestBody>,
}

impl RequestPool {
    /// Creates a pool keeping at most `max_idle` bodies between uses.
    pub fn new(max_idle: usize) -> Self {
        Self {
            pool: Pool::new(max_idle),
        }
    }

    /// An empty request about to be filled from a frame decoded by `processor`.
    pub(crate) fn remote(&self, processor: ProcessorRef) -> RpcRequest {
        let mut body = self.pool.acquire();
        body.processor = Some(processor);
        RpcRequest { body }
    }

    /// A request carrying in-memory arguments, never serialized.
    pub(crate) fn local(&self, processor: ProcessorRef, data: RequestData, args: Payload) -> RpcRequest {
        let mut body = self.pool.acquire();
        body.processor = Some(processor);
        body.data = data;
        body.local_args = Some(args);
        body.local = true;
        RpcRequest { body }
    }

    /// Requests handed out and not yet released.
    pub fn outstanding(&self) -> u64 {
        self.pool.outstanding()
    }

    /// Pool counters.
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

/// A request travelling from the network, or a local caller, to a handler.
pub struct RpcRequest {
    body: Pooled<RequestBody>,
}

impl RpcRequest {
    /// Sequence number chosen by the caller.
    pub fn seq(&self) -> u64 {
        self.body.data.seq
    }

    /// Target in `Handler.Method` form.
    pub fn service_method(&self) -> &str {
        &self.body.data.service_method
    }

    /// The handler part of the service method, if well formed.
    pub fn handler_name(&self) -> Option<&str> {
        split_service_method(self.service_method()).map(|(handler, _)| handler)
    }

    /// The method part of the service method.
    pub fn method_name(&self) -> &str {
        method_name(self.service_method())
    }

    /// Returns `true` if the caller asked for no response.
    pub fn is_no_reply(&self) -> bool {
        self.body.data.no_reply
    }

    /// Returns `true` if a result is still owed to someone.
    pub fn expects_reply(&self) -> bool {
        self.body.completion.is_some()
    }

    /// Returns `true` for requests issued in-process.
    pub fn is_local(&self) -> bool {
        self.body.local
    }

    /// The decoded envelope.
    pub fn data(&self) -> &RequestData {
        &self.body.data
    }

    /// The processor the request was encoded with, or selected for it.
    pub fn processor(&self) -> Option<&ProcessorRef> {
        self.body.processor.as_ref()
    }

    /// Moves the arguments out of the request.
    ///
    /// Remote arguments are decoded with the request's processor; local ones
    /// are handed over as they were given. Can be called once.
    pub fn take_args(&mut self) -> Result<Payload, RpcError> {
        if self.body.local {
            return self.body.local_args.take().ok_or_else(|| RpcError::Decode {
                reason: "arguments were already taken".to_string(),
            });
        }
        let args = std::mem::take(&mut self.body.data.args);
        let processor = self.body.processor.as_ref().ok_or_else(|| RpcError::Decode {
            reason: "request has no processor".to_string(),
        })?;
        Ok(processor.unmarshal(&args)?)
    }

    /// Answers the request. Without a pending completion (`no_reply`, or a
    /// request already answered) the result is dropped.
    pub fn complete(mut self, result: Result<Option<Payload>, RpcError>) {
        match self.body.completion.take() {
            Some(completion) => completion.complete(result),
            None => {
                if let Err(error) = result {
                    debug!(
                        seq = self.seq(),
                        service_method = self.service_method(),
                        %error,
                        "no reply expected, dropping error"
                    );
                }
            }
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut RequestData {
        &mut self.body.data
    }

    pub(crate) fn set_completion(&mut self, completion: Completion) {
        self.body.completion = Some(completion);
    }

    pub(crate) fn take_completion(&mut self) -> Option<Completion> {
        self.body.completion.take()
    }
}

impl Drop for RpcRequest {
    fn drop(&mut self) {
        if let Some(completion) = self.body.completion.take() {
            let seq = self.seq();
            warn!(
                seq,
                service_method = self.service_method(),
                "request dropped without a result"
            );
            completion.complete(Err(RpcError::Abandoned { seq }));
        }
    }
}

impl fmt::Debug for RpcRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcRequest")
            .field("seq", &self.seq())
            .field("service_method", &self.service_method())
            .field("no_reply", &self.is_no_reply())
            .field("local", &self.is_local())
            .field("expects_reply", &self.expects_reply())
            .finish()
    }
}
