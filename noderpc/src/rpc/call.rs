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

//! Caller-side handles for locally initiated calls.
//!
//! A [`Call`] lives in a [`Pool`](crate::pool::Pool) owned by the
//! [`Client`](crate::client::Client) that issued it. While the call is
//! outstanding it sits in the client's pending table; whichever path
//! resolves it removes it from the table, records the result and delivers
//! it:
//!
//! - a blocking caller receives it through the [`CallHandle`] it holds
//! - an async caller gets it re-queued onto its own handler, which then runs
//!   the stored callback on its own execution context
//!
//! The call returns to the pool when the last owner drops it.

use crate::handler::RpcHandler;
use crate::pool::{Poolable, Pooled};
use crate::processor::Payload;
use crate::rpc::RpcError;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::warn;

/// A call borrowed from a client's pool.
pub type PooledCall = Pooled<Call>;

/// Callback run on the calling handler once a call completes.
pub type CallCallback = Box<dyn FnOnce(&mut Call) + Send>;

/// One outstanding locally initiated call.
#[derive(Default)]
pub struct Call {
    pub(crate) seq: u64,
    pub(crate) service_method: String,
    pub(crate) reply: Option<Payload>,
    pub(crate) err: Option<RpcError>,
    pub(crate) done: Option<oneshot::Sender<PooledCall>>,
    pub(crate) callback: Option<CallCallback>,
    pub(crate) caller: Option<Arc<dyn RpcHandler>>,
}

impl Poolable for Call {
    fn reset(&mut self) {
        self.seq = 0;
        self.service_method.clear();
        self.reply = None;
        self.err = None;
        self.done = None;
        self.callback = None;
        self.caller = None;
    }
}

impl Call {
    /// Sequence number assigned by the client.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The target, in `Handler.Method` form.
    pub fn service_method(&self) -> &str {
        &self.service_method
    }

    /// The reply, if the call succeeded with one.
    pub fn reply(&self) -> Option<&Payload> {
        self.reply.as_ref()
    }

    /// Moves the reply out of the call.
    pub fn take_reply(&mut self) -> Option<Payload> {
        self.reply.take()
    }

    /// The error, if the call failed.
    pub fn err(&self) -> Option<&RpcError> {
        self.err.as_ref()
    }

    /// Moves the outcome out of the call.
    pub fn take_result(&mut self) -> Result<Option<Payload>, RpcError> {
        match self.err.take() {
            Some(err) => Err(err),
            None => Ok(self.reply.take()),
        }
    }

    /// Runs the stored callback, if any. A callback runs at most once.
    pub fn invoke_callback(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(self);
        }
    }

    pub(crate) fn set_result(&mut self, result: Result<Option<Payload>, RpcError>) {
        match result {
            Ok(reply) => {
                self.err = None;
                self.reply = reply;
            }
            Err(err) => {
                self.err = Some(err);
                self.reply = None;
            }
        }
    }

    /// Attaches a single-use rendezvous and returns the receiving end.
    pub(crate) fn completion_channel(&mut self) -> CallHandle {
        let (tx, rx) = oneshot::channel();
        self.done = Some(tx);
        CallHandle { seq: self.seq, rx }
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("seq", &self.seq)
            .field("service_method", &self.service_method)
            .field("reply", &self.reply)
            .field("err", &self.err)
            .field("blocking", &self.done.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Hands a completed call to whoever waits for it.
pub(crate) fn deliver(mut call: PooledCall) {
    if let Some(done) = call.done.take() {
        // A caller that stopped waiting drops the call here.
        let _ = done.send(call);
        return;
    }
    if let Some(caller) = call.caller.take() {
        let seq = call.seq;
        if let Err(call) = caller.push_call_response(call) {
            warn!(
                seq,
                handler = caller.name(),
                service_method = call.service_method(),
                "calling handler no longer accepts callbacks"
            );
        }
    }
}

/// Receiving end of a blocking call.
#[derive(Debug)]
pub struct CallHandle {
    seq: u64,
    rx: oneshot::Receiver<PooledCall>,
}

impl CallHandle {
    /// Sequence number of the call.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Waits for the completed call.
    ///
    /// Fails with [`RpcError::Abandoned`] if the call was discarded without
    /// a result, for instance because its client was dropped.
    pub async fn wait(self) -> Result<PooledCall, RpcError> {
        let seq = self.seq;
        self.rx.await.map_err(|_| RpcError::Abandoned { seq })
    }

    /// Blocks the current thread until the call completes.
    ///
    /// Must not be called from within an asynchronous execution context.
    pub fn blocking_wait(self) -> Result<PooledCall, RpcError> {
        let seq = self.seq;
        self.rx.blocking_recv().map_err(|_| RpcError::Abandoned { seq })
    }

    /// Waits for the call and returns its outcome, releasing the call.
    pub async fn result(self) -> Result<Option<Payload>, RpcError> {
        let mut call = self.wait().await?;
        call.take_result()
    }
}
