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

//! A ready-made handler execution context.
//!
//! [`QueuedHandler`] runs a [`Service`] on one tokio task fed by two queues:
//! a bounded queue of requests and an unbounded queue of completed
//! asynchronous calls. Draining both from the same task means a callback
//! never runs while the service is processing a request, so the service can
//! keep plain mutable state without locking it itself.

use crate::handler::{PushError, RpcHandler};
use crate::processor::{method_name, Payload};
use crate::rpc::{PooledCall, RpcError, RpcRequest};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, Instrument};

/// Default depth of a handler's request queue.
pub const DEFAULT_REQUEST_QUEUE_LEN: usize = 1024;

/// Business logic run by a [`QueuedHandler`].
pub trait Service: Send + 'static {
    /// Executes `method` (without the handler prefix).
    fn call(&mut self, method: &str, args: Payload) -> Result<Option<Payload>, RpcError>;
}

impl<F> Service for F
where
    F: FnMut(&str, Payload) -> Result<Option<Payload>, RpcError> + Send + 'static,
{
    fn call(&mut self, method: &str, args: Payload) -> Result<Option<Payload>, RpcError> {
        self(method, args)
    }
}

/// Queue settings of a [`QueuedHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Requests that may wait before pushes are refused.
    pub request_queue_len: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            request_queue_len: DEFAULT_REQUEST_QUEUE_LEN,
        }
    }
}

impl QueueConfig {
    /// Sets the request queue depth.
    #[must_use]
    pub fn with_request_queue_len(mut self, len: usize) -> Self {
        self.request_queue_len = len;
        self
    }
}

/// An [`RpcHandler`] executing a [`Service`] on a dedicated task.
pub struct QueuedHandler<S: Service> {
    name: String,
    requests: mpsc::Sender<RpcRequest>,
    callbacks: mpsc::UnboundedSender<PooledCall>,
    service: Arc<Mutex<S>>,
    capacity: usize,
}

impl<S: Service> QueuedHandler<S> {
    /// Starts `service` under `name` with the default queue settings.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(name: impl Into<String>, service: S) -> Arc<Self> {
        Self::spawn_with_config(name, service, QueueConfig::default())
    }

    /// Starts `service` under `name`.
    pub fn spawn_with_config(name: impl Into<String>, service: S, config: QueueConfig) -> Arc<Self> {
        let name = name.into();
        let capacity = config.request_queue_len.max(1);
        let (requests, request_rx) = mpsc::channel(capacity);
        let (callbacks, callback_rx) = mpsc::unbounded_channel();
        let service = Arc::new(Mutex::new(service));

        let span = tracing::info_span!("rpc_handler", handler = %name);
        tokio::spawn(run(Arc::clone(&service), request_rx, callback_rx).instrument(span));

        Arc::new(Self {
            name,
            requests,
            callbacks,
            service,
            capacity,
        })
    }

    /// Requests waiting to be executed.
    pub fn queued_requests(&self) -> usize {
        self.capacity - self.requests.capacity()
    }
}

impl<S: Service> RpcHandler for QueuedHandler<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn push_request(&self, request: RpcRequest) -> Result<(), PushError> {
        self.requests.try_send(request).map_err(|error| match error {
            mpsc::error::TrySendError::Full(request) => {
                PushError::new(request, "request queue is full")
            }
            mpsc::error::TrySendError::Closed(request) => {
                PushError::new(request, "handler has stopped")
            }
        })
    }

    /// Locks the service for the duration of the call. Calling back into the
    /// same handler from inside its own service deadlocks.
    fn call_method(
        &self,
        service_method: &str,
        args: Payload,
    ) -> Result<Option<Payload>, RpcError> {
        self.service.lock().call(method_name(service_method), args)
    }

    fn push_call_response(&self, call: PooledCall) -> Result<(), PooledCall> {
        self.callbacks.send(call).map_err(|error| error.0)
    }
}

async fn run<S: Service>(
    service: Arc<Mutex<S>>,
    mut requests: mpsc::Receiver<RpcRequest>,
    mut callbacks: mpsc::UnboundedReceiver<PooledCall>,
) {
    loop {
        tokio::select! {
            biased;
            Some(mut call) = callbacks.recv() => call.invoke_callback(),
            Some(request) = requests.recv() => execute(&service, request),
            else => break,
        }
    }
    debug!("handler stopped");
}

fn execute<S: Service>(service: &Mutex<S>, mut request: RpcRequest) {
    let method = request.method_name().to_string();
    let result = request
        .take_args()
        .and_then(|args| service.lock().call(&method, args));
    if let Err(error) = &result {
        debug!(seq = request.seq(), %method, %error, "rpc method failed");
    }
    request.complete(result);
}
