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

//! The RPC client.
//!
//! A [`Client`] owns a pending-call table and a pool of [`Call`]s. A client
//! made with [`Client::new`] has no connection; the server's local-call
//! helpers use it to correlate calls to handlers in the same process. A
//! client made with [`Client::connect`] also owns one connection to a remote
//! server and a task reading its responses.
//!
//! Every outstanding call ends exactly once, through one of:
//!
//! - a response (or local completion) with its sequence number
//! - the expiry sweep, once the call is older than `call_timeout`
//! - the connection closing, which fails every call still pending
//!
//! Whichever comes second finds the sequence number gone and is logged as a
//! correlation error.

use crate::client::ClientConfig;
use crate::error::NoderpcError;
use crate::pool::{BufferPool, Pool};
use crate::processor::{Payload, ProcessorRef, ProcessorRegistry, ResponseData};
use crate::rpc::{deliver, Call, CallHandle, PendingCalls, PooledCall, RpcError};
use crate::serialization::framing::FrameReader;
use crate::transport::{connection, ConnWriter, TcpTransport, Transport, TransportError};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn, Instrument};

struct Remote {
    writer: ConnWriter,
    processors: Arc<ProcessorRegistry>,
}

/// Issues calls and correlates their outcomes.
pub struct Client {
    config: ClientConfig,
    pending: Arc<PendingCalls>,
    calls: Pool<Call>,
    remote: Option<Remote>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Client {
    /// Creates a client without a connection.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            pending: Arc::new(PendingCalls::new()),
            calls: Pool::new(config.max_idle_calls),
            remote: None,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Connects to a server over TCP.
    pub async fn connect(
        addr: impl Into<String>,
        processors: Arc<ProcessorRegistry>,
        config: ClientConfig,
    ) -> Result<Self, NoderpcError> {
        config
            .frame
            .validate()
            .map_err(|e| NoderpcError::configuration(e.to_string()))?;
        let transport = TcpTransport::connect(addr).await?;
        Ok(Self::with_transport(transport, processors, config))
    }

    /// Uses an established transport as the client's connection.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_transport<T: Transport>(
        transport: T,
        processors: Arc<ProcessorRegistry>,
        config: ClientConfig,
    ) -> Self {
        let mut client = Self::new(config);
        let peer = transport.metadata().peer_label();
        let (reader, writer) = connection::open(
            transport,
            config.frame,
            config.pending_write_num,
            BufferPool::default(),
        );

        let span = tracing::info_span!("rpc_client", %peer);
        let task = tokio::spawn(
            response_loop(
                reader,
                writer.clone(),
                Arc::clone(&processors),
                Arc::clone(&client.pending),
            )
            .instrument(span),
        );
        client.tasks.get_mut().push(task);
        client.remote = Some(Remote { writer, processors });
        client
    }

    /// The client settings.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns `true` while the client has an open connection.
    pub fn is_connected(&self) -> bool {
        self.remote
            .as_ref()
            .is_some_and(|remote| !remote.writer.is_closed())
    }

    /// Address of the server, for connected clients.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote.as_ref().and_then(|remote| remote.writer.remote_addr())
    }

    /// Next sequence number; never 0.
    pub fn generate_seq(&self) -> u64 {
        self.pending.generate_seq()
    }

    /// A blank call from the client's pool.
    pub fn make_call(&self) -> PooledCall {
        self.calls.acquire()
    }

    /// Registers `call` as outstanding. Gives it back if its sequence number
    /// is already pending.
    pub fn add_pending(&self, call: PooledCall) -> Result<(), PooledCall> {
        self.pending.add_pending(call)
    }

    /// Takes the call registered under `seq` out of the pending table.
    pub fn remove_pending(&self, seq: u64) -> Option<PooledCall> {
        self.pending.remove_pending(seq)
    }

    /// Number of outstanding calls.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The pending-call table.
    pub fn pending(&self) -> Arc<PendingCalls> {
        Arc::clone(&self.pending)
    }

    /// Calls acquired from the pool and not yet released.
    pub fn outstanding_calls(&self) -> u64 {
        self.calls.outstanding()
    }

    /// Sends a call to the connected server and returns the handle to wait on.
    ///
    /// `processor` defaults to the first registered processor accepting
    /// `args`. A `no_reply` call completes once its frame is queued. Calls
    /// on a client without a connection fail with
    /// [`RpcError::ConnectionClosed`].
    pub fn go(
        &self,
        processor: Option<ProcessorRef>,
        no_reply: bool,
        service_method: &str,
        args: Payload,
    ) -> CallHandle {
        let mut call = self.make_call();
        call.seq = self.generate_seq();
        call.service_method.push_str(service_method);
        let handle = call.completion_channel();
        let seq = call.seq;

        let Some(remote) = self.remote.as_ref().filter(|remote| !remote.writer.is_closed()) else {
            fail(call, RpcError::ConnectionClosed);
            return handle;
        };
        let processor =
            processor.unwrap_or_else(|| remote.processors.select_by_value(&args).clone());
        let body = match encode_request(&processor, seq, service_method, no_reply, &args) {
            Ok(body) => body,
            Err(error) => {
                fail(call, error);
                return handle;
            }
        };

        if no_reply {
            let result = remote
                .writer
                .write_msg(&[processor.id()], &body)
                .map(|()| None)
                .map_err(write_error);
            call.set_result(result);
            deliver(call);
            return handle;
        }

        if let Err(call) = self.pending.add_pending(call) {
            fail(call, RpcError::Correlation { seq });
            return handle;
        }
        if let Err(e) = remote.writer.write_msg(&[processor.id()], &body) {
            if let Some(call) = self.pending.remove_pending(seq) {
                fail(call, write_error(e));
            }
        }
        trace!(seq, service_method, processor = processor.name(), "call sent");
        handle
    }

    /// Sends a call and waits for its outcome, at most `call_timeout`.
    pub async fn call(&self, service_method: &str, args: Payload) -> Result<Option<Payload>, RpcError> {
        let handle = self.go(None, false, service_method, args);
        let Some(timeout) = self.config.call_timeout else {
            return handle.result().await;
        };
        let seq = handle.seq();
        match tokio::time::timeout(timeout, handle.result()).await {
            Ok(result) => result,
            Err(_) => {
                self.pending.remove_pending(seq);
                Err(RpcError::Timeout {
                    seq,
                    elapsed: timeout,
                })
            }
        }
    }

    /// Fails every call pending longer than `call_timeout` with
    /// [`RpcError::Timeout`] and returns how many there were.
    pub fn expire_calls(&self) -> usize {
        match self.config.call_timeout {
            Some(ttl) => expire_pending(&self.pending, ttl),
            None => 0,
        }
    }

    /// Runs [`expire_calls`](Self::expire_calls) every `expiry_interval`
    /// until the client is dropped. Does nothing when `call_timeout` is
    /// `None`.
    pub fn spawn_expiry_task(&self) {
        let Some(ttl) = self.config.call_timeout else {
            return;
        };
        let pending = Arc::downgrade(&self.pending);
        let task = tokio::spawn(expiry_loop(pending, ttl, self.config.expiry_interval));
        self.tasks.lock().push(task);
    }

    /// Closes the connection. Pending calls fail with
    /// [`RpcError::ConnectionClosed`].
    pub fn close(&self) {
        if let Some(remote) = &self.remote {
            remote.writer.close();
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
        for call in self.pending.drain() {
            fail(call, RpcError::ConnectionClosed);
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("remote", &self.remote_addr())
            .field("pending", &self.pending.len())
            .field("calls", &self.calls)
            .finish()
    }
}

fn fail(mut call: PooledCall, error: RpcError) {
    call.set_result(Err(error));
    deliver(call);
}

fn write_error(error: TransportError) -> RpcError {
    match error {
        TransportError::FrameTooShort { .. } | TransportError::FrameTooLarge { .. } => {
            RpcError::Encode {
                reason: error.to_string(),
            }
        }
        _ => RpcError::ConnectionClosed,
    }
}

fn encode_request(
    processor: &ProcessorRef,
    seq: u64,
    service_method: &str,
    no_reply: bool,
    args: &Payload,
) -> Result<Vec<u8>, RpcError> {
    let args = processor.marshal(args)?;
    let request = processor.make_rpc_request(seq, service_method, no_reply, args);
    Ok(processor.encode_request(&request)?)
}

fn expire_pending(pending: &PendingCalls, ttl: Duration) -> usize {
    let expired = pending.expire(ttl);
    let count = expired.len();
    for (call, elapsed) in expired {
        let seq = call.seq();
        warn!(seq, service_method = call.service_method(), ?elapsed, "call timed out");
        fail(call, RpcError::Timeout { seq, elapsed });
    }
    count
}

async fn expiry_loop(pending: Weak<PendingCalls>, ttl: Duration, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(pending) = pending.upgrade() else {
            break;
        };
        let expired = expire_pending(&pending, ttl);
        if expired > 0 {
            debug!(expired, "expired pending calls");
        }
    }
}

async fn response_loop<R>(
    mut reader: FrameReader<R>,
    writer: ConnWriter,
    processors: Arc<ProcessorRegistry>,
    pending: Arc<PendingCalls>,
) where
    R: AsyncRead + Unpin + Send,
{
    let reason = loop {
        let frame = tokio::select! {
            frame = reader.read_msg() => frame,
            _ = writer.closed() => break NoderpcError::Transport(TransportError::Closed),
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => break NoderpcError::Transport(e),
        };
        if let Err(e) = handle_response(&processors, &pending, &frame) {
            break NoderpcError::Rpc(e);
        }
    };

    writer.close();
    let failed = pending.drain();
    info!(
        %reason,
        recoverable = reason.is_recoverable(),
        failed = failed.len(),
        "client connection closed"
    );
    for call in failed {
        fail(call, RpcError::ConnectionClosed);
    }
}

/// Resolves the call a response frame answers. An error means the
/// connection can no longer be trusted.
fn handle_response(
    processors: &ProcessorRegistry,
    pending: &PendingCalls,
    frame: &[u8],
) -> Result<(), RpcError> {
    let Some((&id, envelope)) = frame.split_first() else {
        return Err(RpcError::Framing {
            reason: "empty frame".to_string(),
        });
    };
    let processor = processors
        .lookup(id)
        .ok_or(RpcError::UnknownProcessor { processor: id })?;

    let mut response = ResponseData::default();
    let decoded = processor.decode_response(envelope, &mut response);
    let seq = response.seq();
    let result = match decoded {
        Err(e) if seq == 0 => return Err(RpcError::from(e)),
        Err(e) => Err(RpcError::from(e)),
        Ok(()) => match response.error().and_then(RpcError::from_wire) {
            Some(error) => Err(error),
            None if response.reply().is_empty() => Ok(None),
            None => processor
                .unmarshal(response.reply())
                .map(Some)
                .map_err(RpcError::from),
        },
    };

    match pending.remove_pending(seq) {
        Some(mut call) => {
            call.set_result(result);
            deliver(call);
        }
        None => {
            let error = RpcError::Correlation { seq };
            warn!(seq, processor = processor.name(), %error, "discarding response");
        }
    }
    Ok(())
}
