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

//! The RPC server.
//!
//! A [`Server`] ties together the processor registry, the handler finder and
//! the pools shared by every connection. [`Server::start`] binds a TCP
//! listener and runs one [`Agent`] per accepted connection; the three
//! `call_*` methods let code in the same process reach handlers without
//! going through the network.

use crate::client::Client;
use crate::error::NoderpcError;
use crate::handler::{HandlerFinder, RpcHandler};
use crate::pool::BufferPool;
use crate::processor::{Payload, ProcessorRef, ProcessorRegistry};
use crate::rpc::{
    deliver, CallCallback, CallHandle, Completion, LocalCompletion, PooledCall, RequestPool,
    RpcError, RpcRequest,
};
use crate::server::agent::Agent;
use crate::server::config::ServerConfig;
use crate::transport::{connection, TcpTransport, Transport, TransportError};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::ReadHalf;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn, Instrument};

/// Pause after an accept failure that will not clear on its own.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// An RPC server: shared state for agents plus the local-call entry points.
///
/// Cloning is cheap; clones share registries and pools.
#[derive(Clone)]
pub struct Server {
    config: ServerConfig,
    processors: Arc<ProcessorRegistry>,
    finder: Arc<dyn HandlerFinder>,
    requests: RequestPool,
    buffers: BufferPool,
}

impl Server {
    /// Creates a server. Nothing is bound until [`start`](Self::start).
    pub fn new(
        config: ServerConfig,
        processors: Arc<ProcessorRegistry>,
        finder: Arc<dyn HandlerFinder>,
    ) -> Self {
        let requests = RequestPool::new(config.max_idle_requests);
        let buffers = BufferPool::new(config.max_idle_requests);
        Self {
            config,
            processors,
            finder,
            requests,
            buffers,
        }
    }

    /// The server settings.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The processor registry shared by every agent.
    pub fn processors(&self) -> &Arc<ProcessorRegistry> {
        &self.processors
    }

    /// The request pool shared by every agent.
    pub fn requests(&self) -> &RequestPool {
        &self.requests
    }

    /// Binds the listener and starts accepting connections.
    ///
    /// Only the port of `listen_addr` is used; the server listens on every
    /// interface. Connections beyond `max_conn_num` are closed as soon as
    /// they are accepted.
    pub async fn start(&self) -> Result<ServerHandle, NoderpcError> {
        self.config
            .validate()
            .map_err(|e| NoderpcError::configuration(e.to_string()))?;
        let address = self
            .config
            .listen_port_addr()
            .map_err(|e| NoderpcError::configuration(e.to_string()))?;

        let listener = TcpTransport::bind(address).await?;
        let local_addr = listener.local_addr().map_err(TransportError::from)?;
        let limit = Arc::new(Semaphore::new(self.config.max_conn_num));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let span = tracing::info_span!("rpc_server", %local_addr);
        let task = tokio::spawn(
            accept_loop(self.clone(), listener, Arc::clone(&limit), shutdown_rx).instrument(span),
        );
        info!(%local_addr, max_conn_num = self.config.max_conn_num, "rpc server started");

        Ok(ServerHandle {
            local_addr,
            limit,
            max_conn_num: self.config.max_conn_num,
            shutdown,
            task,
        })
    }

    /// Opens `transport` and builds the agent that will serve it.
    pub fn new_agent<T: Transport>(&self, transport: T) -> Agent<ReadHalf<T>> {
        let (reader, writer) = connection::open(
            transport,
            self.config.frame,
            self.config.pending_write_num,
            self.buffers.clone(),
        );
        Agent::new(
            reader,
            writer,
            Arc::clone(&self.processors),
            Arc::clone(&self.finder),
            self.requests.clone(),
        )
    }

    /// Calls a handler in this process directly, on the calling thread.
    ///
    /// No framing and no queueing: the handler's
    /// [`call_method`](RpcHandler::call_method) runs right away.
    pub fn call_local_handler(
        &self,
        handler_name: &str,
        service_method: &str,
        args: Payload,
    ) -> Result<Option<Payload>, RpcError> {
        let handler = self.find_handler(handler_name, service_method)?;
        handler.call_method(service_method, args)
    }

    /// Queues a call to a handler in this process and returns the handle to
    /// wait on.
    ///
    /// `args` travel in memory; `processor` only labels the request and is
    /// picked from the shape of `args` when not given. The call is
    /// correlated through `client`'s pending table. A `no_reply` call
    /// completes as soon as the handler accepted it.
    pub fn call_remote_blocking(
        &self,
        processor: Option<ProcessorRef>,
        client: &Client,
        no_reply: bool,
        handler_name: &str,
        service_method: &str,
        args: Payload,
    ) -> CallHandle {
        let mut call = client.make_call();
        call.seq = client.generate_seq();
        call.service_method.push_str(service_method);
        let handle = call.completion_channel();

        let handler = match self.find_handler(handler_name, service_method) {
            Ok(handler) => handler,
            Err(error) => {
                fail(call, error);
                return handle;
            }
        };

        let seq = call.seq;
        let mut request = self.local_request(processor, seq, no_reply, service_method, args);
        if no_reply {
            let result = push(handler.as_ref(), request).map(|()| None);
            call.set_result(result);
            deliver(call);
            return handle;
        }

        if let Err(call) = client.add_pending(call) {
            fail(call, RpcError::Correlation { seq });
            return handle;
        }
        request.set_completion(Completion::Local(LocalCompletion::new(client.pending(), seq)));
        if let Err(error) = push(handler.as_ref(), request) {
            debug!(seq, service_method, %error, "local call refused");
        }
        handle
    }

    /// Queues a call to a handler in this process; `callback` later runs on
    /// `caller`'s own execution context with the completed call.
    ///
    /// Returns an error, and never runs `callback`, when the target handler
    /// does not exist or refuses the request. `no_reply` calls never run
    /// `callback`.
    #[allow(clippy::too_many_arguments)]
    pub fn call_remote_async(
        &self,
        client: &Client,
        caller: Arc<dyn RpcHandler>,
        no_reply: bool,
        handler_name: &str,
        service_method: &str,
        args: Payload,
        callback: CallCallback,
    ) -> Result<(), RpcError> {
        let handler = self.find_handler(handler_name, service_method)?;
        let seq = client.generate_seq();
        let mut request = self.local_request(None, seq, no_reply, service_method, args);
        if no_reply {
            return push(handler.as_ref(), request);
        }

        let mut call = client.make_call();
        call.seq = seq;
        call.service_method.push_str(service_method);
        call.callback = Some(callback);
        call.caller = Some(caller);
        if client.add_pending(call).is_err() {
            return Err(RpcError::Correlation { seq });
        }
        request.set_completion(Completion::Local(LocalCompletion::new(client.pending(), seq)));

        handler.push_request(request).map_err(|refused| {
            let (mut request, reason) = refused.into_parts();
            request.take_completion();
            client.remove_pending(seq);
            RpcError::Dispatch {
                handler: handler.name().to_string(),
                reason,
            }
        })
    }

    fn find_handler(
        &self,
        handler_name: &str,
        service_method: &str,
    ) -> Result<Arc<dyn RpcHandler>, RpcError> {
        self.finder.find_rpc_handler(handler_name).ok_or_else(|| {
            let error = RpcError::HandlerNotFound {
                service_method: service_method.to_string(),
            };
            error!(handler = handler_name, %error, "local call to unknown handler");
            error
        })
    }

    fn local_request(
        &self,
        processor: Option<ProcessorRef>,
        seq: u64,
        no_reply: bool,
        service_method: &str,
        args: Payload,
    ) -> RpcRequest {
        let processor =
            processor.unwrap_or_else(|| self.processors.select_by_value(&args).clone());
        let data = processor.make_rpc_request(seq, service_method, no_reply, Bytes::new());
        self.requests.local(processor, data, args)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("processors", &self.processors.len())
            .field("requests", &self.requests)
            .finish()
    }
}

/// Hands `request` to `handler`, completing it with a dispatch error when
/// the handler refuses.
fn push(handler: &dyn RpcHandler, request: RpcRequest) -> Result<(), RpcError> {
    handler.push_request(request).map_err(|refused| {
        let (request, reason) = refused.into_parts();
        let error = RpcError::Dispatch {
            handler: handler.name().to_string(),
            reason,
        };
        request.complete(Err(error.clone()));
        error
    })
}

fn fail(mut call: PooledCall, error: RpcError) {
    call.set_result(Err(error));
    deliver(call);
}

/// Handle to a running server.
///
/// Dropping the handle stops the server like [`shutdown`](Self::shutdown)
/// does, without waiting for it.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    limit: Arc<Semaphore>,
    max_conn_num: usize,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections currently being served.
    pub fn connection_count(&self) -> usize {
        self.max_conn_num - self.limit.available_permits()
    }

    /// Stops accepting, closes every connection and waits for the server
    /// task to finish.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "server task did not stop cleanly");
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Pause before accepting again after `error`; `None` retries at once.
///
/// Failures like descriptor exhaustion repeat immediately, so they are
/// waited out rather than retried in a tight loop.
fn accept_backoff(error: &TransportError) -> Option<Duration> {
    if error.is_recoverable() {
        None
    } else {
        Some(ACCEPT_BACKOFF)
    }
}

async fn accept_loop(
    server: Server,
    listener: TcpListener,
    limit: Arc<Semaphore>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut agents = JoinSet::new();
    loop {
        let accepted = tokio::select! {
            accepted = TcpTransport::accept(&listener) => accepted,
            _ = shutdown_requested(&mut shutdown) => break,
            Some(_) = agents.join_next(), if !agents.is_empty() => continue,
        };
        let (transport, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, recoverable = e.is_recoverable(), "accept failed");
                if let Some(pause) = accept_backoff(&e) {
                    tokio::select! {
                        _ = tokio::time::sleep(pause) => {}
                        _ = shutdown_requested(&mut shutdown) => break,
                    }
                }
                continue;
            }
        };

        let Ok(permit) = Arc::clone(&limit).try_acquire_owned() else {
            let error = TransportError::TooManyConnections {
                limit: server.config.max_conn_num,
            };
            warn!(%peer, %error, "rejecting connection");
            drop(transport);
            continue;
        };

        let agent = server.new_agent(transport);
        let span = tracing::info_span!("rpc_agent", %peer);
        agents.spawn(
            async move {
                let _permit = permit;
                agent.run().await;
            }
            .instrument(span),
        );
    }

    info!(connections = agents.len(), "rpc server stopping");
    agents.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_accept_backoff_only_for_lasting_failures() {
        let interrupted = TransportError::Io {
            source: io::Error::from(io::ErrorKind::Interrupted),
        };
        assert_eq!(accept_backoff(&interrupted), None);

        let exhausted = TransportError::Io {
            source: io::Error::other("too many open files"),
        };
        assert_eq!(accept_backoff(&exhausted), Some(ACCEPT_BACKOFF));

        let refused = TransportError::TooManyConnections { limit: 4 };
        assert_eq!(accept_backoff(&refused), None);
    }
}
