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

//! The per-connection read and dispatch loop.
//!
//! ```text
//!            ┌──────────┐ frame  ┌──────────┐ request ┌─────────────┐
//! peer ────► │ Reading  ├───────►│ Decoding ├────────►│ Dispatching │──► handler queue
//!            └────▲─────┘        └────┬─────┘         └──────┬──────┘
//!                 │   per-call error  │     routing error    │
//!                 └───────────────────┴──────────────────────┘
//! ```
//!
//! An agent owns the read half of one connection and loops until it reaches
//! Closed: a transport error, an unknown processor byte, or a request that
//! failed to decode without a usable sequence number. Everything else is a
//! per-call failure; it is answered with an error response (or only logged
//! for `no_reply` requests) and the loop keeps reading.
//!
//! Requests are handed to handlers in arrival order. Once a handler accepted
//! a request the agent is done with it; the handler answers through the
//! request's [`PendingResponse`], possibly from another task and in any
//! order relative to other requests on the same connection.

use crate::error::NoderpcError;
use crate::handler::HandlerFinder;
use crate::pool::PooledBuffer;
use crate::processor::{split_service_method, Payload, ProcessorRef, ProcessorRegistry};
use crate::rpc::{Completion, RequestPool, RpcError, RpcRequest};
use crate::serialization::framing::FrameReader;
use crate::server::response::{write_response, PendingResponse};
use crate::transport::{ConnWriter, TransportError};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, error, info, trace, warn};

/// Read and dispatch actor of one connection.
pub struct Agent<R> {
    reader: FrameReader<R>,
    writer: ConnWriter,
    processors: Arc<ProcessorRegistry>,
    finder: Arc<dyn HandlerFinder>,
    requests: RequestPool,
}

impl<R: AsyncRead + Unpin + Send> Agent<R> {
    /// Builds an agent over an opened connection.
    pub fn new(
        reader: FrameReader<R>,
        writer: ConnWriter,
        processors: Arc<ProcessorRegistry>,
        finder: Arc<dyn HandlerFinder>,
        requests: RequestPool,
    ) -> Self {
        Self {
            reader,
            writer,
            processors,
            finder,
            requests,
        }
    }

    /// Writer of the connection this agent serves.
    pub fn writer(&self) -> &ConnWriter {
        &self.writer
    }

    /// Runs until the connection reaches Closed and returns why it did.
    ///
    /// The connection is closed on return; frames already queued for writing
    /// are still flushed.
    pub async fn run(mut self) -> NoderpcError {
        debug!(peer = %self.writer.metadata().peer_label(), "agent started");
        let reason = loop {
            let frame = tokio::select! {
                frame = self.reader.read_msg() => frame,
                _ = self.writer.closed() => break NoderpcError::Transport(TransportError::Closed),
            };
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => break NoderpcError::Transport(e),
            };
            if let Err(e) = self.dispatch(frame) {
                break NoderpcError::Rpc(e);
            }
        };

        self.writer.close();
        let peer = self.writer.metadata().peer_label();
        match &reason {
            NoderpcError::Rpc(e) => warn!(%peer, error = %e, "closing connection"),
            _ => info!(%peer, %reason, recoverable = reason.is_recoverable(), "connection closed"),
        }
        reason
    }

    /// Writes a response on this agent's connection.
    pub fn write_response(
        &self,
        processor: &ProcessorRef,
        service_method: &str,
        seq: u64,
        reply: Option<&Payload>,
        err: Option<&RpcError>,
    ) {
        write_response(&self.writer, processor, service_method, seq, reply, err);
    }

    /// Handles one frame. An error means the connection must close.
    fn dispatch(&self, frame: PooledBuffer) -> Result<(), RpcError> {
        let Some((&id, envelope)) = frame.split_first() else {
            return Err(RpcError::Framing {
                reason: "empty frame".to_string(),
            });
        };
        let Some(processor) = self.processors.lookup(id).cloned() else {
            warn!(
                peer = %self.writer.metadata().peer_label(),
                processor = id,
                "frame names an unknown processor"
            );
            return Err(RpcError::UnknownProcessor { processor: id });
        };

        let mut request = self.requests.remote(processor.clone());
        let decoded = processor.decode_request(envelope, request.data_mut());
        drop(frame);

        if let Err(e) = decoded {
            let seq = request.seq();
            let error = RpcError::from(e);
            if seq == 0 {
                warn!(processor = processor.name(), %error, "undecodable request without seq");
                return Err(error);
            }
            warn!(seq, processor = processor.name(), %error, "rpc unmarshal request failed");
            self.write_response(&processor, request.service_method(), seq, None, Some(&error));
            return Ok(());
        }
        trace!(
            seq = request.seq(),
            service_method = request.service_method(),
            processor = processor.name(),
            "request decoded"
        );

        let Some((handler_name, _)) = split_service_method(request.service_method()) else {
            let error = RpcError::MalformedServiceMethod {
                service_method: request.service_method().to_string(),
            };
            self.reject(&processor, request, error);
            return Ok(());
        };
        let Some(handler) = self.finder.find_rpc_handler(handler_name) else {
            let error = RpcError::HandlerNotFound {
                service_method: request.service_method().to_string(),
            };
            self.reject(&processor, request, error);
            return Ok(());
        };

        if !request.is_no_reply() {
            let response = PendingResponse::new(
                processor,
                self.writer.clone(),
                request.service_method(),
                request.seq(),
            );
            request.set_completion(Completion::Remote(response));
        }

        if let Err(refused) = handler.push_request(request) {
            let (request, reason) = refused.into_parts();
            let error = RpcError::Dispatch {
                handler: handler.name().to_string(),
                reason,
            };
            warn!(
                seq = request.seq(),
                service_method = request.service_method(),
                %error,
                "handler refused request"
            );
            request.complete(Err(error));
        }
        Ok(())
    }

    /// Answers a request that never reached a handler.
    fn reject(&self, processor: &ProcessorRef, request: RpcRequest, error: RpcError) {
        if request.is_no_reply() {
            error!(
                seq = request.seq(),
                service_method = request.service_method(),
                %error,
                "dropping no-reply request"
            );
            return;
        }
        debug!(seq = request.seq(), %error, "rejecting request");
        self.write_response(
            processor,
            request.service_method(),
            request.seq(),
            None,
            Some(&error),
        );
    }
}

impl<R> Drop for Agent<R> {
    // Aborted agents never reach the end of `run`; completions still holding
    // a writer must not keep the stream open.
    fn drop(&mut self) {
        self.writer.close();
    }
}

impl<R> std::fmt::Debug for Agent<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("writer", &self.writer)
            .field("processors", &self.processors.len())
            .finish()
    }
}
