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

//! Response writing.
//!
//! A request that came in over a connection and expects a reply carries a
//! [`PendingResponse`]: the processor it was decoded with, a writer for the
//! connection it arrived on, and its sequence number. Whoever completes the
//! request sends the outcome through it, from whatever task that happens on.

use crate::processor::{Payload, ProcessorRef};
use crate::rpc::RpcError;
use crate::transport::ConnWriter;
use bytes::Bytes;
use tracing::{error, trace, warn};

/// Where and how to answer one remote request.
pub struct PendingResponse {
    processor: ProcessorRef,
    writer: ConnWriter,
    service_method: String,
    seq: u64,
}

impl PendingResponse {
    /// Prepares the answer to request `seq` on `writer`'s connection.
    pub fn new(
        processor: ProcessorRef,
        writer: ConnWriter,
        service_method: impl Into<String>,
        seq: u64,
    ) -> Self {
        Self {
            processor,
            writer,
            service_method: service_method.into(),
            seq,
        }
    }

    /// Sequence number being answered.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Writes the outcome back to the peer. Consumes the response, so each
    /// request is answered once.
    pub fn send(self, result: Result<Option<Payload>, RpcError>) {
        let (reply, err) = match &result {
            Ok(reply) => (reply.as_ref(), None),
            Err(err) => (None, Some(err)),
        };
        write_response(
            &self.writer,
            &self.processor,
            &self.service_method,
            self.seq,
            reply,
            err,
        );
    }
}

impl std::fmt::Debug for PendingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResponse")
            .field("seq", &self.seq)
            .field("service_method", &self.service_method)
            .field("processor", &self.processor.id())
            .finish()
    }
}

/// Encodes a response with `processor` and queues it on `writer`.
///
/// A reply that cannot be marshalled turns into an error response for the
/// same `seq`. Write failures are logged and not retried; a connection that
/// lost a write is closing anyway.
pub fn write_response(
    writer: &ConnWriter,
    processor: &ProcessorRef,
    service_method: &str,
    seq: u64,
    reply: Option<&Payload>,
    err: Option<&RpcError>,
) {
    // An error response carries no reply.
    let reply = if err.is_some() { None } else { reply };
    let mut encode_error = None;
    let reply_bytes = match reply {
        Some(reply) => match processor.marshal(reply) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(seq, service_method, error = %e, "reply cannot be marshalled");
                encode_error = Some(RpcError::from(e));
                Bytes::new()
            }
        },
        None => Bytes::new(),
    };
    let err = err.or(encode_error.as_ref());

    let response = processor.make_rpc_response(seq, err, reply_bytes);
    let body = match processor.encode_response(&response) {
        Ok(body) => body,
        Err(e) => {
            error!(
                seq,
                service_method,
                processor = processor.name(),
                error = %e,
                "failed to encode response"
            );
            return;
        }
    };

    match writer.write_msg(&[processor.id()], &body) {
        Ok(()) => trace!(seq, service_method, failed = err.is_some(), "response queued"),
        Err(e) => error!(
            seq,
            service_method,
            peer = %writer.metadata().peer_label(),
            error = %e,
            "failed to write response"
        ),
    }
}
