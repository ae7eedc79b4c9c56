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

//! Protobuf processor.
//!
//! Envelopes are the two messages below, encoded with prost. Arguments and
//! replies are already-encoded protobuf messages and travel as `bytes`
//! fields, so the processor never needs to know their schema.
//!
//! ```text
//! message RpcRequest  { uint64 seq = 1; string service_method = 2; bool no_reply = 3; bytes args = 4; }
//! message RpcResponse { uint64 seq = 1; string error = 2; bytes reply = 3; }
//! ```

use crate::processor::{Payload, Processor, RequestData, ResponseData};
use crate::serialization::{DeserializationError, SerializationError};
use bytes::Bytes;
use prost::Message;

#[derive(Clone, PartialEq, Message)]
struct PbRequest {
    #[prost(uint64, tag = "1")]
    seq: u64,
    #[prost(string, tag = "2")]
    service_method: String,
    #[prost(bool, tag = "3")]
    no_reply: bool,
    #[prost(bytes = "bytes", tag = "4")]
    args: Bytes,
}

#[derive(Clone, PartialEq, Message)]
struct PbResponse {
    #[prost(uint64, tag = "1")]
    seq: u64,
    #[prost(string, tag = "2")]
    error: String,
    #[prost(bytes = "bytes", tag = "3")]
    reply: Bytes,
}

/// The built-in Protobuf processor, identifier 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufProcessor;

impl ProtobufProcessor {
    /// Creates the processor.
    pub fn new() -> Self {
        Self
    }
}

impl Processor for ProtobufProcessor {
    fn name(&self) -> &'static str {
        "protobuf"
    }

    fn marshal(&self, payload: &Payload) -> Result<Bytes, SerializationError> {
        match payload {
            Payload::Protobuf(bytes) => Ok(bytes.clone()),
            other => Err(SerializationError::new(format!(
                "protobuf processor cannot marshal a {} payload",
                other.kind()
            ))),
        }
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Payload, DeserializationError> {
        Ok(Payload::Protobuf(Bytes::copy_from_slice(bytes)))
    }

    fn is_parse(&self, payload: &Payload) -> bool {
        matches!(payload, Payload::Protobuf(_))
    }

    fn encode_request(&self, request: &RequestData) -> Result<Vec<u8>, SerializationError> {
        let envelope = PbRequest {
            seq: request.seq,
            service_method: request.service_method.clone(),
            no_reply: request.no_reply,
            args: request.args.clone(),
        };
        Ok(envelope.encode_to_vec())
    }

    fn decode_request(
        &self,
        bytes: &[u8],
        request: &mut RequestData,
    ) -> Result<(), DeserializationError> {
        // merge keeps fields decoded before a failure, including seq.
        let mut envelope = PbRequest::default();
        let result = envelope.merge(bytes);
        request.seq = envelope.seq;
        request.service_method = envelope.service_method;
        request.no_reply = envelope.no_reply;
        request.args = envelope.args;
        Ok(result?)
    }

    fn encode_response(&self, response: &ResponseData) -> Result<Vec<u8>, SerializationError> {
        let envelope = PbResponse {
            seq: response.seq,
            error: response.error.clone(),
            reply: response.reply.clone(),
        };
        Ok(envelope.encode_to_vec())
    }

    fn decode_response(
        &self,
        bytes: &[u8],
        response: &mut ResponseData,
    ) -> Result<(), DeserializationError> {
        let mut envelope = PbResponse::default();
        let result = envelope.merge(bytes);
        response.seq = envelope.seq;
        response.error = envelope.error;
        response.reply = envelope.reply;
        Ok(result?)
    }
}
