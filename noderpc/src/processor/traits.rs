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

//! The processor trait.

use crate::processor::{Payload, RequestData, ResponseData};
use crate::rpc::RpcError;
use crate::serialization::{DeserializationError, SerializationError};
use bytes::Bytes;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Wire identifier of a processor: the first byte of every frame body.
pub type ProcessorId = u8;

/// Identifier of the built-in JSON processor, also the default.
pub const JSON_PROCESSOR: ProcessorId = 0;

/// Identifier of the built-in Protobuf processor.
pub const PROTOBUF_PROCESSOR: ProcessorId = 1;

/// A codec for payloads and request/response envelopes.
///
/// Processors are stateless and shared between every connection, so all
/// methods take `&self`. `decode_*` fill a caller-provided envelope and should
/// leave whatever they managed to read in it even when they fail: the agent
/// uses a recovered `seq` to answer a malformed request instead of dropping
/// the connection.
pub trait Processor: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Encodes an argument or reply.
    fn marshal(&self, payload: &Payload) -> Result<Bytes, SerializationError>;

    /// Decodes an argument or reply.
    fn unmarshal(&self, bytes: &[u8]) -> Result<Payload, DeserializationError>;

    /// Returns `true` if this processor can marshal `payload`.
    fn is_parse(&self, payload: &Payload) -> bool;

    /// Encodes a request envelope, without the processor byte.
    fn encode_request(&self, request: &RequestData) -> Result<Vec<u8>, SerializationError>;

    /// Decodes a request envelope into `request`.
    fn decode_request(
        &self,
        bytes: &[u8],
        request: &mut RequestData,
    ) -> Result<(), DeserializationError>;

    /// Encodes a response envelope, without the processor byte.
    fn encode_response(&self, response: &ResponseData) -> Result<Vec<u8>, SerializationError>;

    /// Decodes a response envelope into `response`.
    fn decode_response(
        &self,
        bytes: &[u8],
        response: &mut ResponseData,
    ) -> Result<(), DeserializationError>;

    /// Builds a request envelope.
    fn make_rpc_request(
        &self,
        seq: u64,
        service_method: &str,
        no_reply: bool,
        args: Bytes,
    ) -> RequestData {
        RequestData {
            seq,
            service_method: service_method.to_string(),
            no_reply,
            args,
        }
    }

    /// Builds a response envelope, flattening `error` to its wire string.
    fn make_rpc_response(&self, seq: u64, error: Option<&RpcError>, reply: Bytes) -> ResponseData {
        ResponseData {
            seq,
            error: error.map(RpcError::to_wire).unwrap_or_default(),
            reply,
        }
    }
}

/// A registered processor together with its wire identifier.
#[derive(Clone)]
pub struct ProcessorRef {
    id: ProcessorId,
    processor: Arc<dyn Processor>,
}

impl ProcessorRef {
    pub(crate) fn new(id: ProcessorId, processor: Arc<dyn Processor>) -> Self {
        Self { id, processor }
    }

    /// The identifier written in front of every frame this processor encodes.
    pub fn id(&self) -> ProcessorId {
        self.id
    }
}

impl Deref for ProcessorRef {
    type Target = dyn Processor;

    fn deref(&self) -> &Self::Target {
        self.processor.as_ref()
    }
}

impl fmt::Debug for ProcessorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorRef")
            .field("id", &self.id)
            .field("name", &self.processor.name())
            .finish()
    }
}
