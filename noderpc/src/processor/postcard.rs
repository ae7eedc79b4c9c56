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

//! Postcard extension processor.
//!
//! A compact binary codec for [`Payload::Binary`] arguments. It is not part
//! of the default registry; append it with
//! [`ProcessorRegistry::append`](crate::processor::ProcessorRegistry::append)
//! on both ends of a connection, in the same registration order.

use crate::processor::{Payload, Processor, RequestData, ResponseData};
use crate::serialization::{DeserializationError, SerializationError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct Request<'a> {
    seq: u64,
    service_method: &'a str,
    no_reply: bool,
    args: &'a [u8],
}

#[derive(Serialize, Deserialize)]
struct Response<'a> {
    seq: u64,
    error: &'a str,
    reply: &'a [u8],
}

/// Binary extension processor based on postcard.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostcardProcessor;

impl PostcardProcessor {
    /// Creates the processor.
    pub fn new() -> Self {
        Self
    }
}

impl Processor for PostcardProcessor {
    fn name(&self) -> &'static str {
        "postcard"
    }

    fn marshal(&self, payload: &Payload) -> Result<Bytes, SerializationError> {
        match payload {
            Payload::Binary(bytes) => Ok(bytes.clone()),
            other => Err(SerializationError::new(format!(
                "postcard processor cannot marshal a {} payload",
                other.kind()
            ))),
        }
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Payload, DeserializationError> {
        Ok(Payload::Binary(Bytes::copy_from_slice(bytes)))
    }

    fn is_parse(&self, payload: &Payload) -> bool {
        matches!(payload, Payload::Binary(_))
    }

    fn encode_request(&self, request: &RequestData) -> Result<Vec<u8>, SerializationError> {
        Ok(postcard::to_allocvec(&Request {
            seq: request.seq,
            service_method: &request.service_method,
            no_reply: request.no_reply,
            args: &request.args,
        })?)
    }

    fn decode_request(
        &self,
        bytes: &[u8],
        request: &mut RequestData,
    ) -> Result<(), DeserializationError> {
        let envelope: Request<'_> = match postcard::from_bytes(bytes) {
            Ok(envelope) => envelope,
            Err(error) => {
                // Keep whatever identifies the call so it can still be answered.
                if let Ok((seq, rest)) = postcard::take_from_bytes::<u64>(bytes) {
                    request.seq = seq;
                    if let Ok((method, _)) = postcard::take_from_bytes::<&str>(rest) {
                        request.service_method = method.to_string();
                    }
                }
                return Err(error.into());
            }
        };
        request.seq = envelope.seq;
        request.service_method = envelope.service_method.to_string();
        request.no_reply = envelope.no_reply;
        request.args = Bytes::copy_from_slice(envelope.args);
        Ok(())
    }

    fn encode_response(&self, response: &ResponseData) -> Result<Vec<u8>, SerializationError> {
        Ok(postcard::to_allocvec(&Response {
            seq: response.seq,
            error: &response.error,
            reply: &response.reply,
        })?)
    }

    fn decode_response(
        &self,
        bytes: &[u8],
        response: &mut ResponseData,
    ) -> Result<(), DeserializationError> {
        let envelope: Response<'_> = match postcard::from_bytes(bytes) {
            Ok(envelope) => envelope,
            Err(error) => {
                if let Ok((seq, _)) = postcard::take_from_bytes::<u64>(bytes) {
                    response.seq = seq;
                }
                return Err(error.into());
            }
        };
        response.seq = envelope.seq;
        response.error = envelope.error.to_string();
        response.reply = Bytes::copy_from_slice(envelope.reply);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trip() {
        let processor = PostcardProcessor::new();
        let request =
            processor.make_rpc_request(9, "Store.Put", false, Bytes::from_static(&[1, 2, 3]));
        let bytes = processor.encode_request(&request).unwrap();
        let mut decoded = RequestData::default();
        processor.decode_request(&bytes, &mut decoded).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_garbage_is_unattributable() {
        let processor = PostcardProcessor::new();
        let mut decoded = RequestData::default();
        assert!(processor.decode_request(&[0xff], &mut decoded).is_err());
        assert_eq!(decoded.seq, 0);
    }

    #[test]
    fn test_corrupt_tail_keeps_seq() {
        let processor = PostcardProcessor::new();
        let request =
            processor.make_rpc_request(9, "Store.Put", false, Bytes::from_static(&[1, 2, 3]));
        let bytes = processor.encode_request(&request).unwrap();
        let truncated = &bytes[..bytes.len() - 2];

        let mut decoded = RequestData::default();
        assert!(processor.decode_request(truncated, &mut decoded).is_err());
        assert_eq!(decoded.seq, 9);
        assert_eq!(decoded.service_method, "Store.Put");

        let response = processor.make_rpc_response(11, None, Bytes::from_static(&[4, 5, 6]));
        let bytes = processor.encode_response(&response).unwrap();
        let mut decoded = ResponseData::default();
        assert!(processor.decode_response(&bytes[..bytes.len() - 1], &mut decoded).is_err());
        assert_eq!(decoded.seq, 11);
    }

    #[test]
    fn test_accepts_binary_only() {
        let processor = PostcardProcessor::new();
        assert!(processor.is_parse(&Payload::binary(vec![0u8])));
        assert!(!processor.is_parse(&Payload::Json(serde_json::Value::Null)));
    }
}
