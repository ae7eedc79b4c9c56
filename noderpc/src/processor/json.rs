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

//! JSON processor.
//!
//! Envelopes are JSON objects. Arguments and replies are embedded as raw JSON
//! values rather than as escaped strings, so a request on the wire reads:
//!
//! ```text
//! {"seq":7,"service_method":"UserHandler.Login","args":{"user":"ada"}}
//! {"seq":7,"reply":{"ok":true}}
//! {"seq":8,"error":"service method Ghost.Find is not registered"}
//! ```
//!
//! `no_reply`, `error`, `args` and `reply` are omitted when empty.

use crate::processor::{Payload, Processor, RequestData, ResponseData};
use crate::serialization::{DeserializationError, SerializationError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

#[derive(Serialize)]
struct RequestOut<'a> {
    seq: u64,
    service_method: &'a str,
    #[serde(skip_serializing_if = "is_false")]
    no_reply: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct RequestIn {
    seq: u64,
    service_method: String,
    #[serde(default)]
    no_reply: bool,
    #[serde(default, deserialize_with = "present")]
    args: Option<Box<RawValue>>,
}

#[derive(Serialize)]
struct ResponseOut<'a> {
    seq: u64,
    #[serde(skip_serializing_if = "str::is_empty")]
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct ResponseIn {
    seq: u64,
    #[serde(default)]
    error: String,
    #[serde(default, deserialize_with = "present")]
    reply: Option<Box<RawValue>>,
}

/// `None` only when the field is absent; an explicit `null` is kept as a value.
fn present<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn raw_json(bytes: &[u8]) -> Result<Option<&RawValue>, SerializationError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(bytes)?))
}

fn raw_bytes(raw: Option<Box<RawValue>>) -> Bytes {
    raw.map(|raw| Bytes::copy_from_slice(raw.get().as_bytes()))
        .unwrap_or_default()
}

/// The default processor, identifier 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProcessor {
    pretty: bool,
}

impl JsonProcessor {
    /// Creates a processor writing compact JSON.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes indented payloads. Envelopes stay compact.
    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Processor for JsonProcessor {
    fn name(&self) -> &'static str {
        "json"
    }

    fn marshal(&self, payload: &Payload) -> Result<Bytes, SerializationError> {
        let Payload::Json(value) = payload else {
            return Err(SerializationError::new(format!(
                "json processor cannot marshal a {} payload",
                payload.kind()
            )));
        };
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(Bytes::from(bytes))
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Payload, DeserializationError> {
        if bytes.is_empty() {
            return Ok(Payload::Json(serde_json::Value::Null));
        }
        Ok(Payload::Json(serde_json::from_slice(bytes)?))
    }

    fn is_parse(&self, payload: &Payload) -> bool {
        matches!(payload, Payload::Json(_))
    }

    fn encode_request(&self, request: &RequestData) -> Result<Vec<u8>, SerializationError> {
        let envelope = RequestOut {
            seq: request.seq,
            service_method: &request.service_method,
            no_reply: request.no_reply,
            args: raw_json(&request.args)?,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    fn decode_request(
        &self,
        bytes: &[u8],
        request: &mut RequestData,
    ) -> Result<(), DeserializationError> {
        match serde_json::from_slice::<RequestIn>(bytes) {
            Ok(envelope) => {
                request.seq = envelope.seq;
                request.service_method = envelope.service_method;
                request.no_reply = envelope.no_reply;
                request.args = raw_bytes(envelope.args);
                Ok(())
            }
            Err(error) => {
                // Keep whatever identifies the call so it can still be answered.
                if let Ok(serde_json::Value::Object(fields)) =
                    serde_json::from_slice::<serde_json::Value>(bytes)
                {
                    request.seq = fields.get("seq").and_then(|v| v.as_u64()).unwrap_or(0);
                    if let Some(method) = fields.get("service_method").and_then(|v| v.as_str()) {
                        request.service_method = method.to_string();
                    }
                    request.no_reply = fields
                        .get("no_reply")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);
                }
                Err(error.into())
            }
        }
    }

    fn encode_response(&self, response: &ResponseData) -> Result<Vec<u8>, SerializationError> {
        let envelope = ResponseOut {
            seq: response.seq,
            error: &response.error,
            reply: raw_json(&response.reply)?,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    fn decode_response(
        &self,
        bytes: &[u8],
        response: &mut ResponseData,
    ) -> Result<(), DeserializationError> {
        match serde_json::from_slice::<ResponseIn>(bytes) {
            Ok(envelope) => {
                response.seq = envelope.seq;
                response.error = envelope.error;
                response.reply = raw_bytes(envelope.reply);
                Ok(())
            }
            Err(error) => {
                if let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) {
                    response.seq = value.get("seq").and_then(|v| v.as_u64()).unwrap_or(0);
                }
                Err(error.into())
            }
        }
    }
}
