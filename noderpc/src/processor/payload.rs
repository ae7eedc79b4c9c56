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

//! In-memory argument and reply values.
//!
//! A [`Payload`] is what application code hands to the call API and what a
//! handler receives as arguments. Each variant is understood by exactly one
//! processor, which is how the registry picks a codec when the caller does
//! not name one.

use crate::serialization::{DeserializationError, SerializationError};
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// An argument or reply value.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A JSON document, handled by the JSON processor.
    Json(serde_json::Value),
    /// An encoded protobuf message, handled by the Protobuf processor.
    Protobuf(Bytes),
    /// Opaque binary data, handled by binary extension processors.
    Binary(Bytes),
}

impl Payload {
    /// Serializes `value` into a JSON payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, SerializationError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Encodes a protobuf message.
    pub fn protobuf<M: prost::Message>(message: &M) -> Self {
        Self::Protobuf(Bytes::from(message.encode_to_vec()))
    }

    /// Serializes `value` with postcard into a binary payload.
    #[cfg(feature = "postcard")]
    pub fn postcard<T: Serialize + ?Sized>(value: &T) -> Result<Self, SerializationError> {
        Ok(Self::Binary(Bytes::from(postcard::to_allocvec(value)?)))
    }

    /// Wraps raw bytes.
    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        Self::Binary(bytes.into())
    }

    /// Deserializes a JSON payload into `T`.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, DeserializationError> {
        match self {
            Self::Json(value) => Ok(serde_json::from_value(value.clone())?),
            other => Err(other.mismatch("json")),
        }
    }

    /// Decodes a protobuf payload into `M`.
    pub fn decode_protobuf<M: prost::Message + Default>(&self) -> Result<M, DeserializationError> {
        match self {
            Self::Protobuf(bytes) => Ok(M::decode(bytes.as_ref())?),
            other => Err(other.mismatch("protobuf")),
        }
    }

    /// Deserializes a postcard-encoded binary payload into `T`.
    #[cfg(feature = "postcard")]
    pub fn decode_postcard<T: DeserializeOwned>(&self) -> Result<T, DeserializationError> {
        match self {
            Self::Binary(bytes) => Ok(postcard::from_bytes(bytes)?),
            other => Err(other.mismatch("binary")),
        }
    }

    /// Short name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Protobuf(_) => "protobuf",
            Self::Binary(_) => "binary",
        }
    }

    fn mismatch(&self, expected: &str) -> DeserializationError {
        DeserializationError::new(format!(
            "expected a {} payload, found {}",
            expected,
            self.kind()
        ))
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}
