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

//! The processor registry.
//!
//! A registry maps wire identifiers to processors. It is built once at
//! startup (JSON at 0, Protobuf at 1, extensions appended after), shared
//! behind an `Arc`, and only read afterwards. Appending takes `&mut self`,
//! so registration can never race with a lookup.

use crate::error::NoderpcError;
use crate::processor::{
    JsonProcessor, Payload, Processor, ProcessorId, ProcessorRef, ProtobufProcessor,
    JSON_PROCESSOR,
};
use std::sync::Arc;
use tracing::debug;

/// Ordered set of processors addressed by their wire identifier.
#[derive(Debug, Clone)]
pub struct ProcessorRegistry {
    processors: Vec<ProcessorRef>,
}

impl ProcessorRegistry {
    /// Creates a registry holding the JSON and Protobuf processors.
    pub fn new() -> Self {
        let processors = vec![
            ProcessorRef::new(0, Arc::new(JsonProcessor::new())),
            ProcessorRef::new(1, Arc::new(ProtobufProcessor::new())),
        ];
        Self { processors }
    }

    /// Registers `processor` under the next free identifier.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use noderpc::processor::{ProcessorRegistry, PostcardProcessor};
    ///
    /// let mut registry = ProcessorRegistry::new();
    /// let postcard = registry.append(PostcardProcessor::new()).unwrap();
    /// assert_eq!(postcard.id(), 2);
    /// assert_eq!(registry.lookup(2).unwrap().name(), "postcard");
    /// ```
    pub fn append(&mut self, processor: impl Processor) -> Result<ProcessorRef, NoderpcError> {
        let id = ProcessorId::try_from(self.processors.len()).map_err(|_| {
            NoderpcError::configuration(format!(
                "cannot register processor {}: all {} identifiers are taken",
                processor.name(),
                self.processors.len()
            ))
        })?;
        debug!(id, processor = processor.name(), "processor registered");
        let entry = ProcessorRef::new(id, Arc::new(processor));
        self.processors.push(entry.clone());
        Ok(entry)
    }

    /// The processor registered under `id`.
    pub fn lookup(&self, id: ProcessorId) -> Option<&ProcessorRef> {
        self.processors.get(usize::from(id))
    }

    /// Picks the first non-default processor, in registration order, that
    /// accepts `payload`, falling back to the default processor.
    pub fn select_by_value(&self, payload: &Payload) -> &ProcessorRef {
        self.processors
            .iter()
            .skip(1)
            .find(|processor| processor.is_parse(payload))
            .unwrap_or_else(|| self.default_processor())
    }

    /// The JSON processor at identifier 0.
    pub fn default_processor(&self) -> &ProcessorRef {
        &self.processors[usize::from(JSON_PROCESSOR)]
    }

    /// Number of registered processors.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Always `false`: the built-in processors cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Iterates processors in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessorRef> {
        self.processors.iter()
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{PROTOBUF_PROCESSOR, RequestData, ResponseData};
    use crate::serialization::{DeserializationError, SerializationError};
    use bytes::Bytes;

    /// Accepts every payload, to check that registration order wins.
    struct Greedy;

    impl Processor for Greedy {
        fn name(&self) -> &'static str {
            "greedy"
        }
        fn marshal(&self, _: &Payload) -> Result<Bytes, SerializationError> {
            Ok(Bytes::new())
        }
        fn unmarshal(&self, _: &[u8]) -> Result<Payload, DeserializationError> {
            Ok(Payload::binary(Bytes::new()))
        }
        fn is_parse(&self, _: &Payload) -> bool {
            true
        }
        fn encode_request(&self, _: &RequestData) -> Result<Vec<u8>, SerializationError> {
            Ok(Vec::new())
        }
        fn decode_request(&self, _: &[u8], _: &mut RequestData) -> Result<(), DeserializationError> {
            Ok(())
        }
        fn encode_response(&self, _: &ResponseData) -> Result<Vec<u8>, SerializationError> {
            Ok(Vec::new())
        }
        fn decode_response(&self, _: &[u8], _: &mut ResponseData) -> Result<(), DeserializationError> {
            Ok(())
        }
    }

    #[test]
    fn test_lookup_registered_and_unknown() {
        let registry = ProcessorRegistry::new();
        for processor in registry.iter() {
            let found = registry.lookup(processor.id()).unwrap();
            assert_eq!(found.id(), processor.id());
            assert_eq!(found.name(), processor.name());
        }
        assert_eq!(registry.lookup(JSON_PROCESSOR).unwrap().name(), "json");
        assert_eq!(registry.lookup(PROTOBUF_PROCESSOR).unwrap().name(), "protobuf");
        assert!(registry.lookup(2).is_none());
        assert!(registry.lookup(255).is_none());
    }

    #[test]
    fn test_select_by_value() {
        let registry = ProcessorRegistry::new();
        let json = Payload::Json(serde_json::json!([1, 2]));
        let protobuf = Payload::Protobuf(Bytes::from_static(&[8, 1]));
        let binary = Payload::binary(vec![1u8]);

        assert_eq!(registry.select_by_value(&json).id(), JSON_PROCESSOR);
        assert_eq!(registry.select_by_value(&protobuf).id(), PROTOBUF_PROCESSOR);
        // Nothing registered accepts binary yet, so the default is used.
        assert_eq!(registry.select_by_value(&binary).id(), JSON_PROCESSOR);
    }

    #[test]
    fn test_first_matching_extension_wins() {
        let mut registry = ProcessorRegistry::new();
        let greedy = registry.append(Greedy).unwrap();
        assert_eq!(greedy.id(), 2);

        let protobuf = Payload::Protobuf(Bytes::from_static(&[8, 1]));
        assert_eq!(registry.select_by_value(&protobuf).id(), PROTOBUF_PROCESSOR);
        let json = Payload::Json(serde_json::Value::Null);
        assert_eq!(registry.select_by_value(&json).id(), 2);
    }

    #[test]
    fn test_identifier_space_is_bounded() {
        let mut registry = ProcessorRegistry::new();
        for _ in 2..=255 {
            registry.append(Greedy).unwrap();
        }
        assert_eq!(registry.len(), 256);
        assert!(registry.append(Greedy).is_err());
    }
}
