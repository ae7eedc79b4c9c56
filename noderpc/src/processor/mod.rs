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

//! Processors: pluggable codecs for payloads and envelopes.
//!
//! A frame body starts with one byte naming the processor that encoded the
//! rest of it. The [`ProcessorRegistry`] resolves that byte:
//!
//! | id  | processor                  | payload variant        |
//! |-----|----------------------------|------------------------|
//! | 0   | [`JsonProcessor`]          | [`Payload::Json`]      |
//! | 1   | [`ProtobufProcessor`]      | [`Payload::Protobuf`]  |
//! | 2.. | appended extensions        | declared by `is_parse` |
//!
//! When a caller does not pick a processor, the registry picks one from the
//! shape of the argument with [`ProcessorRegistry::select_by_value`].

mod envelope;
mod json;
mod payload;
#[cfg(feature = "postcard")]
mod postcard;
mod protobuf;
mod registry;
mod traits;

pub use envelope::{
    method_name, split_service_method, RequestData, ResponseData, SERVICE_METHOD_SEPARATOR,
};
pub use json::JsonProcessor;
pub use payload::Payload;
#[cfg(feature = "postcard")]
pub use self::postcard::PostcardProcessor;
pub use protobuf::ProtobufProcessor;
pub use registry::ProcessorRegistry;
pub use traits::{Processor, ProcessorId, ProcessorRef, JSON_PROCESSOR, PROTOBUF_PROCESSOR};
