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

#![doc = include_str!("../../README.md")]
#![allow(clippy::module_inception)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # Layers
//!
//! - **[`transport`]**: byte streams (TCP, in-memory) and framed connections
//!   with a single writer task each
//! - **[`serialization`]**: the length-prefixed frame format
//! - **[`processor`]**: pluggable codecs identified by the leading frame byte
//! - **[`rpc`]**: requests, calls, the pending-call table and errors
//! - **[`handler`]**: the boundary to business logic
//! - **[`server`]**: per-connection agents, response writing, local calls
//! - **[`client`]**: outbound calls, correlation and expiry
//! - **[`pool`]**: object pooling with move-only handles

pub mod client;
pub mod error;
pub mod handler;
pub mod pool;
pub mod processor;
pub mod rpc;
pub mod serialization;
pub mod server;
pub mod transport;

pub use client::{Client, ClientConfig};
pub use error::NoderpcError;
pub use handler::{HandlerFinder, HandlerRegistry, QueuedHandler, RpcHandler, Service};
pub use processor::{Payload, Processor, ProcessorRegistry};
pub use rpc::{Call, CallHandle, RpcError, RpcRequest};
pub use server::{Server, ServerConfig, ServerHandle};
pub use transport::{Transport, TransportError};
