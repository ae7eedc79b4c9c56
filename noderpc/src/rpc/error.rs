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

//! RPC error types.
//!
//! Errors cross the wire as plain strings: [`RpcError::to_wire`] flattens any
//! error to its display text and [`RpcError::from_wire`] turns a received
//! string back into [`RpcError::Application`]. Locally, the variant tells the
//! caller which stage failed, grouped by [`ErrorKind`].

use crate::serialization::{DeserializationError, SerializationError};
use std::time::Duration;
use thiserror::Error;

/// Stage of the call lifecycle an [`RpcError`] comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown processor byte or bad length prefix; fatal to the connection.
    Framing,
    /// A payload or envelope could not be encoded or decoded.
    Decode,
    /// The service method is malformed or names an unknown handler.
    Routing,
    /// The handler refused the request.
    Dispatch,
    /// A completion did not match any pending call.
    Correlation,
    /// The call expired, was dropped or lost its connection.
    Lifecycle,
    /// The handler, or the remote peer, reported a failure.
    Application,
}

/// An error delivered to the initiator of a call, or written back to a peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// A frame named a processor that is not registered.
    #[error("unknown processor type {processor}")]
    UnknownProcessor {
        /// Leading byte of the frame.
        processor: u8,
    },

    /// The byte stream could not be split into frames.
    #[error("framing error: {reason}")]
    Framing {
        /// What went wrong.
        reason: String,
    },

    /// A request, response or payload could not be decoded.
    #[error("rpc decode error: {reason}")]
    Decode {
        /// What went wrong.
        reason: String,
    },

    /// A reply or envelope could not be encoded.
    #[error("rpc encode error: {reason}")]
    Encode {
        /// What went wrong.
        reason: String,
    },

    /// The service method is not of the form `Handler.Method`.
    #[error("rpc request service method {service_method:?} is malformed")]
    MalformedServiceMethod {
        /// The offending string.
        service_method: String,
    },

    /// No handler is registered under the requested name.
    #[error("service method {service_method} is not registered")]
    HandlerNotFound {
        /// The requested service method.
        service_method: String,
    },

    /// The handler did not accept the request into its queue.
    #[error("handler {handler} rejected the request: {reason}")]
    Dispatch {
        /// Name of the handler.
        handler: String,
        /// Why it refused.
        reason: String,
    },

    /// A completion arrived for a sequence number that is not pending.
    #[error("rpc client cannot find seq {seq} in pending")]
    Correlation {
        /// The unmatched sequence number.
        seq: u64,
    },

    /// The call stayed pending longer than the configured timeout.
    #[error("call {seq} timed out after {elapsed:?}")]
    Timeout {
        /// Sequence number of the call.
        seq: u64,
        /// How long it was pending.
        elapsed: Duration,
    },

    /// The request was dropped by its handler without a result.
    #[error("call {seq} was dropped before it completed")]
    Abandoned {
        /// Sequence number of the call.
        seq: u64,
    },

    /// The connection carrying the call went away.
    #[error("connection closed")]
    ConnectionClosed,

    /// A failure reported by the handler or received from the peer.
    #[error("{0}")]
    Application(String),
}

impl RpcError {
    /// Builds an [`RpcError::Application`].
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application(message.into())
    }

    /// The wire representation: the display text.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }

    /// Parses a received error string; an empty string means success.
    ///
    /// ```rust
    /// use noderpc::rpc::RpcError;
    ///
    /// assert_eq!(RpcError::from_wire(""), None);
    /// assert_eq!(RpcError::from_wire("boom"), Some(RpcError::application("boom")));
    /// ```
    pub fn from_wire(message: &str) -> Option<Self> {
        if message.is_empty() {
            None
        } else {
            Some(Self::Application(message.to_string()))
        }
    }

    /// The lifecycle stage this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownProcessor { .. } | Self::Framing { .. } => ErrorKind::Framing,
            Self::Decode { .. } | Self::Encode { .. } => ErrorKind::Decode,
            Self::MalformedServiceMethod { .. } | Self::HandlerNotFound { .. } => {
                ErrorKind::Routing
            }
            Self::Dispatch { .. } => ErrorKind::Dispatch,
            Self::Correlation { .. } => ErrorKind::Correlation,
            Self::Timeout { .. } | Self::Abandoned { .. } | Self::ConnectionClosed => {
                ErrorKind::Lifecycle
            }
            Self::Application(_) => ErrorKind::Application,
        }
    }

    /// Returns `true` if the connection this error was seen on must be closed.
    #[must_use]
    pub const fn is_connection_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Framing) || matches!(self, Self::ConnectionClosed)
    }

    /// Returns `true` for [`RpcError::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<DeserializationError> for RpcError {
    fn from(error: DeserializationError) -> Self {
        Self::Decode {
            reason: error.to_string(),
        }
    }
}

impl From<SerializationError> for RpcError {
    fn from(error: SerializationError) -> Self {
        Self::Encode {
            reason: error.to_string(),
        }
    }
}
