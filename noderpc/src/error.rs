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

//! Top-level error type for noderpc.
//!
//! Failures fall into three layers, each with its own recovery strategy:
//!
//! - **Transport**: the connection itself is broken; it is closed and every
//!   call still waiting on it fails
//! - **Rpc**: one call failed; the error travels back to the caller and the
//!   connection stays up (unless the error is connection-fatal)
//! - **Configuration**: start-up values cannot be used; nothing is running yet
//!
//! [`NoderpcError`] composes them for APIs that can fail in more than one
//! layer, such as [`Server::start`](crate::server::Server::start).
//!
//! # Examples
//!
//! ```rust
//! use noderpc::{NoderpcError, RpcError};
//! use noderpc::transport::TransportError;
//!
//! let error: NoderpcError = TransportError::Closed.into();
//! assert!(error.is_transport_error());
//! assert!(error.should_close_transport());
//!
//! let error: NoderpcError = RpcError::application("boom").into();
//! assert!(!error.should_close_transport());
//! ```

use crate::rpc::RpcError;
use crate::transport::TransportError;
use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for noderpc operations.
#[derive(Debug)]
pub enum NoderpcError {
    /// A transport-layer error occurred.
    Transport(TransportError),

    /// A call failed.
    Rpc(RpcError),

    /// Configuration values were rejected.
    Configuration {
        /// What is wrong with them.
        reason: String,
    },
}

impl NoderpcError {
    /// Builds a [`NoderpcError::Configuration`].
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a transport error.
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if this is a call error.
    #[must_use]
    pub const fn is_rpc_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }

    /// Returns `true` if retrying (or reconnecting) may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_recoverable(),
            Self::Rpc(e) => !e.is_connection_fatal(),
            Self::Configuration { .. } => false,
        }
    }

    /// Returns `true` if the connection involved must be torn down.
    #[must_use]
    pub fn should_close_transport(&self) -> bool {
        match self {
            Self::Transport(e) => e.should_close_transport(),
            Self::Rpc(e) => e.is_connection_fatal(),
            Self::Configuration { .. } => false,
        }
    }

    /// Returns the transport error, if this is one.
    #[must_use]
    pub const fn as_transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the call error, if this is one.
    #[must_use]
    pub const fn as_rpc_error(&self) -> Option<&RpcError> {
        match self {
            Self::Rpc(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for NoderpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Rpc(e) => write!(f, "rpc error: {}", e),
            Self::Configuration { reason } => write!(f, "configuration error: {}", reason),
        }
    }
}

impl StdError for NoderpcError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Rpc(e) => Some(e),
            Self::Configuration { .. } => None,
        }
    }
}

impl From<TransportError> for NoderpcError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

impl From<RpcError> for NoderpcError {
    fn from(error: RpcError) -> Self {
        Self::Rpc(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layers_are_distinguished() {
        let transport = NoderpcError::from(TransportError::Closed);
        assert!(transport.is_transport_error());
        assert!(transport.as_transport_error().is_some());
        assert!(transport.source().is_some());

        let rpc = NoderpcError::from(RpcError::HandlerNotFound {
            service_method: "Ghost.Run".to_string(),
        });
        assert!(rpc.is_rpc_error());
        assert!(!rpc.should_close_transport());
        assert_eq!(
            rpc.to_string(),
            "rpc error: service method Ghost.Run is not registered"
        );
    }

    #[test]
    fn test_framing_rpc_error_is_fatal() {
        let error = NoderpcError::from(RpcError::UnknownProcessor { processor: 9 });
        assert!(error.should_close_transport());
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_recoverable_follows_the_failing_layer() {
        let lost = NoderpcError::from(TransportError::ConnectionLost {
            reason: "reset by peer".to_string(),
            source: None,
        });
        assert!(lost.is_recoverable());
        assert!(!NoderpcError::from(TransportError::Closed).is_recoverable());

        let missing = NoderpcError::from(RpcError::HandlerNotFound {
            service_method: "Ghost.Run".to_string(),
        });
        assert!(missing.is_recoverable());
        assert!(!NoderpcError::configuration("bad address").is_recoverable());
    }

    #[test]
    fn test_configuration_error() {
        let error = NoderpcError::configuration("listen address must be host:port");
        assert_eq!(
            error.to_string(),
            "configuration error: listen address must be host:port"
        );
        assert!(error.source().is_none());
        assert!(!error.should_close_transport());
    }
}
