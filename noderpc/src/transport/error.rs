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

//! Transport layer error types.
//!
//! Transport errors describe failures of the byte stream and of the frame
//! layer built on top of it. Almost all of them end the connection: a frame
//! whose length prefix is out of bounds leaves the reader unable to find the
//! next frame boundary, and a failed read or write means the peer is gone.

use std::io;
use thiserror::Error;

/// Errors raised by transports, the frame codec and connection writers.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Establishing an outbound connection failed.
    #[error("failed to connect to {address}: {source}")]
    ConnectionFailed {
        /// Address that was dialled.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The peer went away while the connection was in use.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Description of what was in progress.
        reason: String,
        /// Underlying I/O error, if any.
        #[source]
        source: Option<io::Error>,
    },

    /// Reading from the stream failed.
    #[error("read failed: {source}")]
    ReadFailed {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing to the stream failed.
    #[error("write failed: {source}")]
    WriteFailed {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A frame announced a body shorter than the configured minimum.
    #[error("message too short: {len} < {min}")]
    FrameTooShort {
        /// Announced body length.
        len: usize,
        /// Configured minimum.
        min: usize,
    },

    /// A frame body exceeds the configured maximum.
    #[error("message too long: {len} > {max}")]
    FrameTooLarge {
        /// Body length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The per-connection write queue has no room left.
    #[error("pending write queue full ({capacity} frames)")]
    WriteBufferFull {
        /// Queue depth.
        capacity: usize,
    },

    /// The server already serves its maximum number of connections.
    #[error("too many connections (limit {limit})")]
    TooManyConnections {
        /// Configured connection limit.
        limit: usize,
    },

    /// Configuration values cannot be used.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// What is wrong with it.
        reason: String,
    },

    /// The connection was closed locally.
    #[error("transport is closed")]
    Closed,

    /// Binding a listener failed.
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        /// Address that was requested.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Any other I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Returns `true` if retrying the operation (or reconnecting) may succeed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use noderpc::transport::TransportError;
    ///
    /// assert!(!TransportError::FrameTooLarge { len: 70_000, max: 65_535 }.is_recoverable());
    /// assert!(TransportError::WriteBufferFull { capacity: 16 }.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::ConnectionFailed { .. }
            | TransportError::ConnectionLost { .. }
            | TransportError::WriteBufferFull { .. }
            | TransportError::TooManyConnections { .. } => true,

            TransportError::ReadFailed { source }
            | TransportError::WriteFailed { source }
            | TransportError::Io { source } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),

            TransportError::FrameTooShort { .. }
            | TransportError::FrameTooLarge { .. }
            | TransportError::InvalidConfiguration { .. }
            | TransportError::Closed
            | TransportError::BindFailed { .. } => false,
        }
    }

    /// Returns `true` if the connection that produced this error must be torn down.
    ///
    /// A framing violation desynchronizes the reader, so it is always fatal.
    pub fn should_close_transport(&self) -> bool {
        match self {
            TransportError::ConnectionLost { .. }
            | TransportError::Closed
            | TransportError::FrameTooShort { .. }
            | TransportError::FrameTooLarge { .. }
            | TransportError::WriteBufferFull { .. }
            | TransportError::TooManyConnections { .. } => true,

            TransportError::ConnectionFailed { .. }
            | TransportError::InvalidConfiguration { .. }
            | TransportError::BindFailed { .. } => false,

            TransportError::ReadFailed { source }
            | TransportError::WriteFailed { source }
            | TransportError::Io { source } => !matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
        }
    }

    /// Builds an [`TransportError::InvalidConfiguration`].
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        TransportError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Classifies a failed read, mapping EOF to a lost connection.
    pub(crate) fn from_read(error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            TransportError::ConnectionLost {
                reason: "peer closed the connection".to_string(),
                source: Some(error),
            }
        } else {
            TransportError::ReadFailed { source: error }
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        TransportError::Io { source: error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_violations_close_the_connection() {
        let short = TransportError::FrameTooShort { len: 1, min: 2 };
        let long = TransportError::FrameTooLarge { len: 70_000, max: 65_535 };
        assert!(short.should_close_transport());
        assert!(long.should_close_transport());
        assert!(!short.is_recoverable());
        assert_eq!(long.to_string(), "message too long: 70000 > 65535");
    }

    #[test]
    fn test_eof_maps_to_connection_lost() {
        let error = TransportError::from_read(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(matches!(error, TransportError::ConnectionLost { .. }));
        assert!(error.should_close_transport());

        let error = TransportError::from_read(io::Error::new(io::ErrorKind::Interrupted, "signal"));
        assert!(matches!(error, TransportError::ReadFailed { .. }));
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_bind_failure_is_permanent() {
        let error = TransportError::BindFailed {
            address: "0.0.0.0:1".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!error.is_recoverable());
        assert!(!error.should_close_transport());
    }

    #[test]
    fn test_invalid_configuration_helper() {
        let error = TransportError::invalid_configuration("length field must be 1, 2 or 4 bytes");
        assert_eq!(
            error.to_string(),
            "invalid configuration: length field must be 1, 2 or 4 bytes"
        );
    }
}
