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

//! Server configuration.

use crate::pool::DEFAULT_MAX_IDLE;
use crate::serialization::framing::FrameConfig;
use crate::transport::TransportError;

/// Default listen address: an ephemeral port on every interface.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:0";

/// Default cap on concurrently served connections.
pub const DEFAULT_MAX_CONN_NUM: usize = 10_000;

/// Default depth of each connection's write queue, in frames.
pub const DEFAULT_PENDING_WRITE_NUM: usize = 2_000_000;

/// Settings of a [`Server`](crate::server::Server).
///
/// # Examples
///
/// ```rust
/// use noderpc::server::ServerConfig;
///
/// let config = ServerConfig::default()
///     .with_listen_addr("127.0.0.1:9000")
///     .with_max_conn_num(64)
///     .with_little_endian(true);
/// assert_eq!(config.listen_port_addr().unwrap(), "0.0.0.0:9000");
/// assert!(config.frame.little_endian);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `host:port` to listen on. Only the port is used; the server binds
    /// every interface.
    pub listen_addr: String,
    /// Frame layout.
    pub frame: FrameConfig,
    /// Connections served at once; surplus connections are closed on accept.
    pub max_conn_num: usize,
    /// Frames each connection may queue before it is closed as too slow.
    pub pending_write_num: usize,
    /// Idle request bodies kept for reuse.
    pub max_idle_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            frame: FrameConfig::default(),
            max_conn_num: DEFAULT_MAX_CONN_NUM,
            pending_write_num: DEFAULT_PENDING_WRITE_NUM,
            max_idle_requests: DEFAULT_MAX_IDLE,
        }
    }
}

impl ServerConfig {
    /// Sets the listen address.
    #[must_use]
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Sets the frame layout.
    #[must_use]
    pub fn with_frame(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    /// Sets the byte order of the length prefix.
    #[must_use]
    pub fn with_little_endian(mut self, little_endian: bool) -> Self {
        self.frame = self.frame.with_little_endian(little_endian);
        self
    }

    /// Sets the connection limit.
    #[must_use]
    pub fn with_max_conn_num(mut self, max_conn_num: usize) -> Self {
        self.max_conn_num = max_conn_num;
        self
    }

    /// Sets the per-connection write queue depth.
    #[must_use]
    pub fn with_pending_write_num(mut self, pending_write_num: usize) -> Self {
        self.pending_write_num = pending_write_num;
        self
    }

    /// Sets how many idle request bodies are kept.
    #[must_use]
    pub fn with_max_idle_requests(mut self, max_idle_requests: usize) -> Self {
        self.max_idle_requests = max_idle_requests;
        self
    }

    /// The address actually bound: the configured port on `0.0.0.0`.
    pub fn listen_port_addr(&self) -> Result<String, TransportError> {
        let parts: Vec<&str> = self.listen_addr.split(':').collect();
        match parts.as_slice() {
            [_, port] if !port.is_empty() => Ok(format!("0.0.0.0:{}", port)),
            _ => Err(TransportError::invalid_configuration(format!(
                "listen address {:?} must be host:port",
                self.listen_addr
            ))),
        }
    }

    /// Checks every setting before the server starts.
    pub fn validate(&self) -> Result<(), TransportError> {
        self.listen_port_addr()?;
        self.frame.validate()?;
        if self.max_conn_num == 0 {
            return Err(TransportError::invalid_configuration(
                "max_conn_num must be at least 1",
            ));
        }
        Ok(())
    }
}
