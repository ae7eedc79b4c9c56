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

//! Transport identity and metadata.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(u64);

impl TransportId {
    /// Wraps a raw identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next unused identifier.
    pub fn next() -> Self {
        Self(NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Descriptive information about an open transport.
#[derive(Debug, Clone)]
pub struct TransportMetadata {
    /// Identifier of the transport.
    pub id: TransportId,
    /// Local socket address, if the transport has one.
    pub local_addr: Option<SocketAddr>,
    /// Remote socket address, if the transport has one.
    pub peer_addr: Option<SocketAddr>,
    /// Short name of the transport kind, such as `"tcp"`.
    pub transport_type: &'static str,
    /// When the transport was created.
    pub created_at: Instant,
}

impl TransportMetadata {
    /// Creates metadata for a transport of the given kind.
    pub fn new(id: TransportId, transport_type: &'static str) -> Self {
        Self {
            id,
            local_addr: None,
            peer_addr: None,
            transport_type,
            created_at: Instant::now(),
        }
    }

    /// Records the local address.
    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// Records the remote address.
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Time since the transport was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Remote address for log lines, or the transport kind when there is none.
    pub fn peer_label(&self) -> String {
        match self.peer_addr {
            Some(addr) => addr.to_string(),
            None => format!("{}:{}", self.transport_type, self.id),
        }
    }
}
