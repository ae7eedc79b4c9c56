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

//! In-memory transport.
//!
//! A pair of [`MemoryTransport`]s behaves like the two ends of a socket
//! without touching the network. Agents and clients cannot tell the
//! difference, which makes the pair the transport of choice in tests.

use crate::transport::{Transport, TransportId, TransportMetadata};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

/// One end of an in-process duplex pipe.
#[derive(Debug)]
pub struct MemoryTransport {
    stream: DuplexStream,
    metadata: TransportMetadata,
}

impl MemoryTransport {
    /// Creates two connected ends, each buffering up to `buffer_size` bytes
    /// in flight per direction.
    pub fn pair(buffer_size: usize) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(buffer_size);
        (
            Self {
                stream: a,
                metadata: TransportMetadata::new(TransportId::next(), "memory"),
            },
            Self {
                stream: b,
                metadata: TransportMetadata::new(TransportId::next(), "memory"),
            },
        )
    }
}

impl Transport for MemoryTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

impl AsyncRead for MemoryTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
