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

//! TCP transport implementation.

use crate::transport::{Transport, TransportError, TransportId, TransportMetadata};
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// A TCP connection.
pub struct TcpTransport {
    stream: TcpStream,
    metadata: TransportMetadata,
}

impl TcpTransport {
    /// Wraps an established stream. Nagle's algorithm is disabled since
    /// frames are small and latency sensitive.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let id = TransportId::next();
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        debug!(transport = %id, %local_addr, %peer_addr, "tcp transport created");

        let metadata = TransportMetadata::new(id, "tcp")
            .with_local_addr(local_addr)
            .with_peer_addr(peer_addr);
        Ok(Self { stream, metadata })
    }

    /// Connects to `addr`.
    pub async fn connect(addr: impl Into<String>) -> Result<Self, TransportError> {
        let address = addr.into();
        let stream = TcpStream::connect(&address).await.map_err(|source| {
            error!(%address, error = %source, "tcp connect failed");
            TransportError::ConnectionFailed {
                address: address.clone(),
                source,
            }
        })?;
        info!(%address, "tcp connection established");
        Self::from_stream(stream).map_err(TransportError::from)
    }

    /// Binds a listener on `addr`.
    pub async fn bind(addr: impl Into<String>) -> Result<TcpListener, TransportError> {
        let address = addr.into();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| TransportError::BindFailed {
                address: address.clone(),
                source,
            })?;
        info!(%address, "tcp listener bound");
        Ok(listener)
    }

    /// Accepts the next inbound connection.
    pub async fn accept(listener: &TcpListener) -> Result<(Self, SocketAddr), TransportError> {
        let (stream, peer_addr) = listener.accept().await?;
        let transport = Self::from_stream(stream)?;
        Ok((transport, peer_addr))
    }
}

impl Transport for TcpTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

impl AsyncRead for TcpTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpTransport {
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
