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

//! Framed connections with a dedicated writer task.
//!
//! ```text
//! completion 1 ─┐
//! completion 2 ─┼─► ConnWriter ─► mpsc (pending_write_num) ─► writer task ─► stream
//! agent        ─┘
//! ```
//!
//! A connection is the pair returned by [`open`]: a [`FrameReader`] owned by
//! whoever runs the read loop, and a [`ConnWriter`] that can be cloned into
//! every completion path that answers on this connection.
//!
//! # Write contract
//!
//! [`ConnWriter::write_msg`] never blocks and never writes to the stream
//! itself. It encodes a complete frame and queues it; one task owns the write
//! half and writes queued frames back to back. Two frames therefore can never
//! interleave, no matter how many threads complete calls concurrently. When
//! the queue is full the connection is considered unable to keep up and is
//! closed. After [`ConnWriter::close`] the writer flushes what is already
//! queued, shuts the stream down, and every later write fails with
//! [`TransportError::Closed`].

use crate::pool::BufferPool;
use crate::serialization::framing::{encode_msg, FrameConfig, FrameReader};
use crate::transport::{Transport, TransportError, TransportMetadata};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt, ReadHalf};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn, Instrument};

/// Frames written per flush at most.
const MAX_BATCH_SIZE: usize = 64;

/// How long writes may still take once the connection is closed.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

struct ConnState {
    metadata: TransportMetadata,
    closed: watch::Sender<bool>,
}

/// Cloneable write side of a framed connection.
#[derive(Clone)]
pub struct ConnWriter {
    tx: mpsc::Sender<Vec<u8>>,
    state: Arc<ConnState>,
    config: FrameConfig,
    capacity: usize,
}

impl ConnWriter {
    /// Queues `header` followed by `body` as one frame.
    pub fn write_msg(&self, header: &[u8], body: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let frame = encode_msg(&self.config, &[header, body])?;
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    peer = %self.state.metadata.peer_label(),
                    capacity = self.capacity,
                    "closing connection: pending write queue full"
                );
                self.close();
                Err(TransportError::WriteBufferFull {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TransportError::Closed),
        }
    }

    /// Stops accepting frames; already queued frames are still written.
    pub fn close(&self) {
        if !self.state.closed.send_replace(true) {
            debug!(peer = %self.state.metadata.peer_label(), "connection closing");
        }
    }

    /// Returns `true` once [`close`](Self::close) was called or the stream failed.
    pub fn is_closed(&self) -> bool {
        *self.state.closed.borrow()
    }

    /// Resolves when the connection is closed.
    pub async fn closed(&self) {
        wait_closed(&mut self.state.closed.subscribe()).await;
    }

    /// Remote address of the connection.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.state.metadata.peer_addr
    }

    /// Local address of the connection.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.metadata.local_addr
    }

    /// Metadata of the underlying transport.
    pub fn metadata(&self) -> &TransportMetadata {
        &self.state.metadata
    }

    /// Frames queued but not yet handed to the stream.
    pub fn pending_writes(&self) -> usize {
        self.capacity - self.tx.capacity()
    }
}

impl std::fmt::Debug for ConnWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnWriter")
            .field("peer", &self.state.metadata.peer_label())
            .field("closed", &self.is_closed())
            .field("pending_writes", &self.pending_writes())
            .finish()
    }
}

/// Splits `transport` into a frame reader and a writer backed by a spawned
/// writer task holding at most `pending_write_num` queued frames.
///
/// Must be called from within a tokio runtime.
pub fn open<T: Transport>(
    transport: T,
    config: FrameConfig,
    pending_write_num: usize,
    buffers: BufferPool,
) -> (FrameReader<ReadHalf<T>>, ConnWriter) {
    let metadata = transport.metadata().clone();
    let (read_half, write_half) = tokio::io::split(transport);
    let capacity = pending_write_num.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let (closed, _) = watch::channel(false);
    let state = Arc::new(ConnState { metadata, closed });

    let span = tracing::debug_span!("conn_writer", peer = %state.metadata.peer_label());
    tokio::spawn(writer_loop(rx, write_half, Arc::clone(&state)).instrument(span));

    let reader = FrameReader::new(read_half, config, buffers);
    let writer = ConnWriter {
        tx,
        state,
        config,
        capacity,
    };
    (reader, writer)
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<Vec<u8>>, mut stream: W, state: Arc<ConnState>)
where
    W: AsyncWrite + Unpin,
{
    let mut closed = state.closed.subscribe();
    loop {
        let first = tokio::select! {
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = wait_closed(&mut closed) => {
                let mut queued = Vec::new();
                while let Ok(frame) = rx.try_recv() {
                    queued.push(frame);
                }
                if !queued.is_empty() {
                    match tokio::time::timeout(CLOSE_GRACE, write_batch(&mut stream, &queued)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => debug!(error = %e, "flush after close failed"),
                        Err(_) => warn!(frames = queued.len(), "peer stopped reading, dropping queued frames"),
                    }
                }
                break;
            }
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        // A write still pending CLOSE_GRACE after close is abandoned.
        let written = tokio::select! {
            written = write_batch(&mut stream, &batch) => written,
            _ = closed_for(&mut closed, CLOSE_GRACE) => {
                warn!(frames = batch.len(), "peer stopped reading, abandoning write");
                break;
            }
        };
        if let Err(e) = written {
            error!(error = %e, frames = batch.len(), "connection write failed");
            state.closed.send_replace(true);
            break;
        }
    }

    if tokio::time::timeout(CLOSE_GRACE, stream.shutdown()).await.is_err() {
        debug!("stream shutdown timed out");
    }
    debug!("writer stopped");
}

/// Resolves `grace` after the connection was closed.
async fn closed_for(closed: &mut watch::Receiver<bool>, grace: Duration) {
    wait_closed(closed).await;
    tokio::time::sleep(grace).await;
}

async fn write_batch<W>(stream: &mut W, batch: &[Vec<u8>]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    for frame in batch {
        stream
            .write_all(frame)
            .await
            .map_err(|source| TransportError::WriteFailed { source })?;
    }
    stream
        .flush()
        .await
        .map_err(|source| TransportError::WriteFailed { source })
}
