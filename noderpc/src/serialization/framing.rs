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

//! Length-prefixed message framing.
//!
//! Every message on the wire is a single frame: a fixed-width length field
//! followed by a body of exactly that many bytes.
//!
//! ```text
//! +------------------+----------------+---------------------------+
//! | Length (2 bytes) | Processor (1B) | Envelope (Length - 1)     |
//! +------------------+----------------+---------------------------+
//! ```
//!
//! The width of the length field (1, 2 or 4 bytes), its byte order and the
//! accepted body size range come from [`FrameConfig`]. The defaults are a
//! 2-byte big-endian prefix and bodies of 2 to 65535 bytes. The framing layer
//! never looks inside the body; the leading processor byte is interpreted by
//! the agent.
//!
//! # Examples
//!
//! ```rust
//! use noderpc::serialization::framing::{read_msg, write_msg, FrameConfig};
//! use noderpc::pool::BufferPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FrameConfig::default();
//! let mut wire = Vec::new();
//! write_msg(&mut wire, &config, &[0], b"{}").await?;
//! assert_eq!(wire, vec![0, 3, 0, b'{', b'}']);
//!
//! let mut reader = &wire[..];
//! let frame = read_msg(&mut reader, &config, &BufferPool::default()).await?;
//! assert_eq!(&frame[..], &[0, b'{', b'}']);
//! # Ok(())
//! # }
//! ```

use crate::pool::{BufferPool, PooledBuffer};
use crate::transport::TransportError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default width of the length field in bytes.
pub const DEFAULT_LEN_MSG_LEN: usize = 2;

/// Default minimum body length: the processor byte plus one envelope byte.
pub const DEFAULT_MIN_MSG_LEN: usize = 2;

/// Default maximum body length.
pub const DEFAULT_MAX_MSG_LEN: usize = u16::MAX as usize;

/// Frame layout settings shared by both ends of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Width of the length prefix: 1, 2 or 4 bytes.
    pub len_msg_len: usize,
    /// Smallest accepted body length.
    pub min_msg_len: usize,
    /// Largest accepted body length; clamped to what the prefix can express.
    pub max_msg_len: usize,
    /// Encode the length prefix little-endian instead of big-endian.
    pub little_endian: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            len_msg_len: DEFAULT_LEN_MSG_LEN,
            min_msg_len: DEFAULT_MIN_MSG_LEN,
            max_msg_len: DEFAULT_MAX_MSG_LEN,
            little_endian: false,
        }
    }
}

impl FrameConfig {
    /// Sets the byte order of the length prefix.
    #[must_use]
    pub fn with_little_endian(mut self, little_endian: bool) -> Self {
        self.little_endian = little_endian;
        self
    }

    /// Sets the accepted body length range.
    #[must_use]
    pub fn with_msg_len(mut self, min: usize, max: usize) -> Self {
        self.min_msg_len = min;
        self.max_msg_len = max;
        self
    }

    /// Sets the width of the length prefix.
    #[must_use]
    pub fn with_len_msg_len(mut self, len_msg_len: usize) -> Self {
        self.len_msg_len = len_msg_len;
        self
    }

    /// Checks the settings and returns the effective maximum body length.
    pub fn validate(&self) -> Result<usize, TransportError> {
        let capacity = match self.len_msg_len {
            1 => u8::MAX as usize,
            2 => u16::MAX as usize,
            4 => u32::MAX as usize,
            other => {
                return Err(TransportError::invalid_configuration(format!(
                    "length field must be 1, 2 or 4 bytes, got {}",
                    other
                )));
            }
        };
        let max = self.max_msg_len.min(capacity);
        if self.min_msg_len > max {
            return Err(TransportError::invalid_configuration(format!(
                "minimum message length {} exceeds maximum {}",
                self.min_msg_len, max
            )));
        }
        Ok(max)
    }

    fn check_len(&self, len: usize) -> Result<(), TransportError> {
        let max = self.validate()?;
        if len > max {
            return Err(TransportError::FrameTooLarge { len, max });
        }
        if len < self.min_msg_len {
            return Err(TransportError::FrameTooShort {
                len,
                min: self.min_msg_len,
            });
        }
        Ok(())
    }

    fn encode_len(&self, len: usize, out: &mut Vec<u8>) {
        // check_len guarantees len fits the prefix
        match (self.len_msg_len, self.little_endian) {
            (1, _) => out.push(len as u8),
            (2, true) => out.extend_from_slice(&(len as u16).to_le_bytes()),
            (2, false) => out.extend_from_slice(&(len as u16).to_be_bytes()),
            (_, true) => out.extend_from_slice(&(len as u32).to_le_bytes()),
            (_, false) => out.extend_from_slice(&(len as u32).to_be_bytes()),
        }
    }

    fn decode_len(&self, prefix: &[u8]) -> usize {
        match (prefix.len(), self.little_endian) {
            (1, _) => prefix[0] as usize,
            (2, true) => u16::from_le_bytes([prefix[0], prefix[1]]) as usize,
            (2, false) => u16::from_be_bytes([prefix[0], prefix[1]]) as usize,
            (_, true) => u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize,
            (_, false) => u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize,
        }
    }
}

/// Encodes the concatenation of `parts` as one complete frame.
pub fn encode_msg(config: &FrameConfig, parts: &[&[u8]]) -> Result<Vec<u8>, TransportError> {
    let len: usize = parts.iter().map(|part| part.len()).sum();
    config.check_len(len)?;

    let mut frame = Vec::with_capacity(config.len_msg_len + len);
    config.encode_len(len, &mut frame);
    for part in parts {
        frame.extend_from_slice(part);
    }
    Ok(frame)
}

/// Writes `header` followed by `body` as a single frame and flushes.
pub async fn write_msg<W>(
    writer: &mut W,
    config: &FrameConfig,
    header: &[u8],
    body: &[u8],
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_msg(config, &[header, body])?;
    writer
        .write_all(&frame)
        .await
        .map_err(|source| TransportError::WriteFailed { source })?;
    writer
        .flush()
        .await
        .map_err(|source| TransportError::WriteFailed { source })
}

/// Reads one frame body into a pooled buffer.
pub async fn read_msg<R>(
    reader: &mut R,
    config: &FrameConfig,
    buffers: &BufferPool,
) -> Result<PooledBuffer, TransportError>
where
    R: AsyncRead + Unpin,
{
    config.validate()?;
    let mut prefix = [0u8; 4];
    let prefix = &mut prefix[..config.len_msg_len];
    reader
        .read_exact(prefix)
        .await
        .map_err(TransportError::from_read)?;

    let len = config.decode_len(prefix);
    config.check_len(len)?;

    let mut body = buffers.acquire();
    body.resize(len, 0);
    reader
        .read_exact(&mut body[..])
        .await
        .map_err(TransportError::from_read)?;
    Ok(body)
}

/// Read half of a framed connection.
pub struct FrameReader<R> {
    reader: R,
    config: FrameConfig,
    buffers: BufferPool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wraps a byte stream.
    pub fn new(reader: R, config: FrameConfig, buffers: BufferPool) -> Self {
        Self {
            reader,
            config,
            buffers,
        }
    }

    /// Waits for the next frame body.
    pub async fn read_msg(&mut self) -> Result<PooledBuffer, TransportError> {
        read_msg(&mut self.reader, &self.config, &self.buffers).await
    }

    /// The frame settings of this reader.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
