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

//! Byte-stream transports and framed connections.
//!
//! A [`Transport`] is any bi-directional byte stream that can describe itself
//! through [`TransportMetadata`]. Two implementations ship with the crate:
//!
//! - [`TcpTransport`]: TCP/IP networking, used by the server accept loop and
//!   by [`Client::connect`](crate::client::Client::connect)
//! - [`MemoryTransport`]: an in-process duplex pipe, used by tests
//!
//! [`connection::open`] turns a transport into a [`FrameReader`] and a
//! cloneable [`ConnWriter`]. All frames written through any clone of the
//! writer pass through one queue drained by a single writer task, so frames
//! from concurrently completing handlers never interleave on the wire.
//!
//! # Examples
//!
//! ```rust
//! use noderpc::transport::MemoryTransport;
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut client, mut server) = MemoryTransport::pair(1024);
//! client.write_all(b"Hello").await?;
//!
//! let mut buffer = [0u8; 5];
//! server.read_exact(&mut buffer).await?;
//! assert_eq!(&buffer, b"Hello");
//! # Ok(())
//! # }
//! ```
//!
//! [`FrameReader`]: crate::serialization::framing::FrameReader

pub mod connection;
mod error;
mod memory;
mod tcp;
mod traits;
mod types;

pub use connection::ConnWriter;
pub use error::TransportError;
pub use memory::MemoryTransport;
pub use tcp::TcpTransport;
pub use traits::Transport;
pub use types::{TransportId, TransportMetadata};
