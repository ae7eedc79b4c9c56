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

//! The transport trait.

use crate::transport::TransportMetadata;
use tokio::io::{AsyncRead, AsyncWrite};

/// A bi-directional byte stream that frames can be carried over.
///
/// Implementors only move bytes; frame boundaries and write serialization are
/// added by [`connection::open`](crate::transport::connection::open).
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Describes the transport.
    fn metadata(&self) -> &TransportMetadata;
}
