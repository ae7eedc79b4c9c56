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

//! Requests, calls and their correlation.
//!
//! - [`RpcRequest`]: what a handler receives, from a peer or a local caller
//! - [`Call`]: what a local caller holds while a request is outstanding
//! - [`PendingCalls`]: sequence numbers of outstanding calls, mapped to calls
//! - [`RpcError`]: everything that can go wrong along the way

mod call;
mod error;
mod pending;
mod request;

pub use call::{Call, CallCallback, CallHandle, PooledCall};
pub(crate) use call::deliver;
pub use error::{ErrorKind, RpcError};
pub use pending::PendingCalls;
pub(crate) use request::{Completion, LocalCompletion};
pub use request::{RequestPool, RpcRequest};
