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

//! The hand-off boundary between the runtime and business logic.
//!
//! The runtime finds handlers through a [`HandlerFinder`] and gives them
//! work through [`RpcHandler`]. [`HandlerRegistry`] and [`QueuedHandler`]
//! are ready-made implementations; anything else that honours the traits
//! works too.

mod queue;
mod registry;
mod traits;

pub use queue::{QueueConfig, QueuedHandler, Service, DEFAULT_REQUEST_QUEUE_LEN};
pub use registry::HandlerRegistry;
pub use traits::{HandlerFinder, PushError, RpcHandler};
