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

//! A thread-safe handler directory.

use crate::handler::{HandlerFinder, RpcHandler};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Handlers addressable by name.
///
/// # Examples
///
/// ```rust
/// use noderpc::handler::{HandlerFinder, HandlerRegistry, QueuedHandler};
/// use noderpc::processor::Payload;
/// use noderpc::rpc::RpcError;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = HandlerRegistry::new();
/// let echo = QueuedHandler::spawn("Echo", |_method: &str, args: Payload| {
///     Ok::<_, RpcError>(Some(args))
/// });
/// registry.register(echo);
/// assert!(registry.find_rpc_handler("Echo").is_some());
/// assert!(registry.find_rpc_handler("Ghost").is_none());
/// # }
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn RpcHandler>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under its name, returning the handler it replaces.
    pub fn register(&self, handler: Arc<dyn RpcHandler>) -> Option<Arc<dyn RpcHandler>> {
        let name = handler.name().to_string();
        info!(handler = %name, "rpc handler registered");
        self.handlers.write().insert(name, handler)
    }

    /// Removes the handler registered as `name`.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn RpcHandler>> {
        self.handlers.write().remove(name)
    }

    /// Names of all registered handlers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns `true` if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl HandlerFinder for HandlerRegistry {
    fn find_rpc_handler(&self, name: &str) -> Option<Arc<dyn RpcHandler>> {
        self.handlers.read().get(name).cloned()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
