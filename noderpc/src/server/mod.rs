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

//! The serving side: configuration, per-connection agents, response
//! writing and the server itself.

mod agent;
mod config;
mod response;
mod server;

pub use agent::Agent;
pub use config::{ServerConfig, DEFAULT_LISTEN_ADDR, DEFAULT_MAX_CONN_NUM, DEFAULT_PENDING_WRITE_NUM};
pub use response::{write_response, PendingResponse};
pub use server::{Server, ServerHandle};
