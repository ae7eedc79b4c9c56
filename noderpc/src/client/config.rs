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

//! Client configuration.

use crate::pool::DEFAULT_MAX_IDLE;
use crate::serialization::framing::FrameConfig;
use std::time::Duration;

/// Default time a call may stay pending.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default period of the expiry sweep.
pub const DEFAULT_EXPIRY_INTERVAL: Duration = Duration::from_secs(1);

/// Default depth of the client's write queue, in frames.
pub const DEFAULT_CLIENT_PENDING_WRITE_NUM: usize = 4096;

/// Settings of a [`Client`](crate::client::Client).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Frame layout; must match the server's.
    pub frame: FrameConfig,
    /// Frames that may be queued before the connection is closed.
    pub pending_write_num: usize,
    /// How long a call may stay pending. `None` disables expiry.
    pub call_timeout: Option<Duration>,
    /// Period of the sweep started by
    /// [`spawn_expiry_task`](crate::client::Client::spawn_expiry_task).
    pub expiry_interval: Duration,
    /// Idle calls kept for reuse.
    pub max_idle_calls: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            pending_write_num: DEFAULT_CLIENT_PENDING_WRITE_NUM,
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
            expiry_interval: DEFAULT_EXPIRY_INTERVAL,
            max_idle_calls: DEFAULT_MAX_IDLE,
        }
    }
}

impl ClientConfig {
    /// Sets the frame layout.
    #[must_use]
    pub fn with_frame(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    /// Sets the write queue depth.
    #[must_use]
    pub fn with_pending_write_num(mut self, pending_write_num: usize) -> Self {
        self.pending_write_num = pending_write_num;
        self
    }

    /// Sets, or with `None` disables, the call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Option<Duration>) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Sets the expiry sweep period.
    #[must_use]
    pub fn with_expiry_interval(mut self, expiry_interval: Duration) -> Self {
        self.expiry_interval = expiry_interval;
        self
    }

    /// Sets how many idle calls are kept.
    #[must_use]
    pub fn with_max_idle_calls(mut self, max_idle_calls: usize) -> Self {
        self.max_idle_calls = max_idle_calls;
        self
    }
}
