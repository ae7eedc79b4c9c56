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

//! Object pooling with move-only handles.
//!
//! Frame buffers, inbound requests and outstanding calls are recycled through
//! a [`Pool`]. Acquiring returns a [`Pooled`] handle that dereferences to the
//! pooled value; dropping the handle resets the value and returns it to the
//! idle list. Because the handle cannot be copied, an object is released
//! exactly once and can never be read after it went back to the pool.
//!
//! # Example
//!
//! ```rust
//! use noderpc::pool::Pool;
//!
//! let pool: Pool<Vec<u8>> = Pool::new(8);
//! {
//!     let mut buffer = pool.acquire();
//!     buffer.extend_from_slice(b"hello");
//!     assert_eq!(pool.outstanding(), 1);
//! }
//! assert_eq!(pool.outstanding(), 0);
//! assert!(pool.acquire().is_empty());
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of idle objects a pool keeps around.
pub const DEFAULT_MAX_IDLE: usize = 1024;

/// Buffers that grew beyond this capacity are freed instead of pooled.
const MAX_POOLED_BUFFER_CAPACITY: usize = 128 * 1024;

/// A value that can be recycled through a [`Pool`].
pub trait Poolable: Default + Send + 'static {
    /// Clears all per-use state before the value is handed out again.
    fn reset(&mut self);

    /// Returns `false` if the value should be freed rather than kept idle.
    fn retain(&self) -> bool {
        true
    }
}

impl Poolable for Vec<u8> {
    fn reset(&mut self) {
        self.clear();
    }

    fn retain(&self) -> bool {
        self.capacity() <= MAX_POOLED_BUFFER_CAPACITY
    }
}

struct PoolInner<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
    acquired: AtomicU64,
    released: AtomicU64,
    allocated: AtomicU64,
}

impl<T: Poolable> PoolInner<T> {
    fn take(&self) -> T {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        if let Some(value) = self.idle.lock().pop() {
            return value;
        }
        self.allocated.fetch_add(1, Ordering::Relaxed);
        T::default()
    }

    fn give_back(&self, mut value: T) {
        value.reset();
        self.released.fetch_add(1, Ordering::Relaxed);
        if !value.retain() {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(value);
        }
    }
}

/// Snapshot of a pool's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Handles handed out since the pool was created.
    pub acquired: u64,
    /// Handles returned since the pool was created.
    pub released: u64,
    /// Values freshly constructed because the idle list was empty.
    pub allocated: u64,
    /// Values currently sitting in the idle list.
    pub idle: usize,
}

impl PoolStats {
    /// Handles currently held by callers.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// A thread-safe pool of reusable values.
///
/// Cloning a `Pool` yields another handle to the same idle list.
pub struct Pool<T: Poolable> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Poolable> Pool<T> {
    /// Creates a pool that keeps at most `max_idle` values between uses.
    #[must_use]
    pub fn new(max_idle: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(Vec::new()),
                max_idle,
                acquired: AtomicU64::new(0),
                released: AtomicU64::new(0),
                allocated: AtomicU64::new(0),
            }),
        }
    }

    /// Takes a value from the idle list, or constructs a fresh one.
    #[must_use]
    pub fn acquire(&self) -> Pooled<T> {
        Pooled {
            item: self.inner.take(),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of handles acquired but not yet released.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.stats().outstanding()
    }

    /// Returns the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            acquired: self.inner.acquired.load(Ordering::Relaxed),
            released: self.inner.released.load(Ordering::Relaxed),
            allocated: self.inner.allocated.load(Ordering::Relaxed),
            idle: self.inner.idle.lock().len(),
        }
    }
}

impl<T: Poolable> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

impl<T: Poolable> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("max_idle", &self.inner.max_idle)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Move-only handle to a pooled value. Dropping it releases the value.
pub struct Pooled<T: Poolable> {
    item: T,
    pool: Arc<PoolInner<T>>,
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Poolable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.item));
    }
}

impl<T: Poolable + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.item.fmt(f)
    }
}

/// Pool of frame buffers.
pub type BufferPool = Pool<Vec<u8>>;

/// A frame buffer borrowed from a [`BufferPool`].
pub type PooledBuffer = Pooled<Vec<u8>>;
