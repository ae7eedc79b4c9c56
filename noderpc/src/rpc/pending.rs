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

//! The pending-call table.
//!
//! Maps the sequence number of every outstanding call to its [`Call`]. The
//! table is shared between the thread that issues calls and every context
//! that may complete one (connection read loops, handler tasks, the expiry
//! sweep), so all operations are synchronous and take a short lock.
//!
//! A sequence number is live from [`add_pending`](PendingCalls::add_pending)
//! until exactly one [`remove_pending`](PendingCalls::remove_pending). A
//! second removal finds nothing; callers treat that as a correlation error.

use crate::rpc::{Call, PooledCall};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    call: PooledCall,
    registered_at: Instant,
}

/// Sequence generator plus the map of outstanding calls.
pub struct PendingCalls {
    next_seq: AtomicU64,
    calls: Mutex<HashMap<u64, Entry>>,
}

impl PendingCalls {
    /// Creates an empty table whose first sequence number is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(1),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the next sequence number. Never returns 0.
    pub fn generate_seq(&self) -> u64 {
        loop {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            if seq != 0 {
                return seq;
            }
        }
    }

    /// Registers `call` under its sequence number.
    ///
    /// Gives the call back if that sequence number is already live.
    pub fn add_pending(&self, call: PooledCall) -> Result<(), PooledCall> {
        let seq = call.seq();
        let mut calls = self.calls.lock();
        if calls.contains_key(&seq) {
            return Err(call);
        }
        calls.insert(
            seq,
            Entry {
                call,
                registered_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Takes the call registered under `seq` out of the table.
    pub fn remove_pending(&self, seq: u64) -> Option<PooledCall> {
        self.calls.lock().remove(&seq).map(|entry| entry.call)
    }

    /// Returns `true` if `seq` is outstanding.
    pub fn contains(&self, seq: u64) -> bool {
        self.calls.lock().contains_key(&seq)
    }

    /// Number of outstanding calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns `true` if nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Removes every call pending for at least `ttl`, with its age.
    pub fn expire(&self, ttl: Duration) -> Vec<(PooledCall, Duration)> {
        let now = Instant::now();
        let mut calls = self.calls.lock();
        let expired: Vec<u64> = calls
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.registered_at) >= ttl)
            .map(|(seq, _)| *seq)
            .collect();
        expired
            .into_iter()
            .filter_map(|seq| calls.remove(&seq))
            .map(|entry| {
                let age = now.saturating_duration_since(entry.registered_at);
                (entry.call, age)
            })
            .collect()
    }

    /// Removes every outstanding call.
    pub fn drain(&self) -> Vec<PooledCall> {
        self.calls.lock().drain().map(|(_, entry)| entry.call).collect()
    }

    /// Applies `f` to the call registered under `seq` without removing it.
    pub fn inspect<R>(&self, seq: u64, f: impl FnOnce(&Call) -> R) -> Option<R> {
        self.calls.lock().get(&seq).map(|entry| f(&entry.call))
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PendingCalls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCalls")
            .field("next_seq", &self.next_seq.load(Ordering::Relaxed))
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Pool;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn call(pool: &Pool<Call>, seq: u64) -> PooledCall {
        let mut call = pool.acquire();
        call.seq = seq;
        call
    }

    #[test]
    fn test_sequences_start_at_one() {
        let pending = PendingCalls::new();
        assert_eq!(pending.generate_seq(), 1);
        assert_eq!(pending.generate_seq(), 2);
    }

    #[test]
    fn test_sequence_zero_is_skipped_on_wrap() {
        let pending = PendingCalls::new();
        pending.next_seq.store(u64::MAX, Ordering::Relaxed);
        assert_eq!(pending.generate_seq(), u64::MAX);
        assert_eq!(pending.generate_seq(), 1);
    }

    #[test]
    fn test_concurrent_sequences_are_unique() {
        let pending = Arc::new(PendingCalls::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let pending = Arc::clone(&pending);
                std::thread::spawn(move || {
                    (0..1000).map(|_| pending.generate_seq()).collect::<Vec<_>>()
                })
            })
            .collect();
        let mut seen = HashSet::new();
        for thread in threads {
            for seq in thread.join().unwrap() {
                assert!(seen.insert(seq), "duplicate seq {}", seq);
            }
        }
        assert_eq!(seen.len(), 8000);
    }

    #[test]
    fn test_remove_is_exactly_once() {
        let pool: Pool<Call> = Pool::new(4);
        let pending = PendingCalls::new();
        pending.add_pending(call(&pool, 3)).unwrap();
        assert!(pending.contains(3));

        let removed = pending.remove_pending(3).unwrap();
        assert_eq!(removed.seq(), 3);
        assert!(pending.remove_pending(3).is_none());
        drop(removed);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_duplicate_registration_is_refused() {
        let pool: Pool<Call> = Pool::new(4);
        let pending = PendingCalls::new();
        pending.add_pending(call(&pool, 8)).unwrap();
        let rejected = pending.add_pending(call(&pool, 8)).unwrap_err();
        assert_eq!(rejected.seq(), 8);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_expire_only_old_calls() {
        let pool: Pool<Call> = Pool::new(4);
        let pending = PendingCalls::new();
        pending.add_pending(call(&pool, 1)).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        pending.add_pending(call(&pool, 2)).unwrap();

        let expired = pending.expire(Duration::from_millis(20));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0.seq(), 1);
        assert!(expired[0].1 >= Duration::from_millis(20));
        assert!(pending.contains(2));
        assert_eq!(pending.inspect(2, |call| call.seq()), Some(2));
    }

    #[test]
    fn test_drain_empties_the_table() {
        let pool: Pool<Call> = Pool::new(4);
        let pending = PendingCalls::new();
        for seq in 1..=3 {
            pending.add_pending(call(&pool, seq)).unwrap();
        }
        let drained = pending.drain();
        assert_eq!(drained.len(), 3);
        assert!(pending.is_empty());
    }
}
