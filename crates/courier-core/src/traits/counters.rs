// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Expiring-key counter store used for rate accounting.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CourierError;

/// A shared low-latency store of expiring integer keys.
///
/// The rate limiter keeps its time-bucketed counters and last-send
/// timestamps here. Keys expire on their own, which is what makes the
/// fixed-window counting lock-free: a bucket key simply vanishes once its
/// window is old enough.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    /// Atomically increments `key` by one and returns the new value.
    /// Sets (or refreshes) the key's expiry to `ttl`.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, CourierError>;

    /// Reads the current value of `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<i64>, CourierError>;

    /// Stores an absolute value under `key` with the given expiry.
    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CourierError>;
}
