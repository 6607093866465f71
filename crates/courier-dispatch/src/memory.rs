// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process expiring counter store.
//!
//! Backs the rate limiter when no external store is deployed. Expiry is
//! lazy: a key is purged when touched after its deadline, and whole-map
//! sweeps happen opportunistically on insert.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use courier_core::{CounterStore, CourierError};

struct Entry {
    value: i64,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, Entry>>,
}

// Whole-map sweeps run once the map outgrows this.
const SWEEP_THRESHOLD: usize = 1024;

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, CourierError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("counter store lock poisoned");
        if entries.len() > SWEEP_THRESHOLD {
            entries.retain(|_, e| e.expires_at > now);
        }

        let entry = entries
            .entry(key.to_string())
            .and_modify(|e| {
                if e.expires_at <= now {
                    e.value = 0;
                }
            })
            .or_insert(Entry { value: 0, expires_at: now });
        entry.value += 1;
        entry.expires_at = now + ttl;
        Ok(entry.value)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, CourierError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("counter store lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value)),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CourierError> {
        let mut entries = self.entries.lock().expect("counter store lock poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}
