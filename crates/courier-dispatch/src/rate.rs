// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window rate limiting per instance and channel kind.
//!
//! Minute and hour counters are bucketed by `floor(now/60s)` and
//! `floor(now/3600s)` in an expiring counter store, so counting needs no
//! locks and old windows clean themselves up. Fixed windows allow a burst
//! at the boundary (up to one ceiling at the end of a window plus one at
//! the start of the next); this is a known, accepted approximation.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use courier_config::model::{ChannelLimits, RatesConfig};
use courier_core::{ChannelKind, CounterStore, CourierError};

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;

/// Outcome of a rate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Come back after `wait`; `reason` names the exhausted constraint.
    Deferred { wait: Duration, reason: &'static str },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    rates: RatesConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, rates: RatesConfig) -> Self {
        Self { store, rates }
    }

    fn limits(&self, channel: ChannelKind) -> &ChannelLimits {
        match channel {
            ChannelKind::Bridge => &self.rates.bridge,
            ChannelKind::Cloud => &self.rates.cloud,
        }
    }

    /// May this instance send now? A rejection is not an error: the caller
    /// skips the instance this pass and retries next pass.
    pub async fn check(
        &self,
        instance_id: &str,
        channel: ChannelKind,
    ) -> Result<RateDecision, CourierError> {
        self.check_at(instance_id, channel, now_ms()).await
    }

    /// Account one send: bump both window counters and stamp the send time.
    pub async fn record_send(
        &self,
        instance_id: &str,
        channel: ChannelKind,
    ) -> Result<(), CourierError> {
        self.record_send_at(instance_id, channel, now_ms()).await
    }

    pub(crate) async fn check_at(
        &self,
        instance_id: &str,
        channel: ChannelKind,
        now_ms: i64,
    ) -> Result<RateDecision, CourierError> {
        let limits = self.limits(channel);

        if let Some(last) = self.store.get(&last_send_key(instance_id)).await? {
            let min_ms = limits.min_delay_secs as i64 * 1000;
            let elapsed = now_ms - last;
            if elapsed < min_ms {
                return Ok(RateDecision::Deferred {
                    wait: Duration::from_millis((min_ms - elapsed) as u64),
                    reason: "minimum inter-message delay",
                });
            }
        }

        let minute_bucket = now_ms / MINUTE_MS;
        let in_minute = self
            .store
            .get(&minute_key(instance_id, minute_bucket))
            .await?
            .unwrap_or(0);
        if in_minute >= i64::from(limits.per_minute) {
            let boundary = (minute_bucket + 1) * MINUTE_MS;
            return Ok(RateDecision::Deferred {
                wait: Duration::from_millis((boundary - now_ms) as u64),
                reason: "per-minute ceiling",
            });
        }

        let hour_bucket = now_ms / HOUR_MS;
        let in_hour = self
            .store
            .get(&hour_key(instance_id, hour_bucket))
            .await?
            .unwrap_or(0);
        if in_hour >= i64::from(limits.per_hour) {
            let boundary = (hour_bucket + 1) * HOUR_MS;
            return Ok(RateDecision::Deferred {
                wait: Duration::from_millis((boundary - now_ms) as u64),
                reason: "per-hour ceiling",
            });
        }

        Ok(RateDecision::Allowed)
    }

    pub(crate) async fn record_send_at(
        &self,
        instance_id: &str,
        channel: ChannelKind,
        now_ms: i64,
    ) -> Result<(), CourierError> {
        let limits = self.limits(channel);

        // TTLs of twice the window keep a bucket alive until it can no
        // longer influence a check.
        self.store
            .incr(
                &minute_key(instance_id, now_ms / MINUTE_MS),
                Duration::from_secs(120),
            )
            .await?;
        self.store
            .incr(
                &hour_key(instance_id, now_ms / HOUR_MS),
                Duration::from_secs(7200),
            )
            .await?;
        self.store
            .set(
                &last_send_key(instance_id),
                now_ms,
                Duration::from_secs(limits.min_delay_secs.max(1) * 2),
            )
            .await?;
        Ok(())
    }
}

fn minute_key(instance_id: &str, bucket: i64) -> String {
    format!("rate:{instance_id}:m:{bucket}")
}

fn hour_key(instance_id: &str, bucket: i64) -> String {
    format!("rate:{instance_id}:h:{bucket}")
}

fn last_send_key(instance_id: &str) -> String {
    format!("rate:{instance_id}:last")
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
