// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send queue surface and the dispatch worker.
//!
//! [`QueueService`] is the enqueue/cancel/retry API offered to the outer
//! layers; [`QueueDispatcher`] is the periodic worker that drains the queue
//! one item per FREE, CONNECTED, rate-clear instance per pass.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use courier_config::model::DispatchConfig;
use courier_core::{
    AdapterSource, ChannelKind, CourierError, OutboundContent, QueueStatus,
};
use courier_storage::queries::{instances, logs, queue};
use courier_storage::{iso_after_secs, now_iso, Database, Instance, MessageLog, SendQueueItem};

use crate::lock::LockService;
use crate::rate::{RateDecision, RateLimiter};

const LOCK_HOLDER: &str = "queue-dispatcher";

/// A single outbound message handed to `enqueue_send`.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub tenant_id: String,
    pub instance_id: String,
    pub recipient: String,
    pub content: OutboundContent,
    pub priority: i64,
    /// Defer dispatch until this ISO timestamp.
    pub scheduled_for: Option<String>,
    /// Attempt budget; defaults to the dispatcher's configured budget.
    pub max_attempts: Option<u32>,
}

/// Queue operations exposed to the surrounding HTTP layer.
pub struct QueueService {
    db: Database,
    defaults: DispatchConfig,
}

impl QueueService {
    pub fn new(db: Database, defaults: DispatchConfig) -> Self {
        Self { db, defaults }
    }

    /// Persist a send request; returns the queue item id.
    pub async fn enqueue_send(&self, request: SendRequest) -> Result<String, CourierError> {
        let status = if request.scheduled_for.is_some() {
            QueueStatus::Scheduled
        } else {
            QueueStatus::Waiting
        };
        let item = SendQueueItem {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: request.tenant_id,
            instance_id: request.instance_id,
            recipient: request.recipient,
            content: serde_json::to_string(&request.content)
                .map_err(|e| CourierError::Internal(format!("unserializable content: {e}")))?,
            priority: request.priority,
            status: status.to_string(),
            attempts: 0,
            max_attempts: i64::from(request.max_attempts.unwrap_or(self.defaults.max_attempts)),
            scheduled_for: request.scheduled_for,
            next_attempt_at: None,
            last_error: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        queue::insert(&self.db, &item).await?;
        tracing::debug!(item_id = %item.id, instance_id = %item.instance_id, "send enqueued");
        Ok(item.id)
    }

    /// Cancel an undispatched item.
    pub async fn cancel_item(&self, id: &str) -> Result<bool, CourierError> {
        queue::cancel(&self.db, id).await
    }

    /// Re-arm a FAILED or CANCELLED item with a fresh attempt budget.
    pub async fn retry_item(&self, id: &str) -> Result<bool, CourierError> {
        queue::retry(&self.db, id).await
    }

    pub async fn item(&self, id: &str) -> Result<Option<SendQueueItem>, CourierError> {
        queue::get(&self.db, id).await
    }

    pub async fn list(
        &self,
        instance_id: &str,
        status: QueueStatus,
        limit: u32,
    ) -> Result<Vec<SendQueueItem>, CourierError> {
        queue::list_by_status(&self.db, instance_id, &status.to_string(), limit).await
    }
}

/// The periodic send worker.
pub struct QueueDispatcher {
    db: Database,
    locks: Arc<LockService>,
    limiter: Arc<RateLimiter>,
    adapters: Arc<dyn AdapterSource>,
    config: DispatchConfig,
}

impl QueueDispatcher {
    pub fn new(
        db: Database,
        locks: Arc<LockService>,
        limiter: Arc<RateLimiter>,
        adapters: Arc<dyn AdapterSource>,
        config: DispatchConfig,
    ) -> Self {
        Self { db, locks, limiter, adapters, config }
    }

    /// Poll loop; one dispatch pass per tick until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(error) = self.dispatch_pass().await {
                        tracing::error!(%error, "dispatch pass failed");
                    }
                }
            }
        }
        tracing::info!("queue dispatcher stopped");
    }

    /// Slower companion loop reclaiming stale BUSY locks.
    pub async fn run_sweeper(&self, cancel: CancellationToken) {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.sweep_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(error) = self.locks.sweep_stale().await {
                        tracing::error!(%error, "lock sweep failed");
                    }
                }
            }
        }
        tracing::info!("lock sweeper stopped");
    }

    /// One pass over every CONNECTED instance; at most one send each.
    /// Returns how many items were dispatched.
    pub async fn dispatch_pass(&self) -> Result<usize, CourierError> {
        let connected = instances::list_connected(&self.db).await?;
        let mut dispatched = 0;
        for instance in connected {
            // Failures are isolated per instance so one broken row cannot
            // stall the rest of the fleet.
            match self.dispatch_for(&instance).await {
                Ok(true) => dispatched += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::error!(instance_id = %instance.id, %error, "instance dispatch failed");
                }
            }
        }
        Ok(dispatched)
    }

    async fn dispatch_for(&self, instance: &Instance) -> Result<bool, CourierError> {
        let Ok(channel) = ChannelKind::from_str(&instance.channel) else {
            tracing::warn!(instance_id = %instance.id, channel = %instance.channel, "unknown channel kind");
            return Ok(false);
        };

        if !self.locks.is_free(&instance.id).await? {
            return Ok(false);
        }

        // A rate deferral is not an error; the item is naturally retried
        // next pass.
        if let RateDecision::Deferred { wait, reason } =
            self.limiter.check(&instance.id, channel).await?
        {
            tracing::trace!(instance_id = %instance.id, ?wait, reason, "rate limited, skipping");
            return Ok(false);
        }

        let Some(item) = queue::next_eligible(&self.db, &instance.id, &now_iso()).await? else {
            return Ok(false);
        };

        if !self.locks.acquire(&instance.id, LOCK_HOLDER, &item.id).await? {
            // Lost the acquisition race; next pass will retry.
            return Ok(false);
        }
        if !queue::claim(&self.db, &item.id).await? {
            self.locks.unlock(&instance.id).await?;
            return Ok(false);
        }

        self.process(instance, channel, item).await?;
        Ok(true)
    }

    /// Send one claimed item while holding the instance lock.
    async fn process(
        &self,
        instance: &Instance,
        channel: ChannelKind,
        item: SendQueueItem,
    ) -> Result<(), CourierError> {
        let attempts = item.attempts + 1;
        let log_id = uuid::Uuid::new_v4().to_string();
        logs::insert(
            &self.db,
            &MessageLog {
                id: log_id.clone(),
                queue_item_id: Some(item.id.clone()),
                instance_id: instance.id.clone(),
                recipient: item.recipient.clone(),
                status: String::new(),
                error: None,
                external_message_id: None,
                duration_ms: None,
                created_at: String::new(),
            },
        )
        .await?;

        let content: OutboundContent = match serde_json::from_str(&item.content) {
            Ok(content) => content,
            Err(error) => {
                return self
                    .fail_fast(instance, &item, &log_id, &format!("undecodable content: {error}"))
                    .await;
            }
        };

        // The cloud provider only accepts pre-approved templates for
        // business-initiated messages. Anything else is a configuration
        // error: fail fast, never retried, no strike against the instance.
        if channel == ChannelKind::Cloud && !matches!(content, OutboundContent::Template { .. }) {
            return self
                .fail_fast(instance, &item, &log_id, "cloud channel requires a template message")
                .await;
        }

        let started = Instant::now();
        let result = match self.adapters.adapter_for(&instance.id) {
            Some(adapter) => adapter.send(&item.recipient, &content).await,
            None => Err(CourierError::AdapterNotFound { instance: instance.id.clone() }),
        };
        let elapsed_ms = started.elapsed().as_millis() as i64;

        match result {
            Ok(receipt) => {
                self.limiter.record_send(&instance.id, channel).await?;
                logs::mark_sent(&self.db, &log_id, Some(&receipt.external_message_id), elapsed_ms)
                    .await?;
                queue::complete(&self.db, &item.id).await?;
                self.locks.release(&instance.id).await?;
                tracing::info!(
                    item_id = %item.id,
                    instance_id = %instance.id,
                    external_id = %receipt.external_message_id,
                    elapsed_ms,
                    "message sent"
                );
            }
            Err(error) => {
                let message = error.to_string();
                logs::mark_failed(&self.db, &log_id, &message, elapsed_ms).await?;
                let lock_status = self.locks.record_error(&instance.id, &message).await?;

                if attempts >= item.max_attempts {
                    queue::fail_permanently(&self.db, &item.id, &message).await?;
                    tracing::warn!(
                        item_id = %item.id,
                        instance_id = %instance.id,
                        attempts,
                        %message,
                        "send failed permanently"
                    );
                } else {
                    let backoff = (self.config.backoff_base_secs * attempts as u64)
                        .min(self.config.backoff_cap_secs);
                    queue::reschedule(&self.db, &item.id, &message, &iso_after_secs(backoff))
                        .await?;
                    tracing::warn!(
                        item_id = %item.id,
                        instance_id = %instance.id,
                        attempts,
                        backoff_secs = backoff,
                        ?lock_status,
                        %message,
                        "send failed, rescheduled"
                    );
                }
            }
        }
        Ok(())
    }

    /// Terminal configuration failure: the instance did nothing wrong, so
    /// the lock is released neutrally and no retry is scheduled.
    async fn fail_fast(
        &self,
        instance: &Instance,
        item: &SendQueueItem,
        log_id: &str,
        message: &str,
    ) -> Result<(), CourierError> {
        logs::mark_failed(&self.db, log_id, message, 0).await?;
        queue::fail_permanently(&self.db, &item.id, message).await?;
        self.locks.unlock(&instance.id).await?;
        tracing::warn!(item_id = %item.id, instance_id = %instance.id, %message, "configuration error, not retried");
        Ok(())
    }
}
