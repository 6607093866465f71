// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instance lock service: mutual exclusion plus circuit breaking on top of
//! the lock rows in storage.

use std::str::FromStr;

use courier_config::model::LockConfig;
use courier_core::{CourierError, LockStatus};
use courier_storage::queries::locks;
use courier_storage::{iso_before_secs, Database, InstanceLock};

pub struct LockService {
    db: Database,
    config: LockConfig,
}

impl LockService {
    pub fn new(db: Database, config: LockConfig) -> Self {
        Self { db, config }
    }

    /// Take the send lock for an instance. Only one holder wins.
    pub async fn acquire(
        &self,
        instance_id: &str,
        holder: &str,
        reason: &str,
    ) -> Result<bool, CourierError> {
        locks::acquire(&self.db, instance_id, holder, reason).await
    }

    /// Release after a successful send.
    pub async fn release(&self, instance_id: &str) -> Result<bool, CourierError> {
        locks::release(&self.db, instance_id).await
    }

    /// Release without recording success or failure. Used when the send was
    /// aborted for reasons that are not the instance's fault (configuration
    /// errors, lost claim races).
    pub async fn unlock(&self, instance_id: &str) -> Result<bool, CourierError> {
        locks::unlock(&self.db, instance_id).await
    }

    /// Record a send failure. At the configured threshold the instance
    /// trips to BLOCKED and dispatch to it stops until a manual unblock.
    pub async fn record_error(
        &self,
        instance_id: &str,
        message: &str,
    ) -> Result<LockStatus, CourierError> {
        let threshold = self.config.max_consecutive_errors;
        let reason = format!("blocked after {threshold} consecutive send failures");
        let status = locks::record_error(&self.db, instance_id, message, threshold, &reason)
            .await?
            .unwrap_or_else(|| LockStatus::Free.to_string());
        LockStatus::from_str(&status)
            .map_err(|_| CourierError::Internal(format!("unknown lock status {status:?}")))
    }

    /// Administrative escape from BLOCKED.
    pub async fn unblock(&self, instance_id: &str) -> Result<bool, CourierError> {
        let unblocked = locks::unblock(&self.db, instance_id).await?;
        if unblocked {
            tracing::info!(%instance_id, "instance unblocked");
        }
        Ok(unblocked)
    }

    /// Reclaim BUSY locks older than the staleness window. Bounds lock
    /// starvation from crashed or hung senders.
    pub async fn sweep_stale(&self) -> Result<usize, CourierError> {
        let cutoff = iso_before_secs(self.config.stale_after_secs);
        let swept = locks::sweep_stale(&self.db, &cutoff).await?;
        if swept > 0 {
            tracing::warn!(count = swept, "reclaimed stale instance locks");
        }
        Ok(swept)
    }

    /// Current lock row, if the instance has ever been locked.
    pub async fn status(&self, instance_id: &str) -> Result<Option<InstanceLock>, CourierError> {
        locks::get(&self.db, instance_id).await
    }

    /// Whether dispatch may even consider this instance: no lock row yet or
    /// a FREE one.
    pub async fn is_free(&self, instance_id: &str) -> Result<bool, CourierError> {
        Ok(match self.status(instance_id).await? {
            Some(lock) => lock.status == LockStatus::Free.to_string(),
            None => true,
        })
    }
}
