// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instance lock operations.
//!
//! Every transition here is a single UPDATE guarded by the current status,
//! executed on the one writer thread — acquisition races resolve to exactly
//! one winner, and no read-then-write sequence ever spans an await point.

use courier_core::CourierError;
use rusqlite::{params, Row};

use crate::database::Database;
use crate::models::InstanceLock;

fn map_row(row: &Row<'_>) -> Result<InstanceLock, rusqlite::Error> {
    Ok(InstanceLock {
        instance_id: row.get(0)?,
        status: row.get(1)?,
        holder: row.get(2)?,
        reason: row.get(3)?,
        locked_at: row.get(4)?,
        error_count: row.get(5)?,
        last_error: row.get(6)?,
        last_success_at: row.get(7)?,
        send_count: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const COLUMNS: &str = "instance_id, status, holder, reason, locked_at, error_count, \
                       last_error, last_success_at, send_count, updated_at";

/// Read the lock state for an instance, if its row exists.
pub async fn get(db: &Database, instance_id: &str) -> Result<Option<InstanceLock>, CourierError> {
    let instance_id = instance_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM instance_locks WHERE instance_id = ?1"
            ))?;
            match stmt.query_row(params![instance_id], map_row) {
                Ok(lock) => Ok(Some(lock)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Try to take the lock. Succeeds only from FREE; returns whether this
/// caller won the race.
pub async fn acquire(
    db: &Database,
    instance_id: &str,
    holder: &str,
    reason: &str,
) -> Result<bool, CourierError> {
    let instance_id = instance_id.to_string();
    let holder = holder.to_string();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO instance_locks (instance_id) VALUES (?1)",
                params![instance_id],
            )?;
            let changed = conn.execute(
                "UPDATE instance_locks
                 SET status = 'BUSY', holder = ?2, reason = ?3,
                     locked_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE instance_id = ?1 AND status = 'FREE'",
                params![instance_id, holder, reason],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Release after a successful send: back to FREE, consecutive errors reset,
/// success stamped, cumulative send count bumped.
pub async fn release(db: &Database, instance_id: &str) -> Result<bool, CourierError> {
    let instance_id = instance_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE instance_locks
                 SET status = 'FREE', holder = NULL, reason = NULL, locked_at = NULL,
                     error_count = 0, last_error = NULL,
                     last_success_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     send_count = send_count + 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE instance_id = ?1 AND status = 'BUSY'",
                params![instance_id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Neutral unlock for fail-fast configuration errors: the instance did
/// nothing wrong, so neither the success stamp nor the error counter moves.
pub async fn unlock(db: &Database, instance_id: &str) -> Result<bool, CourierError> {
    let instance_id = instance_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE instance_locks
                 SET status = 'FREE', holder = NULL, reason = NULL, locked_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE instance_id = ?1 AND status = 'BUSY'",
                params![instance_id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a send failure while holding the lock.
///
/// Atomically increments the consecutive-error counter; at `threshold` the
/// lock trips to BLOCKED with `blocked_reason`, otherwise it returns to FREE
/// (preserving the count) so other work can proceed. Returns the resulting
/// status as stored.
pub async fn record_error(
    db: &Database,
    instance_id: &str,
    message: &str,
    threshold: u32,
    blocked_reason: &str,
) -> Result<Option<String>, CourierError> {
    let instance_id = instance_id.to_string();
    let message = message.to_string();
    let blocked_reason = blocked_reason.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE instance_locks
                 SET error_count = error_count + 1,
                     last_error = ?2,
                     status = CASE WHEN error_count + 1 >= ?3 THEN 'BLOCKED' ELSE 'FREE' END,
                     reason = CASE WHEN error_count + 1 >= ?3 THEN ?4 ELSE NULL END,
                     holder = NULL,
                     locked_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE instance_id = ?1 AND status = 'BUSY'",
                params![instance_id, message, threshold, blocked_reason],
            )?;
            match conn.query_row(
                "SELECT status FROM instance_locks WHERE instance_id = ?1",
                params![instance_id],
                |row| row.get::<_, String>(0),
            ) {
                Ok(status) => Ok(Some(status)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Administrative escape hatch: BLOCKED back to FREE, error state cleared.
pub async fn unblock(db: &Database, instance_id: &str) -> Result<bool, CourierError> {
    let instance_id = instance_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE instance_locks
                 SET status = 'FREE', holder = NULL, reason = NULL, locked_at = NULL,
                     error_count = 0, last_error = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE instance_id = ?1 AND status = 'BLOCKED'",
                params![instance_id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Forcibly free every BUSY lock whose `locked_at` is older than `cutoff`
/// (an ISO timestamp). This is the deadlock-avoidance path for crashed or
/// hung senders; returns how many locks were reclaimed.
pub async fn sweep_stale(db: &Database, cutoff: &str) -> Result<usize, CourierError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE instance_locks
                 SET status = 'FREE', holder = NULL, reason = NULL, locked_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE status = 'BUSY' AND locked_at IS NOT NULL AND locked_at <= ?1",
                params![cutoff],
            )?;
            Ok(changed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
