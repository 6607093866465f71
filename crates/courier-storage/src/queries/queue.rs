// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send queue operations.
//!
//! Items move WAITING/SCHEDULED -> PROCESSING -> COMPLETED/FAILED, with
//! CANCELLED reachable from the two pre-dispatch states. Claiming is a CAS
//! on the status column, so two dispatch passes can never pick up the same
//! item.

use courier_core::CourierError;
use rusqlite::{params, Row};

use crate::database::Database;
use crate::models::SendQueueItem;

fn map_row(row: &Row<'_>) -> Result<SendQueueItem, rusqlite::Error> {
    Ok(SendQueueItem {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        instance_id: row.get(2)?,
        recipient: row.get(3)?,
        content: row.get(4)?,
        priority: row.get(5)?,
        status: row.get(6)?,
        attempts: row.get(7)?,
        max_attempts: row.get(8)?,
        scheduled_for: row.get(9)?,
        next_attempt_at: row.get(10)?,
        last_error: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

const COLUMNS: &str = "id, tenant_id, instance_id, recipient, content, priority, status, \
                       attempts, max_attempts, scheduled_for, next_attempt_at, last_error, \
                       created_at, updated_at";

/// Insert a new queue item. Items with a `scheduled_for` stamp enter as
/// SCHEDULED, everything else as WAITING.
pub async fn insert(db: &Database, item: &SendQueueItem) -> Result<(), CourierError> {
    let item = item.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO send_queue
                 (id, tenant_id, instance_id, recipient, content, priority, status,
                  max_attempts, scheduled_for)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    item.id,
                    item.tenant_id,
                    item.instance_id,
                    item.recipient,
                    item.content,
                    item.priority,
                    item.status,
                    item.max_attempts,
                    item.scheduled_for,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<SendQueueItem>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM send_queue WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], map_row) {
                Ok(item) => Ok(Some(item)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The next item an instance is due to send at `now` (ISO timestamp):
/// WAITING, or SCHEDULED whose time has come, ordered by priority then age,
/// honouring any retry backoff stamp.
pub async fn next_eligible(
    db: &Database,
    instance_id: &str,
    now: &str,
) -> Result<Option<SendQueueItem>, CourierError> {
    let instance_id = instance_id.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM send_queue
                 WHERE instance_id = ?1
                   AND (status = 'WAITING'
                        OR (status = 'SCHEDULED' AND scheduled_for <= ?2))
                   AND (next_attempt_at IS NULL OR next_attempt_at <= ?2)
                 ORDER BY priority DESC, created_at
                 LIMIT 1"
            ))?;
            match stmt.query_row(params![instance_id, now], map_row) {
                Ok(item) => Ok(Some(item)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Move an item to PROCESSING and bump its attempt counter. Returns false
/// if another worker got there first or the item was cancelled meanwhile.
pub async fn claim(db: &Database, id: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE send_queue
                 SET status = 'PROCESSING', attempts = attempts + 1,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status IN ('WAITING', 'SCHEDULED')",
                params![id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Terminal success.
pub async fn complete(db: &Database, id: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE send_queue
                 SET status = 'COMPLETED', last_error = NULL, next_attempt_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'PROCESSING'",
                params![id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Put a failed item back into WAITING with a not-before stamp for the next
/// try. The attempt already counted when the item was claimed.
pub async fn reschedule(
    db: &Database,
    id: &str,
    error: &str,
    next_attempt_at: &str,
) -> Result<bool, CourierError> {
    let id = id.to_string();
    let error = error.to_string();
    let next_attempt_at = next_attempt_at.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE send_queue
                 SET status = 'WAITING', last_error = ?2, next_attempt_at = ?3,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'PROCESSING'",
                params![id, error, next_attempt_at],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Terminal failure once the attempt budget is spent.
pub async fn fail_permanently(db: &Database, id: &str, error: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE send_queue
                 SET status = 'FAILED', last_error = ?2, next_attempt_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'PROCESSING'",
                params![id, error],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Cancel an item that has not been dispatched yet. In-flight and terminal
/// items are untouchable.
pub async fn cancel(db: &Database, id: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE send_queue
                 SET status = 'CANCELLED',
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status IN ('WAITING', 'SCHEDULED')",
                params![id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Re-arm a FAILED or CANCELLED item: back to WAITING with a fresh attempt
/// budget.
pub async fn retry(db: &Database, id: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE send_queue
                 SET status = 'WAITING', attempts = 0, last_error = NULL,
                     next_attempt_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status IN ('FAILED', 'CANCELLED')",
                params![id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List an instance's queue items in a given status, newest first.
pub async fn list_by_status(
    db: &Database,
    instance_id: &str,
    status: &str,
    limit: u32,
) -> Result<Vec<SendQueueItem>, CourierError> {
    let instance_id = instance_id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM send_queue
                 WHERE instance_id = ?1 AND status = ?2
                 ORDER BY created_at DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![instance_id, status, limit], map_row)?;
            let mut items = Vec::new();
            for row in rows {
                items.push(row?);
            }
            Ok(items)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
