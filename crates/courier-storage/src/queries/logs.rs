// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log operations. A log row starts PENDING at the moment the
//! dispatcher hands the content to an adapter and is finalised exactly once.

use courier_core::CourierError;
use rusqlite::{params, Row};

use crate::database::Database;
use crate::models::MessageLog;

fn map_row(row: &Row<'_>) -> Result<MessageLog, rusqlite::Error> {
    Ok(MessageLog {
        id: row.get(0)?,
        queue_item_id: row.get(1)?,
        instance_id: row.get(2)?,
        recipient: row.get(3)?,
        status: row.get(4)?,
        error: row.get(5)?,
        external_message_id: row.get(6)?,
        duration_ms: row.get(7)?,
        created_at: row.get(8)?,
    })
}

const COLUMNS: &str = "id, queue_item_id, instance_id, recipient, status, error, \
                       external_message_id, duration_ms, created_at";

/// Record the start of a send attempt.
pub async fn insert(db: &Database, log: &MessageLog) -> Result<(), CourierError> {
    let log = log.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO message_logs (id, queue_item_id, instance_id, recipient, status)
                 VALUES (?1, ?2, ?3, ?4, 'PENDING')",
                params![log.id, log.queue_item_id, log.instance_id, log.recipient],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Finalise a PENDING log entry as SENT.
pub async fn mark_sent(
    db: &Database,
    id: &str,
    external_message_id: Option<&str>,
    duration_ms: i64,
) -> Result<bool, CourierError> {
    let id = id.to_string();
    let external_message_id = external_message_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE message_logs
                 SET status = 'SENT', external_message_id = ?2, duration_ms = ?3
                 WHERE id = ?1 AND status = 'PENDING'",
                params![id, external_message_id, duration_ms],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Finalise a PENDING log entry as FAILED.
pub async fn mark_failed(
    db: &Database,
    id: &str,
    error: &str,
    duration_ms: i64,
) -> Result<bool, CourierError> {
    let id = id.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE message_logs
                 SET status = 'FAILED', error = ?2, duration_ms = ?3
                 WHERE id = ?1 AND status = 'PENDING'",
                params![id, error, duration_ms],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recent log entries for an instance.
pub async fn recent_for_instance(
    db: &Database,
    instance_id: &str,
    limit: u32,
) -> Result<Vec<MessageLog>, CourierError> {
    let instance_id = instance_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM message_logs
                 WHERE instance_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![instance_id, limit], map_row)?;
            let mut logs = Vec::new();
            for row in rows {
                logs.push(row?);
            }
            Ok(logs)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
