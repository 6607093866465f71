// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flow definition storage.

use courier_core::CourierError;
use rusqlite::{params, Row};

use crate::database::Database;
use crate::models::FlowRecord;

fn map_row(row: &Row<'_>) -> Result<FlowRecord, rusqlite::Error> {
    Ok(FlowRecord {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        instance_id: row.get(2)?,
        name: row.get(3)?,
        trigger_kind: row.get(4)?,
        trigger_keywords: row.get(5)?,
        trigger_value: row.get(6)?,
        definition: row.get(7)?,
        enabled: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

const COLUMNS: &str = "id, tenant_id, instance_id, name, trigger_kind, trigger_keywords, \
                       trigger_value, definition, enabled, created_at, updated_at";

pub async fn insert(db: &Database, flow: &FlowRecord) -> Result<(), CourierError> {
    let flow = flow.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO flows
                 (id, tenant_id, instance_id, name, trigger_kind, trigger_keywords,
                  trigger_value, definition, enabled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    flow.id,
                    flow.tenant_id,
                    flow.instance_id,
                    flow.name,
                    flow.trigger_kind,
                    flow.trigger_keywords,
                    flow.trigger_value,
                    flow.definition,
                    flow.enabled,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<FlowRecord>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM flows WHERE id = ?1"))?;
            match stmt.query_row(params![id], map_row) {
                Ok(flow) => Ok(Some(flow)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Enabled flows that could trigger for an inbound event on `instance_id`.
///
/// Instance-scoped flows sort ahead of tenant-wide ones so the most specific
/// match wins; within a scope, older flows win.
pub async fn candidates_for(
    db: &Database,
    tenant_id: &str,
    instance_id: &str,
) -> Result<Vec<FlowRecord>, CourierError> {
    let tenant_id = tenant_id.to_string();
    let instance_id = instance_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM flows
                 WHERE tenant_id = ?1
                   AND enabled = 1
                   AND (instance_id = ?2 OR instance_id IS NULL)
                 ORDER BY CASE WHEN instance_id IS NULL THEN 1 ELSE 0 END, created_at"
            ))?;
            let rows = stmt.query_map(params![tenant_id, instance_id], map_row)?;
            let mut flows = Vec::new();
            for row in rows {
                flows.push(row?);
            }
            Ok(flows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Enable or disable a flow.
pub async fn set_enabled(db: &Database, id: &str, enabled: bool) -> Result<bool, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE flows SET enabled = ?2,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id, enabled],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
