// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instance CRUD operations. Removal is a soft delete.

use courier_core::CourierError;
use rusqlite::{params, Row};

use crate::database::Database;
use crate::models::Instance;

fn map_row(row: &Row<'_>) -> Result<Instance, rusqlite::Error> {
    Ok(Instance {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        channel: row.get(3)?,
        connectivity: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        deleted_at: row.get(7)?,
    })
}

const COLUMNS: &str =
    "id, tenant_id, name, channel, connectivity, created_at, updated_at, deleted_at";

/// Create a new instance.
pub async fn create(db: &Database, instance: &Instance) -> Result<(), CourierError> {
    let instance = instance.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO instances (id, tenant_id, name, channel, connectivity)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    instance.id,
                    instance.tenant_id,
                    instance.name,
                    instance.channel,
                    instance.connectivity,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a live (non-deleted) instance by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Instance>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM instances WHERE id = ?1 AND deleted_at IS NULL"
            ))?;
            let result = stmt.query_row(params![id], map_row);
            match result {
                Ok(instance) => Ok(Some(instance)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List all live instances that are currently CONNECTED.
pub async fn list_connected(db: &Database) -> Result<Vec<Instance>, CourierError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM instances
                 WHERE connectivity = 'CONNECTED' AND deleted_at IS NULL
                 ORDER BY created_at"
            ))?;
            let rows = stmt.query_map([], map_row)?;
            let mut instances = Vec::new();
            for row in rows {
                instances.push(row?);
            }
            Ok(instances)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a connection lifecycle transition.
pub async fn set_connectivity(
    db: &Database,
    id: &str,
    connectivity: &str,
) -> Result<bool, CourierError> {
    let id = id.to_string();
    let connectivity = connectivity.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE instances SET connectivity = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND deleted_at IS NULL",
                params![connectivity, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Soft-delete an instance.
pub async fn soft_delete(db: &Database, id: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE instances SET deleted_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    pub(crate) fn make_instance(id: &str, channel: &str) -> Instance {
        Instance {
            id: id.to_string(),
            tenant_id: "tenant-1".to_string(),
            name: format!("instance {id}"),
            channel: channel.to_string(),
            connectivity: "DISCONNECTED".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let (db, _dir) = setup_db().await;
        create(&db, &make_instance("i1", "BRIDGE")).await.unwrap();

        let got = get(&db, "i1").await.unwrap().unwrap();
        assert_eq!(got.channel, "BRIDGE");
        assert_eq!(got.connectivity, "DISCONNECTED");
        assert!(!got.created_at.is_empty(), "created_at must be stamped by the db");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_connected_filters_connectivity_and_deletion() {
        let (db, _dir) = setup_db().await;
        create(&db, &make_instance("i1", "BRIDGE")).await.unwrap();
        create(&db, &make_instance("i2", "CLOUD")).await.unwrap();
        create(&db, &make_instance("i3", "CLOUD")).await.unwrap();

        set_connectivity(&db, "i1", "CONNECTED").await.unwrap();
        set_connectivity(&db, "i2", "CONNECTED").await.unwrap();
        soft_delete(&db, "i2").await.unwrap();

        let connected = list_connected(&db).await.unwrap();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].id, "i1");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn soft_deleted_instance_is_invisible() {
        let (db, _dir) = setup_db().await;
        create(&db, &make_instance("i1", "CLOUD")).await.unwrap();
        assert!(soft_delete(&db, "i1").await.unwrap());
        assert!(get(&db, "i1").await.unwrap().is_none());
        // Second delete is a no-op.
        assert!(!soft_delete(&db, "i1").await.unwrap());
        db.close().await.unwrap();
    }
}
