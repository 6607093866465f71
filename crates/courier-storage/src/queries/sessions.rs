// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flow session storage.
//!
//! At most one active session exists per (instance, remote party); the
//! engine force-closes any survivor before opening a new one.

use courier_core::CourierError;
use rusqlite::{params, Row};

use crate::database::Database;
use crate::models::FlowSessionRecord;

fn map_row(row: &Row<'_>) -> Result<FlowSessionRecord, rusqlite::Error> {
    Ok(FlowSessionRecord {
        id: row.get(0)?,
        flow_id: row.get(1)?,
        instance_id: row.get(2)?,
        remote_party: row.get(3)?,
        current_node: row.get(4)?,
        variables: row.get(5)?,
        waiting_input: row.get(6)?,
        active: row.get(7)?,
        started_at: row.get(8)?,
        last_activity_at: row.get(9)?,
        completed_at: row.get(10)?,
    })
}

const COLUMNS: &str = "id, flow_id, instance_id, remote_party, current_node, variables, \
                       waiting_input, active, started_at, last_activity_at, completed_at";

pub async fn insert(db: &Database, session: &FlowSessionRecord) -> Result<(), CourierError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO flow_sessions
                 (id, flow_id, instance_id, remote_party, current_node, variables, waiting_input)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    session.id,
                    session.flow_id,
                    session.instance_id,
                    session.remote_party,
                    session.current_node,
                    session.variables,
                    session.waiting_input,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The active session for a conversation, if any.
pub async fn active_for(
    db: &Database,
    instance_id: &str,
    remote_party: &str,
) -> Result<Option<FlowSessionRecord>, CourierError> {
    let instance_id = instance_id.to_string();
    let remote_party = remote_party.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM flow_sessions
                 WHERE instance_id = ?1 AND remote_party = ?2 AND active = 1
                 ORDER BY started_at DESC
                 LIMIT 1"
            ))?;
            match stmt.query_row(params![instance_id, remote_party], map_row) {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Force-close every active session for a conversation. Returns how many
/// were closed (normally 0 or 1).
pub async fn deactivate_for(
    db: &Database,
    instance_id: &str,
    remote_party: &str,
) -> Result<usize, CourierError> {
    let instance_id = instance_id.to_string();
    let remote_party = remote_party.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE flow_sessions
                 SET active = 0, waiting_input = 0,
                     completed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     last_activity_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE instance_id = ?1 AND remote_party = ?2 AND active = 1",
                params![instance_id, remote_party],
            )?;
            Ok(changed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Persist the engine's position after each step.
pub async fn save_progress(
    db: &Database,
    id: &str,
    current_node: Option<&str>,
    variables: &str,
    waiting_input: bool,
) -> Result<bool, CourierError> {
    let id = id.to_string();
    let current_node = current_node.map(str::to_string);
    let variables = variables.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE flow_sessions
                 SET current_node = ?2, variables = ?3, waiting_input = ?4,
                     last_activity_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND active = 1",
                params![id, current_node, variables, waiting_input],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Close a session normally (END node reached, transfer, or flow switch).
pub async fn complete(db: &Database, id: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE flow_sessions
                 SET active = 0, waiting_input = 0,
                     completed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     last_activity_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND active = 1",
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

    pub(crate) fn make_session(id: &str, remote_party: &str) -> FlowSessionRecord {
        FlowSessionRecord {
            id: id.to_string(),
            flow_id: "f1".to_string(),
            instance_id: "i1".to_string(),
            remote_party: remote_party.to_string(),
            current_node: Some("start".to_string()),
            variables: "{}".to_string(),
            waiting_input: false,
            active: true,
            started_at: String::new(),
            last_activity_at: String::new(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn active_lookup_scopes_to_conversation() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_session("s1", "+111")).await.unwrap();
        insert(&db, &make_session("s2", "+222")).await.unwrap();

        let found = active_for(&db, "i1", "+111").await.unwrap().unwrap();
        assert_eq!(found.id, "s1");
        assert!(active_for(&db, "i2", "+111").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn save_progress_updates_position_and_variables() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_session("s1", "+111")).await.unwrap();

        assert!(save_progress(&db, "s1", Some("ask_name"), r#"{"name":"Ada"}"#, true)
            .await
            .unwrap());

        let session = active_for(&db, "i1", "+111").await.unwrap().unwrap();
        assert_eq!(session.current_node.as_deref(), Some("ask_name"));
        assert!(session.waiting_input);
        assert_eq!(session.variables, r#"{"name":"Ada"}"#);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn completed_session_is_gone_and_immutable() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_session("s1", "+111")).await.unwrap();

        assert!(complete(&db, "s1").await.unwrap());
        assert!(active_for(&db, "i1", "+111").await.unwrap().is_none());
        // Closed sessions take no further writes.
        assert!(!save_progress(&db, "s1", Some("x"), "{}", false).await.unwrap());
        assert!(!complete(&db, "s1").await.unwrap());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn deactivate_clears_the_way_for_a_new_session() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_session("s1", "+111")).await.unwrap();

        assert_eq!(deactivate_for(&db, "i1", "+111").await.unwrap(), 1);
        assert_eq!(deactivate_for(&db, "i1", "+111").await.unwrap(), 0);

        insert(&db, &make_session("s2", "+111")).await.unwrap();
        let found = active_for(&db, "i1", "+111").await.unwrap().unwrap();
        assert_eq!(found.id, "s2");

        db.close().await.unwrap();
    }
}
