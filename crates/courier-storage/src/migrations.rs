// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations tracked via `PRAGMA user_version`.
//!
//! Each entry in [`MIGRATIONS`] is applied in order inside its own
//! transaction; `user_version` records how far this database has migrated.
//! Never edit an applied migration — append a new one.

/// Ordered migration scripts. Index + 1 == resulting `user_version`.
const MIGRATIONS: &[&str] = &[
    // V1: full initial schema.
    r#"
    CREATE TABLE instances (
        id            TEXT PRIMARY KEY,
        tenant_id     TEXT NOT NULL,
        name          TEXT NOT NULL,
        channel       TEXT NOT NULL CHECK (channel IN ('BRIDGE', 'CLOUD')),
        connectivity  TEXT NOT NULL DEFAULT 'DISCONNECTED',
        created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        deleted_at    TEXT
    );
    CREATE INDEX idx_instances_tenant ON instances (tenant_id) WHERE deleted_at IS NULL;

    CREATE TABLE instance_locks (
        instance_id      TEXT PRIMARY KEY,
        status           TEXT NOT NULL DEFAULT 'FREE' CHECK (status IN ('FREE', 'BUSY', 'BLOCKED')),
        holder           TEXT,
        reason           TEXT,
        locked_at        TEXT,
        error_count      INTEGER NOT NULL DEFAULT 0,
        last_error       TEXT,
        last_success_at  TEXT,
        send_count       INTEGER NOT NULL DEFAULT 0,
        updated_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE send_queue (
        id              TEXT PRIMARY KEY,
        tenant_id       TEXT NOT NULL,
        instance_id     TEXT NOT NULL,
        recipient       TEXT NOT NULL,
        content         TEXT NOT NULL,
        priority        INTEGER NOT NULL DEFAULT 0,
        status          TEXT NOT NULL DEFAULT 'WAITING',
        attempts        INTEGER NOT NULL DEFAULT 0,
        max_attempts    INTEGER NOT NULL DEFAULT 3,
        scheduled_for   TEXT,
        next_attempt_at TEXT,
        last_error      TEXT,
        created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );
    CREATE INDEX idx_send_queue_dispatch
        ON send_queue (instance_id, status, priority DESC, created_at);

    CREATE TABLE message_logs (
        id                   TEXT PRIMARY KEY,
        queue_item_id        TEXT,
        instance_id          TEXT NOT NULL,
        recipient            TEXT NOT NULL,
        status               TEXT NOT NULL DEFAULT 'PENDING',
        error                TEXT,
        external_message_id  TEXT,
        duration_ms          INTEGER,
        created_at           TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );
    CREATE INDEX idx_message_logs_instance ON message_logs (instance_id, created_at DESC);

    CREATE TABLE flows (
        id              TEXT PRIMARY KEY,
        tenant_id       TEXT NOT NULL,
        instance_id     TEXT,
        name            TEXT NOT NULL,
        trigger_kind    TEXT NOT NULL,
        trigger_keywords TEXT NOT NULL DEFAULT '[]',
        trigger_value   TEXT,
        definition      TEXT NOT NULL,
        enabled         INTEGER NOT NULL DEFAULT 1,
        created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );
    CREATE INDEX idx_flows_tenant ON flows (tenant_id, created_at);

    CREATE TABLE flow_sessions (
        id               TEXT PRIMARY KEY,
        flow_id          TEXT NOT NULL,
        instance_id      TEXT NOT NULL,
        remote_party     TEXT NOT NULL,
        current_node     TEXT,
        variables        TEXT NOT NULL DEFAULT '{}',
        waiting_input    INTEGER NOT NULL DEFAULT 0,
        active           INTEGER NOT NULL DEFAULT 1,
        started_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        last_activity_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        completed_at     TEXT
    );
    CREATE INDEX idx_flow_sessions_party ON flow_sessions (instance_id, remote_party) WHERE active = 1;

    CREATE TABLE campaigns (
        id           TEXT PRIMARY KEY,
        tenant_id    TEXT NOT NULL,
        name         TEXT NOT NULL,
        content      TEXT NOT NULL,
        delay_secs   INTEGER NOT NULL DEFAULT 30,
        status       TEXT NOT NULL DEFAULT 'DRAFT',
        sent_count   INTEGER NOT NULL DEFAULT 0,
        failed_count INTEGER NOT NULL DEFAULT 0,
        created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE campaign_instances (
        campaign_id TEXT NOT NULL REFERENCES campaigns (id) ON DELETE CASCADE,
        instance_id TEXT NOT NULL,
        PRIMARY KEY (campaign_id, instance_id)
    );

    CREATE TABLE campaign_contacts (
        id          TEXT PRIMARY KEY,
        campaign_id TEXT NOT NULL REFERENCES campaigns (id) ON DELETE CASCADE,
        recipient   TEXT NOT NULL,
        status      TEXT NOT NULL DEFAULT 'PENDING',
        error       TEXT,
        sent_at     TEXT
    );
    CREATE INDEX idx_campaign_contacts_pending ON campaign_contacts (campaign_id, status);
    "#,
];

/// Run all pending migrations against the given connection.
pub fn apply(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (idx, script) in MIGRATIONS.iter().enumerate().skip(version as usize) {
        let tx = conn.transaction()?;
        tx.execute_batch(script)?;
        tx.pragma_update(None, "user_version", (idx + 1) as i64)?;
        tx.commit()?;
        tracing::info!(version = idx + 1, "applied database migration");
    }

    Ok(())
}
