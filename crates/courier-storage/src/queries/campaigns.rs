// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign storage: the campaign row, its target instances, and the
//! per-recipient contact list, created together in one transaction.

use courier_core::CourierError;
use rusqlite::{params, Row};

use crate::database::Database;
use crate::models::{Campaign, CampaignContact};

fn map_campaign(row: &Row<'_>) -> Result<Campaign, rusqlite::Error> {
    Ok(Campaign {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        content: row.get(3)?,
        delay_secs: row.get(4)?,
        status: row.get(5)?,
        sent_count: row.get(6)?,
        failed_count: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn map_contact(row: &Row<'_>) -> Result<CampaignContact, rusqlite::Error> {
    Ok(CampaignContact {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        recipient: row.get(2)?,
        status: row.get(3)?,
        error: row.get(4)?,
        sent_at: row.get(5)?,
    })
}

const CAMPAIGN_COLUMNS: &str = "id, tenant_id, name, content, delay_secs, status, \
                                sent_count, failed_count, created_at, updated_at";
const CONTACT_COLUMNS: &str = "id, campaign_id, recipient, status, error, sent_at";

/// Create a campaign together with its instance set and contact list.
/// Contact ids are derived as `{campaign_id}:{index}`.
pub async fn create(
    db: &Database,
    campaign: &Campaign,
    instance_ids: &[String],
    recipients: &[String],
) -> Result<(), CourierError> {
    let campaign = campaign.clone();
    let instance_ids = instance_ids.to_vec();
    let recipients = recipients.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO campaigns (id, tenant_id, name, content, delay_secs, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    campaign.id,
                    campaign.tenant_id,
                    campaign.name,
                    campaign.content,
                    campaign.delay_secs,
                    campaign.status,
                ],
            )?;
            for instance_id in &instance_ids {
                tx.execute(
                    "INSERT INTO campaign_instances (campaign_id, instance_id) VALUES (?1, ?2)",
                    params![campaign.id, instance_id],
                )?;
            }
            for (idx, recipient) in recipients.iter().enumerate() {
                tx.execute(
                    "INSERT INTO campaign_contacts (id, campaign_id, recipient)
                     VALUES (?1, ?2, ?3)",
                    params![format!("{}:{idx}", campaign.id), campaign.id, recipient],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<Campaign>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], map_campaign) {
                Ok(campaign) => Ok(Some(campaign)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Current status only; the runner polls this between contacts.
pub async fn status(db: &Database, id: &str) -> Result<Option<String>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            match conn.query_row(
                "SELECT status FROM campaigns WHERE id = ?1",
                params![id],
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

/// Guarded status transition: moves `id` to `to` only while its current
/// status is one of `from`. Returns whether the transition happened.
pub async fn set_status_if(
    db: &Database,
    id: &str,
    from: &[&str],
    to: &str,
) -> Result<bool, CourierError> {
    let id = id.to_string();
    let to = to.to_string();
    let guard = from
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ");
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE campaigns
                     SET status = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1 AND status IN ({guard})"
                ),
                params![id, to],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The instances a campaign fans out over, in insertion order.
pub async fn instance_ids(db: &Database, campaign_id: &str) -> Result<Vec<String>, CourierError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT instance_id FROM campaign_instances
                 WHERE campaign_id = ?1 ORDER BY instance_id",
            )?;
            let rows = stmt.query_map(params![campaign_id], |row| row.get::<_, String>(0))?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            Ok(ids)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The next batch of undelivered contacts.
pub async fn pending_contacts(
    db: &Database,
    campaign_id: &str,
    limit: u32,
) -> Result<Vec<CampaignContact>, CourierError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONTACT_COLUMNS} FROM campaign_contacts
                 WHERE campaign_id = ?1 AND status = 'PENDING'
                 ORDER BY rowid
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![campaign_id, limit], map_contact)?;
            let mut contacts = Vec::new();
            for row in rows {
                contacts.push(row?);
            }
            Ok(contacts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn pending_count(db: &Database, campaign_id: &str) -> Result<i64, CourierError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM campaign_contacts
                 WHERE campaign_id = ?1 AND status = 'PENDING'",
                params![campaign_id],
                |row| row.get::<_, i64>(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn contact_count(db: &Database, campaign_id: &str) -> Result<i64, CourierError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM campaign_contacts WHERE campaign_id = ?1",
                params![campaign_id],
                |row| row.get::<_, i64>(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark one contact delivered and bump the campaign's sent counter, in one
/// transaction.
pub async fn mark_contact_sent(db: &Database, contact_id: &str) -> Result<bool, CourierError> {
    let contact_id = contact_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE campaign_contacts
                 SET status = 'SENT', sent_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'PENDING'",
                params![contact_id],
            )?;
            if changed == 1 {
                tx.execute(
                    "UPDATE campaigns
                     SET sent_count = sent_count + 1,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = (SELECT campaign_id FROM campaign_contacts WHERE id = ?1)",
                    params![contact_id],
                )?;
            }
            tx.commit()?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark one contact failed and bump the campaign's failure counter.
pub async fn mark_contact_failed(
    db: &Database,
    contact_id: &str,
    error: &str,
) -> Result<bool, CourierError> {
    let contact_id = contact_id.to_string();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE campaign_contacts
                 SET status = 'FAILED', error = ?2
                 WHERE id = ?1 AND status = 'PENDING'",
                params![contact_id, error],
            )?;
            if changed == 1 {
                tx.execute(
                    "UPDATE campaigns
                     SET failed_count = failed_count + 1,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = (SELECT campaign_id FROM campaign_contacts WHERE id = ?1)",
                    params![contact_id],
                )?;
            }
            tx.commit()?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
