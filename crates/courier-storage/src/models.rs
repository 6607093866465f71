// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! Status columns are stored as TEXT in the form produced by the
//! `courier-core` enums' `Display` impls; callers parse them back with
//! `FromStr` when they need typed matching. Timestamps are ISO-8601 TEXT.

use serde::{Deserialize, Serialize};

/// One managed messaging connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// `BRIDGE` or `CLOUD`.
    pub channel: String,
    /// `DISCONNECTED | CONNECTING | CONNECTED | BANNED`.
    pub connectivity: String,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

/// The per-instance mutual-exclusion and circuit-breaker record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceLock {
    pub instance_id: String,
    /// `FREE | BUSY | BLOCKED`.
    pub status: String,
    pub holder: Option<String>,
    pub reason: Option<String>,
    pub locked_at: Option<String>,
    pub error_count: i64,
    pub last_error: Option<String>,
    pub last_success_at: Option<String>,
    pub send_count: i64,
    pub updated_at: String,
}

/// One pending or processed single-message send request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendQueueItem {
    pub id: String,
    pub tenant_id: String,
    pub instance_id: String,
    pub recipient: String,
    /// JSON-encoded `OutboundContent`.
    pub content: String,
    /// Higher dispatches first.
    pub priority: i64,
    /// `WAITING | SCHEDULED | PROCESSING | COMPLETED | FAILED | CANCELLED`.
    pub status: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub scheduled_for: Option<String>,
    pub next_attempt_at: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Audit record of one send attempt; immutable once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLog {
    pub id: String,
    pub queue_item_id: Option<String>,
    pub instance_id: String,
    pub recipient: String,
    /// `PENDING | SENT | FAILED`.
    pub status: String,
    pub error: Option<String>,
    pub external_message_id: Option<String>,
    pub duration_ms: Option<i64>,
    pub created_at: String,
}

/// A stored flow definition. The graph itself lives in `definition` as JSON
/// and is decoded once at load time by `courier-flow`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRecord {
    pub id: String,
    pub tenant_id: String,
    /// `None` scopes the flow to every instance of the tenant.
    pub instance_id: Option<String>,
    pub name: String,
    /// `KEYWORD | ALL | BUTTON_REPLY | LIST_REPLY | WEBHOOK`.
    pub trigger_kind: String,
    /// JSON array of keyword strings (KEYWORD trigger only).
    pub trigger_keywords: String,
    /// Exact id to match for BUTTON_REPLY / LIST_REPLY triggers.
    pub trigger_value: Option<String>,
    /// JSON-encoded node/edge graph.
    pub definition: String,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One live or completed flow execution for one (instance, remote party).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSessionRecord {
    pub id: String,
    pub flow_id: String,
    pub instance_id: String,
    pub remote_party: String,
    pub current_node: Option<String>,
    /// JSON object of variable bindings.
    pub variables: String,
    pub waiting_input: bool,
    pub active: bool,
    pub started_at: String,
    pub last_activity_at: String,
    pub completed_at: Option<String>,
}

/// A batch outbound job fanning one message out to many recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// JSON-encoded `OutboundContent`.
    pub content: String,
    /// Pause between two contacts of this campaign, in seconds.
    pub delay_secs: i64,
    /// `DRAFT | SCHEDULED | RUNNING | PAUSED | COMPLETED | CANCELLED`.
    pub status: String,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-recipient delivery state within a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignContact {
    pub id: String,
    pub campaign_id: String,
    pub recipient: String,
    /// `PENDING | SENT | FAILED`.
    pub status: String,
    pub error: Option<String>,
    pub sent_at: Option<String>,
}
