// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flow graph model: nodes, edges, triggers, and inbound events.
//!
//! A flow's graph is stored as one JSON column and decoded into these types
//! once when the engine loads it. Node payloads are a tagged union keyed by
//! node type, so each variant carries only the fields that type needs.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use courier_core::MediaKind;

/// What makes a stored flow eligible to start.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerPolicy {
    /// Trimmed, lower-cased message equals or word-prefixes a keyword.
    Keyword,
    /// Any inbound text.
    All,
    ButtonReply,
    ListReply,
    /// Started externally, never by an inbound event.
    Webhook,
}

/// The decoded node/edge graph of one flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowDefinition {
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn start_node(&self) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| matches!(n.kind, NodeKind::Start))
    }

    pub fn edges_from<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a FlowEdge> {
        self.edges.iter().filter(move |e| e.source == node_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// One directed connection between two nodes.
///
/// `source_handle` names the output it hangs off (a button id, a condition
/// branch); a handle-less edge is the node's default path. An edge may also
/// be gated by a condition over session variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdge {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

/// Node payloads, tagged by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Start,
    /// Send a text message; optionally pause for the contact's reply,
    /// capturing it into a session variable.
    Message {
        text: String,
        #[serde(default)]
        await_reply: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        save_as: Option<String>,
    },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Audio {
        url: String,
    },
    Video {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Document {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    /// Present tappable choices and wait; the selected id becomes the output
    /// handle used for edge routing.
    Buttons {
        text: String,
        buttons: Vec<Choice>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        save_as: Option<String>,
    },
    /// Present a pick-list and wait, same routing rules as `Buttons`.
    List {
        text: String,
        items: Vec<Choice>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        save_as: Option<String>,
    },
    /// Evaluate a condition over session variables; yields the `true` or
    /// `false` handle.
    Condition {
        #[serde(flatten)]
        condition: Condition,
    },
    Delay {
        seconds: u64,
    },
    SetVariable {
        name: String,
        value: String,
    },
    /// Best-effort outbound HTTP call; the response body is captured into a
    /// variable when `save_as` is set. Never retried, failures only logged.
    HttpRequest {
        method: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        save_as: Option<String>,
    },
    /// Hand the conversation to a human queue and close the session.
    Transfer {
        to: String,
    },
    GoToFlow {
        flow_id: String,
    },
    End,
}

/// One tappable option of a `Buttons` or `List` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub label: String,
}

/// A predicate over one session variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub variable: String,
    pub op: ConditionOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Supported comparison operators. All string comparisons are
/// case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOp {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
    Exists,
}

/// An inbound message event for one (instance, remote party) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    Text {
        body: String,
    },
    ButtonReply {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    ListReply {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Media {
        #[serde(rename = "media_kind")]
        kind: MediaKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

impl InboundEvent {
    /// The text a waiting node captures from this event: raw body for text,
    /// the selected id for replies, nothing for bare media.
    pub fn captured_text(&self) -> Option<&str> {
        match self {
            Self::Text { body } => Some(body),
            Self::ButtonReply { id, .. } | Self::ListReply { id, .. } => Some(id),
            Self::Media { caption, .. } => caption.as_deref(),
        }
    }
}
