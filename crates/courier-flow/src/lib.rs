// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversational flow engine for the Courier delivery pipeline.
//!
//! Flows are designer-authored automation graphs triggered by inbound
//! events. The engine resumes waiting sessions, matches triggers, and walks
//! the graph node by node, sending through the channel adapter bound to the
//! instance.

pub mod condition;
pub mod engine;
pub mod model;
pub mod template;

pub use engine::FlowEngine;
pub use model::{
    Condition, ConditionOp, FlowDefinition, FlowEdge, FlowNode, InboundEvent, NodeKind,
    TriggerPolicy,
};
