// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier delivery pipeline.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Courier workspace. Channel adapters and
//! counter stores implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use types::{
    CampaignStatus, ChannelKind, Connectivity, ContactStatus, GroupInfo, LockStatus, LogStatus,
    MediaKind, OutboundContent, QueueStatus, SendReceipt,
};

pub use traits::{AdapterSource, ChannelAdapter, CounterStore};
