// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Courier delivery pipeline.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, and typed CRUD
//! operations for instances, locks, the send queue, message logs, flows,
//! flow sessions, and campaigns.
//!
//! Every state transition that more than one worker can race on (lock
//! acquisition, queue claims, campaign status changes) is a single SQL
//! statement guarded by a `WHERE status = ...` clause, with the changed-row
//! count reporting whether the compare-and-set won.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{iso_after_secs, iso_before_secs, now_iso, Database};
pub use models::*;
