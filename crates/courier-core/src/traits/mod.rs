// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for Courier's external collaborators.
//!
//! Channel adapters and the rate-accounting counter store are consumed only
//! through the traits here, using `#[async_trait]` for dynamic dispatch.

pub mod channel;
pub mod counters;

pub use channel::{AdapterSource, ChannelAdapter};
pub use counters::CounterStore;
