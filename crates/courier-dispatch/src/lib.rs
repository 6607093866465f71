// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch layer for the Courier delivery pipeline.
//!
//! Owns everything between "a send exists" and "the channel adapter was
//! called": per-instance rate limiting, the instance lock / circuit
//! breaker, the send queue worker, and the campaign fan-out runner.

pub mod campaign;
pub mod lock;
pub mod memory;
pub mod queue;
pub mod rate;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use campaign::{CampaignRequest, CampaignRunner, CampaignService};
pub use lock::LockService;
pub use memory::MemoryCounterStore;
pub use queue::{QueueDispatcher, QueueService, SendRequest};
pub use rate::{RateDecision, RateLimiter};
pub use registry::AdapterRegistry;
