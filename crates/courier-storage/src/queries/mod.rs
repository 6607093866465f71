// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per entity.

pub mod campaigns;
pub mod flows;
pub mod instances;
pub mod locks;
pub mod logs;
pub mod queue;
pub mod sessions;
