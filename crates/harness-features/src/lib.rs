// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Harness Features - conformance features for durable workflow engine clients.
//!
//! Each module defines one feature: the workflows its worker registers and
//! the checks run against them. Features register themselves with
//! `inventory`; [`registry`] collects them.
//!
//! | Task queue                                | Exercises                                  |
//! |-------------------------------------------|--------------------------------------------|
//! | `query/timeout_due_to_no_active_workers`  | query racing client and engine deadlines   |
//! | `schedule/trigger`                        | manual triggers of a paused schedule       |
//! | `update/async_accepted`                   | accepted updates and multiple handles      |
//! | `update/client_interceptor`               | outbound interceptors on a custom client   |

pub mod query;
pub mod schedule;
pub mod update;

use harness_core::FeatureRegistry;

/// Registry of every feature in this crate whose task queue starts with one
/// of `prefixes` (all features when empty).
pub fn registry(prefixes: &[String]) -> harness_core::Result<FeatureRegistry> {
    FeatureRegistry::discover(prefixes)
}
