// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow update features.

pub mod async_accepted;
pub mod client_interceptor;
