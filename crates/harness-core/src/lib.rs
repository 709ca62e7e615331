// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Harness Core - conformance harness for durable workflow engine clients.
//!
//! A conformance suite is a set of [`Feature`]s. Each feature binds the
//! workflows a worker registers on one task queue to the checks that
//! exercise them. Checks are plain async functions; their parameters are
//! injected from per-parameter descriptors, so a check asks for exactly the
//! objects it needs.
//!
//! # Features
//!
//! - **Feature Registry**: Inventory-based discovery with task-queue prefix filters
//! - **Parameter Injection**: Workflow stubs, clients with custom interceptors,
//!   schedule clients, the feature, runtime state and the worker runner
//! - **Runner**: Idempotent worker start/stop for simulating absent workers
//! - **Executor**: Per-check failure isolation, panic capture and timeouts
//! - **Cleanup**: Stubs and schedules created for a check are released after it
//!
//! # Quick Start
//!
//! ```ignore
//! use harness_core::{Check, Feature, FeatureProvider, Runner, StubDescriptor};
//! use harness_client::WorkflowStub;
//!
//! async fn check(stub: WorkflowStub, runner: Runner) -> anyhow::Result<()> {
//!     runner.stop().await?;
//!     // ...
//!     Ok(())
//! }
//!
//! fn feature() -> Feature {
//!     Feature::new("query/timeout_due_to_no_active_workers")
//!         .with_workflow(WorkflowRegistration::new("Workflow", build))
//!         .with_check(Check::new("FeatureChecker", "check", check).stub(0, StubDescriptor::new("Workflow")))
//! }
//!
//! inventory::submit! { FeatureProvider::new(feature) }
//! ```
//!
//! # Configuration
//!
//! [`HarnessConfig::from_env`] reads `HARNESS_*` environment variables; see
//! its documentation for the full list.

mod assert;
mod config;
mod descriptor;
mod error;
mod executor;
mod feature;
mod harness;
mod injector;
mod registry;
mod runner;
mod state;

pub use assert::{expect_deadline_or_cancelled, expect_timeout, wait_until};
pub use config::HarnessConfig;
pub use descriptor::{
    Check, CheckDescriptor, CheckFn, CheckFuture, ClientDescriptor, Inject, Injected, IntoCheck,
    ParamKind, ParamSpec, PipelineProvider, StubDescriptor,
};
pub use error::{CheckError, CheckFailure, HarnessError, Result};
pub use executor::{Executor, FeatureResult};
pub use feature::{Feature, FeatureProvider};
pub use harness::{Harness, HarnessReport};
pub use injector::{Injector, ResolutionContext, Shared, Strategy, plan};
pub use registry::FeatureRegistry;
pub use runner::Runner;
pub use state::RuntimeState;
