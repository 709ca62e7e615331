// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Harness Client - workflow engine client capabilities used by conformance checks.
//!
//! This crate provides the client side of a durable workflow engine as seen by
//! the conformance harness: typed stubs for starting and talking to workflow
//! executions, update handles, schedules, worker control and an outbound
//! interceptor pipeline. Everything is written against two traits,
//! [`WorkflowService`] and [`WorkerHost`], so the same checks run against any
//! engine that implements them.
//!
//! # Features
//!
//! - **Workflow Stubs**: Start lazily or eagerly, signal, query, update, await results
//! - **Update Handles**: Any number of handles per update id, all observing the same outcome
//! - **Schedules**: Create, trigger, pause, describe and delete
//! - **Interceptors**: Rewrite outbound start/signal/query/update inputs
//! - **Payload Converters**: Pluggable encodings with JSON as the fallback
//! - **In-process Engine**: [`MemoryEngine`] implements both service traits for tests
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use harness_client::{ClientOptions, MemoryEngine, WorkflowClient, WorkflowOptions};
//!
//! let engine = MemoryEngine::default();
//! let client = WorkflowClient::new(Arc::new(engine.clone()), ClientOptions::new());
//!
//! let stub = client.new_workflow_stub("Workflow", WorkflowOptions::new("my-queue"));
//! stub.signal("finish", vec![]).await?;
//! let result = stub.get_result(None).await?;
//! ```
//!
//! # Deadlines
//!
//! Every service call runs under the client's `rpc_timeout`. When that fires
//! before the service answers the call fails with `CANCELLED`; when the
//! service gives up first (for example because no worker polls the task
//! queue) it fails with `DEADLINE_EXCEEDED`. Callers that stop workers on
//! purpose must accept either.

mod client;
mod config;
mod error;
mod interceptor;
mod memory;
mod payload;
mod schedule;
mod service;
mod stub;
mod types;
mod workflow;

pub use client::WorkflowClient;
pub use config::ClientOptions;
pub use error::{ApplicationFailure, ClientError, Result, StatusCode};
pub use interceptor::{
    ClientInterceptor, InterceptorPipeline, QueryInput, SignalInput, StartInput, UpdateInput,
};
pub use memory::{EngineConfig, MemoryEngine};
pub use payload::{DataConverter, JSON_ENCODING, JsonConverter, Payload, PayloadConverter};
pub use schedule::{
    Schedule, ScheduleClient, ScheduleCreatedHook, ScheduleHandle, ScheduleOptions, ScheduleSpec,
    ScheduleState, StartWorkflowAction,
};
pub use service::{WorkerHost, WorkflowService};
pub use stub::{UpdateHandle, UpdateOptions, WorkflowOptions, WorkflowStub};
pub use types::{
    CreateScheduleRequest, LifecycleStage, QueryRequest, ScheduleActionResult,
    ScheduleDescription, ScheduleInfo, SignalRequest, StartWorkflowRequest, UpdateOutcome,
    UpdateRequest, UpdateResponse, WorkflowDescription, WorkflowExecution, WorkflowOutcome,
    WorkflowStatus,
};
pub use workflow::{
    HandlerPoll, WorkerOptions, WorkflowFactory, WorkflowInstance, WorkflowRegistration,
};
