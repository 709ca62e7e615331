// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service traits.
//!
//! [`WorkflowService`] is the raw RPC surface of the engine and
//! [`WorkerHost`] attaches and detaches workers from task queues. The typed
//! client in [`crate::client`] is written purely against these traits, so any
//! engine that implements them can be driven by the harness.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::payload::Payload;
use crate::types::{
    CreateScheduleRequest, QueryRequest, ScheduleDescription, SignalRequest, StartWorkflowRequest,
    UpdateOutcome, UpdateRequest, UpdateResponse, WorkflowDescription, WorkflowExecution,
    WorkflowOutcome,
};
use crate::workflow::WorkerOptions;

/// Raw workflow service operations.
///
/// Calls that need a worker (queries, update acceptance) are bounded by the
/// service's own deadline and fail with `DEADLINE_EXCEEDED` when no worker
/// picks them up in time. Long-poll calls take an explicit `wait` and return
/// `Ok(None)` when nothing happened within it.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    /// Start a workflow execution.
    async fn start_workflow(&self, request: StartWorkflowRequest) -> Result<WorkflowExecution>;

    /// Deliver a signal. Signals are accepted without an active worker.
    async fn signal_workflow(&self, request: SignalRequest) -> Result<()>;

    /// Run a query. Requires an active worker.
    async fn query_workflow(&self, request: QueryRequest) -> Result<Payload>;

    /// Issue an update and wait for the requested stage.
    async fn update_workflow(&self, request: UpdateRequest) -> Result<UpdateResponse>;

    /// Long-poll for an update's outcome.
    async fn poll_update(
        &self,
        namespace: &str,
        workflow_id: &str,
        update_id: &str,
        wait: Duration,
    ) -> Result<Option<UpdateOutcome>>;

    /// Long-poll for a workflow's outcome.
    async fn poll_result(
        &self,
        namespace: &str,
        workflow_id: &str,
        wait: Duration,
    ) -> Result<Option<WorkflowOutcome>>;

    /// Describe a workflow execution.
    async fn describe_workflow(
        &self,
        namespace: &str,
        workflow_id: &str,
    ) -> Result<WorkflowDescription>;

    /// Terminate a running workflow execution.
    async fn terminate_workflow(&self, namespace: &str, workflow_id: &str, reason: &str)
    -> Result<()>;

    /// Create a schedule.
    async fn create_schedule(&self, request: CreateScheduleRequest) -> Result<()>;

    /// Describe a schedule.
    async fn describe_schedule(
        &self,
        namespace: &str,
        schedule_id: &str,
    ) -> Result<ScheduleDescription>;

    /// Take the schedule's action immediately.
    async fn trigger_schedule(&self, namespace: &str, schedule_id: &str) -> Result<()>;

    /// Pause or unpause a schedule.
    async fn set_schedule_paused(
        &self,
        namespace: &str,
        schedule_id: &str,
        paused: bool,
        note: &str,
    ) -> Result<()>;

    /// Delete a schedule.
    async fn delete_schedule(&self, namespace: &str, schedule_id: &str) -> Result<()>;
}

/// Attaches and detaches workers.
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// Start polling `options.task_queue`. Starting an already polling
    /// worker replaces its registrations.
    async fn start_worker(&self, options: WorkerOptions) -> Result<()>;

    /// Stop polling a task queue. Stopping an idle task queue is a no-op.
    async fn stop_worker(&self, namespace: &str, task_queue: &str) -> Result<()>;

    /// Whether a worker is currently polling the task queue.
    async fn is_polling(&self, namespace: &str, task_queue: &str) -> bool;
}
