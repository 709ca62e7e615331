// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request and response types exchanged with the workflow service.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApplicationFailure;
use crate::payload::Payload;

/// Stage an update call waits for before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    /// Return once the update is durably accepted by the workflow.
    Accepted,
    /// Return once the update has finished (successfully or not).
    Completed,
}

/// Identity of a started workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}

/// Execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Terminated,
}

impl WorkflowStatus {
    /// Check if this is a terminal status.
    pub fn is_closed(&self) -> bool {
        !matches!(self, WorkflowStatus::Running)
    }
}

/// Final outcome of a workflow execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Completed(Payload),
    Failed(ApplicationFailure),
    Terminated(String),
}

/// Final outcome of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub update_id: String,
    pub update_name: String,
    pub result: Result<Payload, ApplicationFailure>,
}

/// Describes a workflow execution.
#[derive(Debug, Clone)]
pub struct WorkflowDescription {
    pub execution: WorkflowExecution,
    pub workflow_type: String,
    pub task_queue: String,
    pub status: WorkflowStatus,
    pub memo: HashMap<String, Payload>,
    pub start_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
}

/// Start a workflow execution.
#[derive(Debug, Clone)]
pub struct StartWorkflowRequest {
    pub namespace: String,
    pub workflow_id: String,
    pub workflow_type: String,
    pub task_queue: String,
    pub args: Vec<Payload>,
    pub memo: HashMap<String, Payload>,
    pub identity: String,
}

/// Deliver a signal.
#[derive(Debug, Clone)]
pub struct SignalRequest {
    pub namespace: String,
    pub workflow_id: String,
    pub signal_name: String,
    pub args: Vec<Payload>,
    pub identity: String,
}

/// Run a query against workflow state.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub namespace: String,
    pub workflow_id: String,
    pub query_name: String,
    pub args: Vec<Payload>,
}

/// Issue an update.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub namespace: String,
    pub workflow_id: String,
    pub update_id: String,
    pub update_name: String,
    pub args: Vec<Payload>,
    pub wait_for_stage: LifecycleStage,
    pub identity: String,
}

/// Response to an update call.
///
/// `outcome` is present only once the update has completed. The service may
/// return at [`LifecycleStage::Accepted`] even when `Completed` was requested
/// if its own deadline expires first; callers then poll for the outcome.
#[derive(Debug, Clone)]
pub struct UpdateResponse {
    pub update_id: String,
    pub stage: LifecycleStage,
    pub outcome: Option<UpdateOutcome>,
}

/// Create a schedule that starts workflows.
#[derive(Debug, Clone)]
pub struct CreateScheduleRequest {
    pub namespace: String,
    pub schedule_id: String,
    pub workflow_type: String,
    pub task_queue: String,
    pub args: Vec<Payload>,
    pub intervals: Vec<Duration>,
    pub paused: bool,
    pub note: String,
    pub identity: String,
}

/// A workflow start taken by a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleActionResult {
    pub workflow_id: String,
    pub started_at: DateTime<Utc>,
}

/// Runtime information about a schedule.
#[derive(Debug, Clone)]
pub struct ScheduleInfo {
    /// Number of actions taken so far.
    pub num_actions: u64,
    /// Most recent actions, oldest first.
    pub recent_actions: Vec<ScheduleActionResult>,
    pub created_at: DateTime<Utc>,
}

/// Describes a schedule.
#[derive(Debug, Clone)]
pub struct ScheduleDescription {
    pub schedule_id: String,
    pub workflow_type: String,
    pub task_queue: String,
    pub intervals: Vec<Duration>,
    pub paused: bool,
    pub note: String,
    pub info: ScheduleInfo,
}
