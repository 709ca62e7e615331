// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Schedule client.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::client::WorkflowClient;
use crate::error::Result;
use crate::types::{CreateScheduleRequest, ScheduleDescription};

/// Action a schedule takes: start a workflow.
#[derive(Debug, Clone, Default)]
pub struct StartWorkflowAction {
    pub workflow_type: String,
    pub task_queue: String,
    pub args: Vec<Value>,
}

impl StartWorkflowAction {
    pub fn new(workflow_type: impl Into<String>) -> Self {
        Self {
            workflow_type: workflow_type.into(),
            ..Self::default()
        }
    }

    pub fn with_task_queue(mut self, task_queue: impl Into<String>) -> Self {
        self.task_queue = task_queue.into();
        self
    }

    pub fn with_input(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }
}

/// When a schedule fires on its own.
#[derive(Debug, Clone, Default)]
pub struct ScheduleSpec {
    pub intervals: Vec<Duration>,
}

impl ScheduleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.intervals.push(interval);
        self
    }
}

/// Initial schedule state.
#[derive(Debug, Clone, Default)]
pub struct ScheduleState {
    pub paused: bool,
    pub note: String,
}

impl ScheduleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

/// A schedule definition.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    pub action: StartWorkflowAction,
    pub spec: ScheduleSpec,
    pub state: ScheduleState,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, action: StartWorkflowAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_spec(mut self, spec: ScheduleSpec) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_state(mut self, state: ScheduleState) -> Self {
        self.state = state;
        self
    }
}

/// Options for creating a schedule.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOptions {
    /// Schedule id; a random one is generated when absent.
    pub schedule_id: Option<String>,
    /// Namespace override; the client's namespace is used when absent.
    pub namespace: Option<String>,
}

impl ScheduleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedule_id(mut self, schedule_id: impl Into<String>) -> Self {
        self.schedule_id = Some(schedule_id.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Callback invoked with every schedule this client creates.
pub type ScheduleCreatedHook = Arc<dyn Fn(&ScheduleHandle) + Send + Sync>;

/// Creates and looks up schedules.
#[derive(Clone)]
pub struct ScheduleClient {
    client: WorkflowClient,
    on_created: Option<ScheduleCreatedHook>,
}

impl fmt::Debug for ScheduleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleClient")
            .field("namespace", &self.client.namespace())
            .field("tracked", &self.on_created.is_some())
            .finish()
    }
}

impl ScheduleClient {
    pub(crate) fn new(client: WorkflowClient) -> Self {
        Self {
            client,
            on_created: None,
        }
    }

    /// Report every created schedule to `hook`.
    pub fn with_created_hook(mut self, hook: ScheduleCreatedHook) -> Self {
        self.on_created = Some(hook);
        self
    }

    /// Create a schedule.
    #[instrument(skip(self, schedule, options), fields(workflow_type = %schedule.action.workflow_type))]
    pub async fn create_schedule(
        &self,
        schedule: Schedule,
        options: ScheduleOptions,
    ) -> Result<ScheduleHandle> {
        let namespace = options
            .namespace
            .unwrap_or_else(|| self.client.namespace().to_string());
        let schedule_id = options
            .schedule_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let request = CreateScheduleRequest {
            namespace: namespace.clone(),
            schedule_id: schedule_id.clone(),
            workflow_type: schedule.action.workflow_type,
            task_queue: schedule.action.task_queue,
            args: self.client.converter().to_payloads(&schedule.action.args)?,
            intervals: schedule.spec.intervals,
            paused: schedule.state.paused,
            note: schedule.state.note,
            identity: self.client.options().identity.clone(),
        };
        self.client
            .call("create_schedule", self.client.service().create_schedule(request))
            .await?;
        info!(schedule_id = %schedule_id, namespace = %namespace, "Schedule created");

        let handle = ScheduleHandle {
            client: self.client.clone(),
            namespace,
            schedule_id,
        };
        if let Some(hook) = &self.on_created {
            hook(&handle);
        }
        Ok(handle)
    }

    /// Handle to an existing schedule in the client's namespace.
    pub fn get_handle(&self, schedule_id: impl Into<String>) -> ScheduleHandle {
        ScheduleHandle {
            client: self.client.clone(),
            namespace: self.client.namespace().to_string(),
            schedule_id: schedule_id.into(),
        }
    }
}

/// Handle to one schedule.
#[derive(Clone)]
pub struct ScheduleHandle {
    client: WorkflowClient,
    namespace: String,
    schedule_id: String,
}

impl fmt::Debug for ScheduleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleHandle")
            .field("namespace", &self.namespace)
            .field("schedule_id", &self.schedule_id)
            .finish()
    }
}

impl ScheduleHandle {
    pub fn schedule_id(&self) -> &str {
        &self.schedule_id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Take the schedule's action now.
    ///
    /// The service rate-limits manual triggers; a trigger issued too soon
    /// after the previous one may be dropped without an error.
    #[instrument(skip(self), fields(schedule_id = %self.schedule_id))]
    pub async fn trigger(&self) -> Result<()> {
        self.client
            .call(
                "trigger_schedule",
                self.client
                    .service()
                    .trigger_schedule(&self.namespace, &self.schedule_id),
            )
            .await
    }

    pub async fn describe(&self) -> Result<ScheduleDescription> {
        self.client
            .call(
                "describe_schedule",
                self.client
                    .service()
                    .describe_schedule(&self.namespace, &self.schedule_id),
            )
            .await
    }

    pub async fn pause(&self, note: &str) -> Result<()> {
        self.set_paused(true, note).await
    }

    pub async fn unpause(&self, note: &str) -> Result<()> {
        self.set_paused(false, note).await
    }

    async fn set_paused(&self, paused: bool, note: &str) -> Result<()> {
        self.client
            .call(
                "set_schedule_paused",
                self.client.service().set_schedule_paused(
                    &self.namespace,
                    &self.schedule_id,
                    paused,
                    note,
                ),
            )
            .await
    }

    #[instrument(skip(self), fields(schedule_id = %self.schedule_id))]
    pub async fn delete(&self) -> Result<()> {
        self.client
            .call(
                "delete_schedule",
                self.client
                    .service()
                    .delete_schedule(&self.namespace, &self.schedule_id),
            )
            .await?;
        info!("Schedule deleted");
        Ok(())
    }
}
