// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow stubs and update handles.
//!
//! A [`WorkflowStub`] is a client-side handle to one workflow execution. It
//! holds the workflow id and a shared slot for the started execution; several
//! stubs (possibly built through different clients) can point at the same
//! execution via [`WorkflowStub::attach`]. The execution itself is owned by
//! the service; stubs and [`UpdateHandle`]s only know how to look it up.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::client::WorkflowClient;
use crate::error::{ClientError, Result};
use crate::interceptor::{QueryInput, SignalInput, StartInput, UpdateInput};
use crate::types::{
    LifecycleStage, QueryRequest, SignalRequest, StartWorkflowRequest, UpdateOutcome,
    UpdateRequest, WorkflowDescription, WorkflowExecution, WorkflowOutcome,
};

/// How a stub starts its workflow.
#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    /// Task queue the workflow is dispatched to.
    pub task_queue: String,
    /// Workflow id; a random one is generated when absent.
    pub workflow_id: Option<String>,
    /// Arguments passed to the workflow when the stub starts it.
    pub args: Vec<Value>,
    /// Memo attached to the execution.
    pub memo: Map<String, Value>,
}

impl WorkflowOptions {
    pub fn new(task_queue: impl Into<String>) -> Self {
        Self {
            task_queue: task_queue.into(),
            ..Self::default()
        }
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_memo(mut self, memo: Map<String, Value>) -> Self {
        self.memo = memo;
        self
    }
}

/// Options for issuing an update.
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub update_name: String,
    pub wait_for_stage: LifecycleStage,
    /// Update id; a random one is generated when absent.
    pub update_id: Option<String>,
}

impl UpdateOptions {
    pub fn new(update_name: impl Into<String>, wait_for_stage: LifecycleStage) -> Self {
        Self {
            update_name: update_name.into(),
            wait_for_stage,
            update_id: None,
        }
    }

    pub fn with_update_id(mut self, update_id: impl Into<String>) -> Self {
        self.update_id = Some(update_id.into());
        self
    }
}

/// Client-side handle to one workflow execution.
#[derive(Clone)]
pub struct WorkflowStub {
    client: WorkflowClient,
    workflow_type: String,
    workflow_id: String,
    options: Arc<WorkflowOptions>,
    execution: Arc<OnceCell<WorkflowExecution>>,
}

impl fmt::Debug for WorkflowStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowStub")
            .field("workflow_type", &self.workflow_type)
            .field("workflow_id", &self.workflow_id)
            .field("execution", &self.execution.get())
            .finish()
    }
}

impl WorkflowStub {
    pub(crate) fn new(client: WorkflowClient, workflow_type: String, options: WorkflowOptions) -> Self {
        let workflow_id = options
            .workflow_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            client,
            workflow_type,
            workflow_id,
            options: Arc::new(options),
            execution: Arc::new(OnceCell::new()),
        }
    }

    /// Another handle to the same logical execution, issuing calls through `client`.
    ///
    /// Starting through either handle starts the execution for both.
    pub fn attach(&self, client: &WorkflowClient) -> Self {
        Self {
            client: client.clone(),
            ..self.clone()
        }
    }

    pub fn workflow_type(&self) -> &str {
        &self.workflow_type
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn task_queue(&self) -> &str {
        &self.options.task_queue
    }

    pub fn client(&self) -> &WorkflowClient {
        &self.client
    }

    /// The started execution, if any handle has started it.
    pub fn execution(&self) -> Option<&WorkflowExecution> {
        self.execution.get()
    }

    /// True when both handles refer to the same logical execution.
    pub fn same_execution(&self, other: &WorkflowStub) -> bool {
        Arc::ptr_eq(&self.execution, &other.execution) || self.workflow_id == other.workflow_id
    }

    /// Start the workflow if no handle has started it yet.
    pub async fn start(&self) -> Result<WorkflowExecution> {
        let execution = self.execution.get_or_try_init(|| self.send_start()).await?;
        Ok(execution.clone())
    }

    #[instrument(skip(self), fields(workflow_type = %self.workflow_type, workflow_id = %self.workflow_id))]
    async fn send_start(&self) -> Result<WorkflowExecution> {
        let input = self.client.pipeline().start(StartInput {
            workflow_id: self.workflow_id.clone(),
            workflow_type: self.workflow_type.clone(),
            task_queue: self.options.task_queue.clone(),
            args: self.options.args.clone(),
            memo: self.options.memo.clone(),
        });

        let converter = self.client.converter();
        let memo = input
            .memo
            .iter()
            .map(|(key, value)| Ok((key.clone(), converter.to_payload(value)?)))
            .collect::<Result<_>>()?;

        let request = StartWorkflowRequest {
            namespace: self.client.namespace().to_string(),
            workflow_id: input.workflow_id,
            workflow_type: input.workflow_type,
            task_queue: input.task_queue,
            args: converter.to_payloads(&input.args)?,
            memo,
            identity: self.client.options().identity.clone(),
        };

        let execution = self
            .client
            .call("start_workflow", self.client.service().start_workflow(request))
            .await?;
        info!(run_id = %execution.run_id, "Workflow started");
        Ok(execution)
    }

    /// Send a signal, starting the workflow first if needed.
    #[instrument(skip(self, args), fields(workflow_id = %self.workflow_id))]
    pub async fn signal(&self, signal_name: &str, args: Vec<Value>) -> Result<()> {
        let execution = self.start().await?;
        let input = self.client.pipeline().signal(SignalInput {
            workflow_id: execution.workflow_id,
            signal_name: signal_name.to_string(),
            args,
        });

        let request = SignalRequest {
            namespace: self.client.namespace().to_string(),
            workflow_id: input.workflow_id,
            signal_name: input.signal_name,
            args: self.client.converter().to_payloads(&input.args)?,
            identity: self.client.options().identity.clone(),
        };
        self.client
            .call("signal_workflow", self.client.service().signal_workflow(request))
            .await
    }

    /// Run a query against the workflow's state.
    #[instrument(skip(self, args), fields(workflow_id = %self.workflow_id))]
    pub async fn query(&self, query_name: &str, args: Vec<Value>) -> Result<Value> {
        let execution = self.start().await?;
        let input = self.client.pipeline().query(QueryInput {
            workflow_id: execution.workflow_id,
            query_name: query_name.to_string(),
            args,
        });

        let request = QueryRequest {
            namespace: self.client.namespace().to_string(),
            workflow_id: input.workflow_id,
            query_name: input.query_name,
            args: self.client.converter().to_payloads(&input.args)?,
        };
        let payload = self
            .client
            .call("query_workflow", self.client.service().query_workflow(request))
            .await?;
        self.client.converter().from_payload(&payload)
    }

    /// Run an update to completion and return its value.
    pub async fn update(&self, update_name: &str, args: Vec<Value>) -> Result<Value> {
        let handle = self
            .start_update(
                UpdateOptions::new(update_name, LifecycleStage::Completed),
                args,
            )
            .await?;
        handle.get_result(None).await
    }

    /// Issue an update and return once it reaches `options.wait_for_stage`.
    ///
    /// When waiting for [`LifecycleStage::Completed`] a failed update is
    /// reported here as [`ClientError::WorkflowUpdate`].
    #[instrument(skip(self, options, args), fields(workflow_id = %self.workflow_id, update_name = %options.update_name))]
    pub async fn start_update(&self, options: UpdateOptions, args: Vec<Value>) -> Result<UpdateHandle> {
        let execution = self.start().await?;
        let input = self.client.pipeline().update(UpdateInput {
            workflow_id: execution.workflow_id,
            update_id: options
                .update_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            update_name: options.update_name,
            wait_for_stage: options.wait_for_stage,
            args,
        });

        let request = UpdateRequest {
            namespace: self.client.namespace().to_string(),
            workflow_id: input.workflow_id.clone(),
            update_id: input.update_id.clone(),
            update_name: input.update_name.clone(),
            args: self.client.converter().to_payloads(&input.args)?,
            wait_for_stage: input.wait_for_stage,
            identity: self.client.options().identity.clone(),
        };
        let response = self
            .client
            .call("update_workflow", self.client.service().update_workflow(request))
            .await?;
        debug!(update_id = %response.update_id, stage = ?response.stage, "Update reached stage");

        let handle = UpdateHandle::new(
            self.client.clone(),
            input.workflow_id,
            response.update_id,
            Some(input.update_name),
        );
        if let Some(outcome) = response.outcome {
            if input.wait_for_stage == LifecycleStage::Completed
                && let Err(source) = &outcome.result
            {
                return Err(ClientError::WorkflowUpdate {
                    update_id: outcome.update_id.clone(),
                    update_name: outcome.update_name.clone(),
                    source: source.clone(),
                });
            }
            handle.remember(outcome);
        }
        Ok(handle)
    }

    /// A fresh handle to an existing update, independent of the handle
    /// returned when it was started.
    pub fn get_update_handle(&self, update_id: impl Into<String>) -> UpdateHandle {
        let workflow_id = self
            .execution()
            .map(|e| e.workflow_id.clone())
            .unwrap_or_else(|| self.workflow_id.clone());
        UpdateHandle::new(self.client.clone(), workflow_id, update_id.into(), None)
    }

    /// Wait for the workflow result.
    ///
    /// Fails with [`ClientError::Timeout`] when no result arrives within
    /// `timeout` (or the client's default result timeout).
    #[instrument(skip(self), fields(workflow_id = %self.workflow_id))]
    pub async fn get_result(&self, timeout: Option<Duration>) -> Result<Value> {
        let execution = self.start().await?;
        let timeout = timeout.unwrap_or(self.client.options().result_timeout);
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClientError::Timeout(timeout));
            }
            let wait = self.client.poll_wait(remaining);
            let polled = self
                .client
                .call(
                    "poll_result",
                    self.client.service().poll_result(
                        self.client.namespace(),
                        &execution.workflow_id,
                        wait,
                    ),
                )
                .await?;

            match polled {
                Some(WorkflowOutcome::Completed(payload)) => {
                    return self.client.converter().from_payload(&payload);
                }
                Some(WorkflowOutcome::Failed(source)) => {
                    return Err(ClientError::WorkflowFailed {
                        workflow_id: execution.workflow_id,
                        source,
                    });
                }
                Some(WorkflowOutcome::Terminated(reason)) => {
                    return Err(ClientError::WorkflowTerminated {
                        workflow_id: execution.workflow_id,
                        reason,
                    });
                }
                None => continue,
            }
        }
    }

    /// Describe the execution.
    pub async fn describe(&self) -> Result<WorkflowDescription> {
        let execution = self.start().await?;
        self.client
            .call(
                "describe_workflow",
                self.client
                    .service()
                    .describe_workflow(self.client.namespace(), &execution.workflow_id),
            )
            .await
    }

    /// Terminate the execution.
    #[instrument(skip(self), fields(workflow_id = %self.workflow_id))]
    pub async fn terminate(&self, reason: &str) -> Result<()> {
        let execution = self.start().await?;
        self.client
            .call(
                "terminate_workflow",
                self.client.service().terminate_workflow(
                    self.client.namespace(),
                    &execution.workflow_id,
                    reason,
                ),
            )
            .await
    }
}

/// Handle to one update of one workflow execution.
///
/// Any number of handles may exist for the same update id; all of them
/// observe the same outcome because the outcome lives in the service.
#[derive(Clone)]
pub struct UpdateHandle {
    client: WorkflowClient,
    workflow_id: String,
    update_id: String,
    update_name: Option<String>,
    outcome: Arc<OnceCell<UpdateOutcome>>,
}

impl fmt::Debug for UpdateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateHandle")
            .field("workflow_id", &self.workflow_id)
            .field("update_id", &self.update_id)
            .field("update_name", &self.update_name)
            .field("completed", &self.outcome.initialized())
            .finish()
    }
}

impl UpdateHandle {
    fn new(
        client: WorkflowClient,
        workflow_id: String,
        update_id: String,
        update_name: Option<String>,
    ) -> Self {
        Self {
            client,
            workflow_id,
            update_id,
            update_name,
            outcome: Arc::new(OnceCell::new()),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn update_id(&self) -> &str {
        &self.update_id
    }

    /// Update name, when known to this handle.
    pub fn update_name(&self) -> Option<&str> {
        self.update_name.as_deref()
    }

    fn remember(&self, outcome: UpdateOutcome) {
        // A concurrent poll may have stored the same outcome already.
        let _ = self.outcome.set(outcome);
    }

    /// Wait for the update's result.
    ///
    /// Fails with [`ClientError::Timeout`] when the update does not finish
    /// within `timeout` (or the client's default result timeout), and with
    /// [`ClientError::WorkflowUpdate`] when it finished with a failure.
    #[instrument(skip(self), fields(workflow_id = %self.workflow_id, update_id = %self.update_id))]
    pub async fn get_result(&self, timeout: Option<Duration>) -> Result<Value> {
        let outcome = match self.outcome.get() {
            Some(outcome) => outcome.clone(),
            None => {
                let outcome = self.wait_outcome(timeout).await?;
                self.remember(outcome.clone());
                outcome
            }
        };

        match outcome.result {
            Ok(payload) => self.client.converter().from_payload(&payload),
            Err(source) => Err(ClientError::WorkflowUpdate {
                update_id: outcome.update_id,
                update_name: outcome.update_name,
                source,
            }),
        }
    }

    async fn wait_outcome(&self, timeout: Option<Duration>) -> Result<UpdateOutcome> {
        let timeout = timeout.unwrap_or(self.client.options().result_timeout);
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClientError::Timeout(timeout));
            }
            let wait = self.client.poll_wait(remaining);
            let polled = self
                .client
                .call(
                    "poll_update",
                    self.client.service().poll_update(
                        self.client.namespace(),
                        &self.workflow_id,
                        &self.update_id,
                        wait,
                    ),
                )
                .await?;
            if let Some(outcome) = polled {
                return Ok(outcome);
            }
        }
    }
}
