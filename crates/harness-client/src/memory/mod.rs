// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process workflow engine.
//!
//! [`MemoryEngine`] implements both [`WorkflowService`] and [`WorkerHost`]
//! without any external server. Workflow instances run inside the engine
//! whenever a worker is attached to their task queue, so stopping a worker
//! makes queries and update acceptance wait until the engine's own
//! `server_deadline` expires, the same way a real server behaves when no
//! worker polls the queue.
//!
//! Schedules with intervals fire from a background task; manual triggers
//! closer together than `trigger_cooldown` are dropped without an error.

mod state;

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::error::{ClientError, Result, StatusCode};
use crate::payload::Payload;
use crate::service::{WorkerHost, WorkflowService};
use crate::types::{
    CreateScheduleRequest, LifecycleStage, QueryRequest, ScheduleDescription, SignalRequest,
    StartWorkflowRequest, UpdateOutcome, UpdateRequest, UpdateResponse, WorkflowDescription,
    WorkflowExecution, WorkflowOutcome, WorkflowStatus,
};
use crate::workflow::WorkerOptions;

use state::{
    EngineState, ScheduleRecord, UpdateEntry, WorkerSlot, key, schedule_not_found, workflow_not_found,
};

/// Tunables of the in-process engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long the engine waits for a worker before failing a call with
    /// `DEADLINE_EXCEEDED` (default: 10s)
    pub server_deadline: Duration,
    /// Minimum spacing between manual schedule triggers (default: 1s)
    pub trigger_cooldown: Duration,
    /// Number of recent actions kept per schedule (default: 10)
    pub max_recent_actions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_deadline: Duration::from_secs(10),
            trigger_cooldown: Duration::from_secs(1),
            max_recent_actions: 10,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_deadline(mut self, deadline: Duration) -> Self {
        self.server_deadline = deadline;
        self
    }

    pub fn with_trigger_cooldown(mut self, cooldown: Duration) -> Self {
        self.trigger_cooldown = cooldown;
        self
    }

    pub fn with_max_recent_actions(mut self, max: usize) -> Self {
        self.max_recent_actions = max;
        self
    }
}

struct Inner {
    config: EngineConfig,
    state: Mutex<EngineState>,
    changes: watch::Sender<u64>,
}

impl Inner {
    /// Run `f` under the engine lock and wake waiters if it changed anything.
    fn with_state<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> R {
        let (result, dirty) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let result = f(&mut state);
            (result, std::mem::take(&mut state.dirty))
        };
        if dirty {
            self.changes.send_modify(|version| *version = version.wrapping_add(1));
        }
        result
    }
}

/// In-process engine and worker host.
///
/// Cloning is cheap; clones share the same engine.
#[derive(Clone)]
pub struct MemoryEngine {
    inner: Arc<Inner>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl MemoryEngine {
    pub fn new(config: EngineConfig) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(EngineState::default()),
                changes,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Number of running executions on a task queue.
    pub fn running_executions(&self, namespace: &str, task_queue: &str) -> usize {
        self.inner.with_state(|state| {
            state
                .executions
                .iter()
                .filter(|((ns, _), e)| {
                    ns == namespace && e.task_queue == task_queue && !e.status.is_closed()
                })
                .count()
        })
    }

    /// Number of schedules in a namespace.
    pub fn schedule_count(&self, namespace: &str) -> usize {
        self.inner
            .with_state(|state| state.schedules.keys().filter(|(ns, _)| ns == namespace).count())
    }

    /// Re-run `lookup` after every engine change until it yields a value or
    /// `deadline` passes. Returns `Ok(None)` on deadline.
    async fn wait_for<T>(
        &self,
        deadline: Instant,
        mut lookup: impl FnMut(&mut EngineState) -> Result<Option<T>> + Send,
    ) -> Result<Option<T>> {
        let mut changes = self.inner.changes.subscribe();
        loop {
            changes.borrow_and_update();
            if let Some(found) = self.inner.with_state(&mut lookup)? {
                return Ok(Some(found));
            }
            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => return Ok(None),
            }
        }
    }

    fn server_deadline(&self) -> Instant {
        Instant::now() + self.inner.config.server_deadline
    }

    fn deadline_exceeded(&self, operation: &str) -> ClientError {
        ClientError::service(
            StatusCode::DeadlineExceeded,
            format!(
                "{}: no worker picked up the request within {:?}",
                operation, self.inner.config.server_deadline
            ),
        )
    }

    fn spawn_ticker(&self, namespace: String, schedule_id: String, interval: Duration, record: &ScheduleRecord) {
        let engine: Weak<Inner> = Arc::downgrade(&self.inner);
        let cancel = record.cancel.clone();
        let max_recent_actions = self.inner.config.max_recent_actions;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = engine.upgrade() else { break };
                        let fired = inner.with_state(|state| {
                            let paused = state.schedule_mut(&namespace, &schedule_id)?.paused;
                            if paused {
                                return Ok(());
                            }
                            state.take_schedule_action(&namespace, &schedule_id, max_recent_actions)
                        });
                        if fired.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(schedule_id = %schedule_id, "Schedule ticker stopped");
        });
    }
}

#[async_trait]
impl WorkflowService for MemoryEngine {
    #[instrument(skip(self, request), fields(workflow_id = %request.workflow_id, workflow_type = %request.workflow_type))]
    async fn start_workflow(&self, request: StartWorkflowRequest) -> Result<WorkflowExecution> {
        let namespace = request.namespace.clone();
        self.inner.with_state(|state| state.start(&namespace, request))
    }

    async fn signal_workflow(&self, request: SignalRequest) -> Result<()> {
        self.inner.with_state(|state| {
            state
                .running_execution_mut(&request.namespace, &request.workflow_id)?
                .push_signal(request.signal_name, request.args);
            state.dirty = true;
            state.drive(&request.namespace, &request.workflow_id);
            Ok(())
        })
    }

    #[instrument(skip(self, request), fields(workflow_id = %request.workflow_id, query = %request.query_name))]
    async fn query_workflow(&self, request: QueryRequest) -> Result<Payload> {
        let answered = self
            .wait_for(self.server_deadline(), |state| {
                let task_queue = state
                    .execution(&request.namespace, &request.workflow_id)?
                    .task_queue
                    .clone();
                let Some(converter) = state
                    .active_worker(&request.namespace, &task_queue)
                    .map(|options| options.converter.clone())
                else {
                    return Ok(None);
                };
                state.drive(&request.namespace, &request.workflow_id);
                state
                    .execution(&request.namespace, &request.workflow_id)?
                    .query(&request.query_name, &request.args, &converter)
                    .map(Some)
            })
            .await?;
        answered.ok_or_else(|| self.deadline_exceeded("query"))
    }

    #[instrument(skip(self, request), fields(workflow_id = %request.workflow_id, update_id = %request.update_id))]
    async fn update_workflow(&self, request: UpdateRequest) -> Result<UpdateResponse> {
        let namespace = request.namespace.as_str();
        let workflow_id = request.workflow_id.as_str();
        let update_id = request.update_id.as_str();

        self.inner.with_state(|state| {
            let execution = state.running_execution_mut(namespace, workflow_id)?;
            if execution.update(update_id).is_none() {
                execution.updates.push(UpdateEntry {
                    id: update_id.to_string(),
                    name: request.update_name.clone(),
                    args: request.args.clone(),
                    accepted: false,
                    outcome: None,
                });
                state.dirty = true;
            }
            state.drive(namespace, workflow_id);
            Ok::<_, ClientError>(())
        })?;

        let deadline = self.server_deadline();
        let accepted = self
            .wait_for(deadline, |state| {
                let update = state
                    .execution(namespace, workflow_id)?
                    .update(update_id)
                    .filter(|u| u.accepted)
                    .map(|u| u.outcome.clone());
                Ok(update)
            })
            .await?;

        let Some(outcome) = accepted else {
            // Never admitted by a worker; forget it.
            self.inner.with_state(|state| {
                if let Some(execution) = state.executions.get_mut(&key(namespace, workflow_id)) {
                    execution.updates.retain(|u| u.id != update_id || u.accepted);
                }
            });
            return Err(self.deadline_exceeded("update"));
        };

        let outcome = match (request.wait_for_stage, outcome) {
            (LifecycleStage::Completed, None) => {
                self.wait_for(deadline, |state| {
                    Ok(state
                        .execution(namespace, workflow_id)?
                        .update(update_id)
                        .and_then(|u| u.outcome.clone()))
                })
                .await?
            }
            (_, outcome) => outcome,
        };

        let stage = if outcome.is_some() {
            LifecycleStage::Completed
        } else {
            LifecycleStage::Accepted
        };
        debug!(stage = ?stage, "Update response");
        Ok(UpdateResponse {
            update_id: request.update_id.clone(),
            stage,
            outcome,
        })
    }

    async fn poll_update(
        &self,
        namespace: &str,
        workflow_id: &str,
        update_id: &str,
        wait: Duration,
    ) -> Result<Option<UpdateOutcome>> {
        self.wait_for(Instant::now() + wait, |state| {
            let update = state
                .execution(namespace, workflow_id)?
                .update(update_id)
                .ok_or_else(|| {
                    ClientError::service(
                        StatusCode::NotFound,
                        format!("update {} not found", update_id),
                    )
                })?;
            Ok(update.outcome.clone())
        })
        .await
    }

    async fn poll_result(
        &self,
        namespace: &str,
        workflow_id: &str,
        wait: Duration,
    ) -> Result<Option<WorkflowOutcome>> {
        self.wait_for(Instant::now() + wait, |state| {
            Ok(state.execution(namespace, workflow_id)?.outcome.clone())
        })
        .await
    }

    async fn describe_workflow(
        &self,
        namespace: &str,
        workflow_id: &str,
    ) -> Result<WorkflowDescription> {
        self.inner.with_state(|state| {
            Ok(state.execution(namespace, workflow_id)?.describe(workflow_id))
        })
    }

    #[instrument(skip(self))]
    async fn terminate_workflow(
        &self,
        namespace: &str,
        workflow_id: &str,
        reason: &str,
    ) -> Result<()> {
        self.inner.with_state(|state| {
            let execution = match state.executions.get_mut(&key(namespace, workflow_id)) {
                Some(execution) if !execution.status.is_closed() => execution,
                Some(_) => {
                    return Err(ClientError::service(
                        StatusCode::FailedPrecondition,
                        format!("workflow execution {} is not running", workflow_id),
                    ));
                }
                None => return Err(workflow_not_found(workflow_id)),
            };
            execution.close(
                WorkflowStatus::Terminated,
                WorkflowOutcome::Terminated(reason.to_string()),
            );
            state.dirty = true;
            info!("Workflow terminated");
            Ok(())
        })
    }

    #[instrument(skip(self, request), fields(schedule_id = %request.schedule_id))]
    async fn create_schedule(&self, request: CreateScheduleRequest) -> Result<()> {
        let namespace = request.namespace.clone();
        let schedule_id = request.schedule_id.clone();
        let intervals = request.intervals.clone();

        self.inner.with_state(|state| {
            let entity = key(&namespace, &schedule_id);
            if state.schedules.contains_key(&entity) {
                return Err(ClientError::service(
                    StatusCode::AlreadyExists,
                    format!("schedule {} already exists", schedule_id),
                ));
            }
            let record = ScheduleRecord::new(request);
            for interval in intervals.iter().filter(|i| !i.is_zero()) {
                self.spawn_ticker(namespace.clone(), schedule_id.clone(), *interval, &record);
            }
            state.schedules.insert(entity, record);
            state.dirty = true;
            Ok(())
        })
    }

    async fn describe_schedule(
        &self,
        namespace: &str,
        schedule_id: &str,
    ) -> Result<ScheduleDescription> {
        self.inner
            .with_state(|state| Ok(state.schedule_mut(namespace, schedule_id)?.describe()))
    }

    #[instrument(skip(self))]
    async fn trigger_schedule(&self, namespace: &str, schedule_id: &str) -> Result<()> {
        let cooldown = self.inner.config.trigger_cooldown;
        let max_recent_actions = self.inner.config.max_recent_actions;

        self.inner.with_state(|state| {
            let record = state.schedule_mut(namespace, schedule_id)?;
            let now = Instant::now();
            if let Some(last) = record.last_trigger
                && now.duration_since(last) < cooldown
            {
                debug!("Trigger dropped by rate limit");
                return Ok(());
            }
            record.last_trigger = Some(now);
            state.take_schedule_action(namespace, schedule_id, max_recent_actions)
        })
    }

    async fn set_schedule_paused(
        &self,
        namespace: &str,
        schedule_id: &str,
        paused: bool,
        note: &str,
    ) -> Result<()> {
        self.inner.with_state(|state| {
            let record = state.schedule_mut(namespace, schedule_id)?;
            record.paused = paused;
            record.note = note.to_string();
            state.dirty = true;
            Ok(())
        })
    }

    #[instrument(skip(self))]
    async fn delete_schedule(&self, namespace: &str, schedule_id: &str) -> Result<()> {
        self.inner.with_state(|state| {
            let record = state
                .schedules
                .remove(&key(namespace, schedule_id))
                .ok_or_else(|| schedule_not_found(schedule_id))?;
            record.cancel.cancel();
            state.dirty = true;
            Ok(())
        })
    }
}

#[async_trait]
impl WorkerHost for MemoryEngine {
    #[instrument(skip(self, options), fields(namespace = %options.namespace, task_queue = %options.task_queue))]
    async fn start_worker(&self, options: WorkerOptions) -> Result<()> {
        let namespace = options.namespace.clone();
        let task_queue = options.task_queue.clone();
        self.inner.with_state(|state| {
            state
                .workers
                .insert(key(&namespace, &task_queue), WorkerSlot { options, active: true });
            state.dirty = true;
            state.drive_queue(&namespace, &task_queue);
        });
        info!("Worker polling");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop_worker(&self, namespace: &str, task_queue: &str) -> Result<()> {
        let stopped = self.inner.with_state(|state| {
            match state.workers.get_mut(&key(namespace, task_queue)) {
                Some(slot) if slot.active => {
                    slot.active = false;
                    state.dirty = true;
                    true
                }
                _ => false,
            }
        });
        if stopped {
            info!("Worker stopped");
        }
        Ok(())
    }

    async fn is_polling(&self, namespace: &str, task_queue: &str) -> bool {
        self.inner
            .with_state(|state| state.active_worker(namespace, task_queue).is_some())
    }
}
