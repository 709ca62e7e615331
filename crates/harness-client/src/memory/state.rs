// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine bookkeeping: workers, executions and schedules.
//!
//! Everything here is synchronous and runs under the engine lock. Driving an
//! execution polls its workflow instance until nothing makes progress; any
//! change sets `dirty` so the engine wakes long-polls once the lock is
//! released.

use std::collections::{HashMap, VecDeque};
use std::task::Poll;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ApplicationFailure, ClientError, Result, StatusCode};
use crate::payload::{DataConverter, Payload};
use crate::types::{
    CreateScheduleRequest, ScheduleActionResult, ScheduleDescription, ScheduleInfo,
    StartWorkflowRequest, UpdateOutcome, WorkflowDescription, WorkflowExecution, WorkflowOutcome,
    WorkflowStatus,
};
use crate::workflow::{WorkerOptions, WorkflowInstance};

/// `(namespace, id)` of an execution or schedule.
pub(crate) type EntityKey = (String, String);

/// `(namespace, task_queue)` of a worker.
pub(crate) type QueueKey = (String, String);

pub(crate) fn key(namespace: &str, id: &str) -> EntityKey {
    (namespace.to_string(), id.to_string())
}

pub(crate) struct WorkerSlot {
    pub options: WorkerOptions,
    pub active: bool,
}

pub(crate) struct UpdateEntry {
    pub id: String,
    pub name: String,
    pub args: Vec<Payload>,
    pub accepted: bool,
    pub outcome: Option<UpdateOutcome>,
}

impl UpdateEntry {
    fn finish(&mut self, result: std::result::Result<Payload, ApplicationFailure>) {
        self.outcome = Some(UpdateOutcome {
            update_id: self.id.clone(),
            update_name: self.name.clone(),
            result,
        });
    }
}

pub(crate) struct Execution {
    pub run_id: String,
    pub workflow_type: String,
    pub task_queue: String,
    args: Vec<Payload>,
    memo: HashMap<String, Payload>,
    instance: Option<Box<dyn WorkflowInstance>>,
    pending_signals: VecDeque<(String, Vec<Payload>)>,
    pub updates: Vec<UpdateEntry>,
    pub status: WorkflowStatus,
    pub outcome: Option<WorkflowOutcome>,
    start_time: DateTime<Utc>,
    close_time: Option<DateTime<Utc>>,
}

impl Execution {
    fn new(request: StartWorkflowRequest) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            workflow_type: request.workflow_type,
            task_queue: request.task_queue,
            args: request.args,
            memo: request.memo,
            instance: None,
            pending_signals: VecDeque::new(),
            updates: Vec::new(),
            status: WorkflowStatus::Running,
            outcome: None,
            start_time: Utc::now(),
            close_time: None,
        }
    }

    pub fn update(&self, update_id: &str) -> Option<&UpdateEntry> {
        self.updates.iter().find(|u| u.id == update_id)
    }

    pub fn describe(&self, workflow_id: &str) -> WorkflowDescription {
        WorkflowDescription {
            execution: WorkflowExecution {
                workflow_id: workflow_id.to_string(),
                run_id: self.run_id.clone(),
            },
            workflow_type: self.workflow_type.clone(),
            task_queue: self.task_queue.clone(),
            status: self.status,
            memo: self.memo.clone(),
            start_time: self.start_time,
            close_time: self.close_time,
        }
    }

    pub fn push_signal(&mut self, name: String, args: Vec<Payload>) {
        self.pending_signals.push_back((name, args));
    }

    /// Close the execution; updates still in flight fail.
    pub fn close(&mut self, status: WorkflowStatus, outcome: WorkflowOutcome) {
        self.status = status;
        self.outcome = Some(outcome);
        self.close_time = Some(Utc::now());
        for update in self.updates.iter_mut().filter(|u| u.outcome.is_none()) {
            update.finish(Err(ApplicationFailure::new(
                "workflow execution completed before the update finished",
                "AcceptedUpdateCompletedWorkflow",
                true,
            )));
        }
    }

    /// Answer a query. Requires a worker to have built the instance.
    pub fn query(
        &self,
        name: &str,
        args: &[Payload],
        converter: &DataConverter,
    ) -> Result<Payload> {
        let instance = self.instance.as_ref().ok_or_else(|| {
            ClientError::service(
                StatusCode::FailedPrecondition,
                "workflow execution has no running instance",
            )
        })?;
        let args = converter.from_payloads(args)?;
        let value = instance
            .handle_query(name, &args)
            .map_err(|source| ClientError::QueryFailed {
                query_name: name.to_string(),
                source,
            })?;
        converter.to_payload(&value)
    }

    /// Run the instance until nothing makes progress. Returns true if
    /// anything changed.
    fn drive(&mut self, workflow_id: &str, options: &WorkerOptions) -> bool {
        if self.status.is_closed() {
            return false;
        }
        let converter = &options.converter;
        let mut changed = false;

        if self.instance.is_none() {
            let Some(registration) = options.workflow(&self.workflow_type) else {
                warn!(
                    workflow_id,
                    workflow_type = %self.workflow_type,
                    task_queue = %self.task_queue,
                    "Worker has no registration for workflow type"
                );
                return false;
            };
            let built = converter
                .from_payloads(&self.args)
                .map_err(|e| ApplicationFailure::new(e.to_string(), "PayloadDecodeError", true))
                .and_then(|args| (registration.factory)(&args));
            match built {
                Ok(instance) => self.instance = Some(instance),
                Err(failure) => {
                    self.close(WorkflowStatus::Failed, WorkflowOutcome::Failed(failure));
                    return true;
                }
            }
            changed = true;
        }

        loop {
            let Some(instance) = self.instance.as_mut() else {
                return changed;
            };
            let mut progressed = false;

            while let Some((name, payloads)) = self.pending_signals.pop_front() {
                progressed = true;
                let delivered = converter
                    .from_payloads(&payloads)
                    .map_err(|e| ApplicationFailure::new(e.to_string(), "PayloadDecodeError", true))
                    .and_then(|args| instance.handle_signal(&name, &args));
                if let Err(failure) = delivered {
                    warn!(workflow_id, signal = %name, error = %failure, "Signal dropped");
                }
            }

            for update in self.updates.iter_mut().filter(|u| u.outcome.is_none()) {
                if !update.accepted {
                    update.accepted = true;
                    progressed = true;
                    debug!(workflow_id, update_id = %update.id, "Update accepted");
                }
                let args = match converter.from_payloads(&update.args) {
                    Ok(args) => args,
                    Err(e) => {
                        update.finish(Err(ApplicationFailure::new(
                            e.to_string(),
                            "PayloadDecodeError",
                            true,
                        )));
                        progressed = true;
                        continue;
                    }
                };
                if let Poll::Ready(result) = instance.handle_update(&update.name, &args) {
                    update.finish(result.and_then(|value| encode(converter, &value)));
                    progressed = true;
                }
            }

            if let Poll::Ready(result) = instance.poll_run() {
                match result.and_then(|value| encode(converter, &value)) {
                    Ok(payload) => {
                        self.close(WorkflowStatus::Completed, WorkflowOutcome::Completed(payload))
                    }
                    Err(failure) => {
                        self.close(WorkflowStatus::Failed, WorkflowOutcome::Failed(failure))
                    }
                }
                info!(workflow_id, status = ?self.status, "Workflow closed");
                return true;
            }

            if !progressed {
                return changed;
            }
            changed = true;
        }
    }
}

fn encode(
    converter: &DataConverter,
    value: &serde_json::Value,
) -> std::result::Result<Payload, ApplicationFailure> {
    converter
        .to_payload(value)
        .map_err(|e| ApplicationFailure::new(e.to_string(), "PayloadEncodeError", true))
}

pub(crate) struct ScheduleRecord {
    pub request: CreateScheduleRequest,
    pub paused: bool,
    pub note: String,
    pub num_actions: u64,
    pub recent_actions: VecDeque<ScheduleActionResult>,
    pub created_at: DateTime<Utc>,
    pub last_trigger: Option<Instant>,
    pub cancel: CancellationToken,
}

impl ScheduleRecord {
    pub fn new(request: CreateScheduleRequest) -> Self {
        Self {
            paused: request.paused,
            note: request.note.clone(),
            request,
            num_actions: 0,
            recent_actions: VecDeque::new(),
            created_at: Utc::now(),
            last_trigger: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn describe(&self) -> ScheduleDescription {
        ScheduleDescription {
            schedule_id: self.request.schedule_id.clone(),
            workflow_type: self.request.workflow_type.clone(),
            task_queue: self.request.task_queue.clone(),
            intervals: self.request.intervals.clone(),
            paused: self.paused,
            note: self.note.clone(),
            info: ScheduleInfo {
                num_actions: self.num_actions,
                recent_actions: self.recent_actions.iter().cloned().collect(),
                created_at: self.created_at,
            },
        }
    }
}

#[derive(Default)]
pub(crate) struct EngineState {
    pub workers: HashMap<QueueKey, WorkerSlot>,
    pub executions: HashMap<EntityKey, Execution>,
    pub schedules: HashMap<EntityKey, ScheduleRecord>,
    pub dirty: bool,
}

impl EngineState {
    /// Options of the worker polling a task queue, if one is active.
    pub fn active_worker(&self, namespace: &str, task_queue: &str) -> Option<&WorkerOptions> {
        self.workers
            .get(&key(namespace, task_queue))
            .filter(|slot| slot.active)
            .map(|slot| &slot.options)
    }

    pub fn execution(&self, namespace: &str, workflow_id: &str) -> Result<&Execution> {
        self.executions
            .get(&key(namespace, workflow_id))
            .ok_or_else(|| workflow_not_found(workflow_id))
    }

    /// A running execution; closed executions report `NOT_FOUND`.
    pub fn running_execution_mut(
        &mut self,
        namespace: &str,
        workflow_id: &str,
    ) -> Result<&mut Execution> {
        match self.executions.get_mut(&key(namespace, workflow_id)) {
            Some(execution) if !execution.status.is_closed() => Ok(execution),
            Some(_) => Err(ClientError::service(
                StatusCode::NotFound,
                format!("workflow execution {} already completed", workflow_id),
            )),
            None => Err(workflow_not_found(workflow_id)),
        }
    }

    pub fn start(&mut self, namespace: &str, request: StartWorkflowRequest) -> Result<WorkflowExecution> {
        let entity = key(namespace, &request.workflow_id);
        if let Some(existing) = self.executions.get(&entity)
            && !existing.status.is_closed()
        {
            return Err(ClientError::service(
                StatusCode::AlreadyExists,
                format!("workflow execution {} is already running", request.workflow_id),
            ));
        }

        let workflow_id = request.workflow_id.clone();
        let execution = Execution::new(request);
        let started = WorkflowExecution {
            workflow_id: workflow_id.clone(),
            run_id: execution.run_id.clone(),
        };
        self.executions.insert(entity, execution);
        self.dirty = true;
        self.drive(namespace, &workflow_id);
        Ok(started)
    }

    /// Drive one execution if a worker polls its task queue.
    pub fn drive(&mut self, namespace: &str, workflow_id: &str) {
        let Some(execution) = self.executions.get_mut(&key(namespace, workflow_id)) else {
            return;
        };
        let Some(slot) = self
            .workers
            .get(&key(namespace, &execution.task_queue))
            .filter(|slot| slot.active)
        else {
            return;
        };
        if execution.drive(workflow_id, &slot.options) {
            self.dirty = true;
        }
    }

    /// Drive every running execution on a task queue.
    pub fn drive_queue(&mut self, namespace: &str, task_queue: &str) {
        let Some(slot) = self
            .workers
            .get(&key(namespace, task_queue))
            .filter(|slot| slot.active)
        else {
            return;
        };
        for ((ns, workflow_id), execution) in self.executions.iter_mut() {
            if ns == namespace
                && execution.task_queue == task_queue
                && execution.drive(workflow_id, &slot.options)
            {
                self.dirty = true;
            }
        }
    }

    /// Take a schedule's action: start one workflow.
    pub fn take_schedule_action(
        &mut self,
        namespace: &str,
        schedule_id: &str,
        max_recent_actions: usize,
    ) -> Result<()> {
        let record = self
            .schedules
            .get_mut(&key(namespace, schedule_id))
            .ok_or_else(|| schedule_not_found(schedule_id))?;
        record.num_actions += 1;
        let workflow_id = format!("{}-action-{}", schedule_id, record.num_actions);
        record.recent_actions.push_back(ScheduleActionResult {
            workflow_id: workflow_id.clone(),
            started_at: Utc::now(),
        });
        while record.recent_actions.len() > max_recent_actions {
            record.recent_actions.pop_front();
        }
        let request = StartWorkflowRequest {
            namespace: namespace.to_string(),
            workflow_id,
            workflow_type: record.request.workflow_type.clone(),
            task_queue: record.request.task_queue.clone(),
            args: record.request.args.clone(),
            memo: HashMap::new(),
            identity: record.request.identity.clone(),
        };
        self.dirty = true;

        info!(schedule_id, workflow_id = %request.workflow_id, "Schedule action taken");
        if let Err(e) = self.start(namespace, request) {
            warn!(schedule_id, error = %e, "Schedule action failed to start workflow");
        }
        Ok(())
    }

    pub fn schedule_mut(&mut self, namespace: &str, schedule_id: &str) -> Result<&mut ScheduleRecord> {
        self.schedules
            .get_mut(&key(namespace, schedule_id))
            .ok_or_else(|| schedule_not_found(schedule_id))
    }
}

pub(crate) fn workflow_not_found(workflow_id: &str) -> ClientError {
    ClientError::service(
        StatusCode::NotFound,
        format!("workflow execution {} not found", workflow_id),
    )
}

pub(crate) fn schedule_not_found(schedule_id: &str) -> ClientError {
    ClientError::service(
        StatusCode::NotFound,
        format!("schedule {} not found", schedule_id),
    )
}
