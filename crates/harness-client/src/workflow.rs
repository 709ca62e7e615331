// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker-side workflow definitions.
//!
//! A workflow type is registered with a worker as a [`WorkflowRegistration`]:
//! a type name plus a factory that builds a fresh [`WorkflowInstance`] from the
//! start arguments.
//!
//! Instances are driven by the worker. Handlers that need to wait for a
//! condition (the workflow body, or an update waiting on a flag) return
//! [`Poll::Pending`]; the worker polls them again after every state change,
//! so a pending handler must be safe to re-enter until it returns
//! [`Poll::Ready`].

use std::fmt;
use std::task::Poll;

use serde_json::Value;

use crate::error::ApplicationFailure;
use crate::payload::DataConverter;

/// Outcome of a handler that may need to wait.
pub type HandlerPoll = Poll<Result<Value, ApplicationFailure>>;

/// State and handlers of one running workflow.
pub trait WorkflowInstance: Send {
    /// Poll the workflow body.
    fn poll_run(&mut self) -> HandlerPoll;

    /// Handle a signal.
    fn handle_signal(&mut self, name: &str, args: &[Value]) -> Result<(), ApplicationFailure> {
        let _ = args;
        Err(ApplicationFailure::unknown_handler("signal", name))
    }

    /// Handle a read-only query.
    fn handle_query(&self, name: &str, args: &[Value]) -> Result<Value, ApplicationFailure> {
        let _ = args;
        Err(ApplicationFailure::unknown_handler("query", name))
    }

    /// Handle an update.
    fn handle_update(&mut self, name: &str, args: &[Value]) -> HandlerPoll {
        let _ = args;
        Poll::Ready(Err(ApplicationFailure::unknown_handler("update", name)))
    }
}

/// Builds a workflow instance from its start arguments.
pub type WorkflowFactory = fn(&[Value]) -> Result<Box<dyn WorkflowInstance>, ApplicationFailure>;

/// A workflow type known to a worker.
#[derive(Clone, Copy)]
pub struct WorkflowRegistration {
    pub workflow_type: &'static str,
    pub factory: WorkflowFactory,
}

impl WorkflowRegistration {
    pub const fn new(workflow_type: &'static str, factory: WorkflowFactory) -> Self {
        Self {
            workflow_type,
            factory,
        }
    }
}

impl fmt::Debug for WorkflowRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRegistration")
            .field("workflow_type", &self.workflow_type)
            .finish()
    }
}

/// Everything a worker needs to poll one task queue.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub namespace: String,
    pub task_queue: String,
    pub workflows: Vec<WorkflowRegistration>,
    pub activities: Vec<String>,
    pub converter: DataConverter,
}

impl WorkerOptions {
    pub fn new(namespace: impl Into<String>, task_queue: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            task_queue: task_queue.into(),
            workflows: Vec::new(),
            activities: Vec::new(),
            converter: DataConverter::default(),
        }
    }

    pub fn with_workflow(mut self, registration: WorkflowRegistration) -> Self {
        self.workflows.push(registration);
        self
    }

    pub fn with_activity(mut self, activity_type: impl Into<String>) -> Self {
        self.activities.push(activity_type.into());
        self
    }

    pub fn with_converter(mut self, converter: DataConverter) -> Self {
        self.converter = converter;
        self
    }

    /// Find the registration for a workflow type.
    pub fn workflow(&self, workflow_type: &str) -> Option<&WorkflowRegistration> {
        self.workflows
            .iter()
            .find(|w| w.workflow_type == workflow_type)
    }
}
