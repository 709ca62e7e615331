// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Feature definitions.
//!
//! A [`Feature`] bundles the workflows a worker must register on one task
//! queue with the checks that exercise them. Feature crates expose their
//! features through [`FeatureProvider`]s submitted with `inventory`:
//!
//! ```ignore
//! fn feature() -> Feature {
//!     Feature::new("update/client_interceptor")
//!         .with_workflow(WorkflowRegistration::new("Workflow", FeatureWorkflow::build))
//!         .with_check(Check::new("FeatureChecker", "check", check).stub(0, StubDescriptor::new("Workflow")))
//! }
//!
//! inventory::submit! { FeatureProvider::new(feature) }
//! ```

use std::fmt;
use std::sync::Arc;

use harness_client::{DataConverter, PayloadConverter, WorkerOptions, WorkflowRegistration};

use crate::descriptor::Check;

/// Static description of one feature.
#[derive(Clone)]
pub struct Feature {
    task_queue: String,
    workflows: Vec<WorkflowRegistration>,
    activities: Vec<String>,
    checks: Vec<Check>,
    converters: Vec<Arc<dyn PayloadConverter>>,
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("task_queue", &self.task_queue)
            .field("workflows", &self.workflow_types())
            .field("activities", &self.activities)
            .field(
                "checks",
                &self.checks.iter().map(|c| c.id()).collect::<Vec<_>>(),
            )
            .field(
                "converters",
                &self.converters.iter().map(|c| c.encoding()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Feature {
    /// Create a feature bound to `task_queue`.
    pub fn new(task_queue: impl Into<String>) -> Self {
        Self {
            task_queue: task_queue.into(),
            workflows: Vec::new(),
            activities: Vec::new(),
            checks: Vec::new(),
            converters: Vec::new(),
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

    pub fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Add a payload converter used by this feature's clients and worker.
    pub fn with_converter(mut self, converter: Arc<dyn PayloadConverter>) -> Self {
        self.converters.push(converter);
        self
    }

    pub fn task_queue(&self) -> &str {
        &self.task_queue
    }

    pub fn workflows(&self) -> &[WorkflowRegistration] {
        &self.workflows
    }

    pub fn workflow_types(&self) -> Vec<&'static str> {
        self.workflows.iter().map(|w| w.workflow_type).collect()
    }

    pub fn has_workflow(&self, workflow_type: &str) -> bool {
        self.workflows.iter().any(|w| w.workflow_type == workflow_type)
    }

    pub fn activities(&self) -> &[String] {
        &self.activities
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn converters(&self) -> &[Arc<dyn PayloadConverter>] {
        &self.converters
    }

    /// Converter chain for this feature: its own converters ahead of `base`.
    pub fn data_converter(&self, base: &DataConverter) -> DataConverter {
        base.with_converters(self.converters.clone())
    }

    /// Options for a worker polling this feature's task queue.
    pub fn worker_options(&self, namespace: &str, base: &DataConverter) -> WorkerOptions {
        let options = WorkerOptions::new(namespace, &self.task_queue)
            .with_converter(self.data_converter(base));
        let options = self
            .workflows
            .iter()
            .fold(options, |options, w| options.with_workflow(*w));
        self.activities
            .iter()
            .fold(options, |options, a| options.with_activity(a))
    }
}

/// Builds a feature; submitted through `inventory` by feature crates.
pub struct FeatureProvider {
    pub build: fn() -> Feature,
}

impl FeatureProvider {
    pub const fn new(build: fn() -> Feature) -> Self {
        Self { build }
    }
}

inventory::collect!(FeatureProvider);

#[cfg(test)]
mod tests {
    use super::*;
    use harness_client::{ApplicationFailure, HandlerPoll, JSON_ENCODING, Payload, WorkflowInstance};
    use serde_json::Value;
    use std::task::Poll;

    struct Noop;

    impl WorkflowInstance for Noop {
        fn poll_run(&mut self) -> HandlerPoll {
            Poll::Ready(Ok(Value::Null))
        }
    }

    fn noop(_args: &[Value]) -> std::result::Result<Box<dyn WorkflowInstance>, ApplicationFailure> {
        Ok(Box::new(Noop))
    }

    struct Upper;

    impl PayloadConverter for Upper {
        fn encoding(&self) -> &str {
            "text/upper"
        }

        fn to_payload(&self, _value: &Value) -> harness_client::Result<Option<Payload>> {
            Ok(None)
        }

        fn from_payload(&self, payload: &Payload) -> harness_client::Result<Value> {
            Ok(Value::String(String::from_utf8_lossy(&payload.data).to_uppercase()))
        }
    }

    #[test]
    fn test_worker_options_carry_feature_definitions() {
        let feature = Feature::new("query/simple")
            .with_workflow(WorkflowRegistration::new("Workflow", noop))
            .with_activity("Activity")
            .with_converter(Arc::new(Upper));

        assert!(feature.has_workflow("Workflow"));
        assert!(!feature.has_workflow("Other"));

        let options = feature.worker_options("default", &DataConverter::default());
        assert_eq!(options.task_queue, "query/simple");
        assert_eq!(options.namespace, "default");
        assert!(options.workflow("Workflow").is_some());
        assert_eq!(options.activities, vec!["Activity".to_string()]);
        assert_eq!(options.converter.encodings(), vec!["text/upper", JSON_ENCODING]);
    }
}
