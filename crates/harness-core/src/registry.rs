// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Feature registry.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{HarnessError, Result};
use crate::feature::{Feature, FeatureProvider};

/// Registered features, in registration order.
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    features: Vec<Arc<Feature>>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a feature.
    ///
    /// Fails if another feature already claims the task queue, or if a stub
    /// descriptor names a workflow the feature does not define.
    pub fn register(&mut self, feature: Feature) -> Result<()> {
        if self.get(feature.task_queue()).is_some() {
            return Err(HarnessError::DuplicateTaskQueue {
                task_queue: feature.task_queue().to_string(),
            });
        }

        let stubs = feature
            .checks()
            .iter()
            .flat_map(|check| check.params())
            .filter_map(|param| param.stub.as_ref());
        for stub in stubs {
            if !feature.has_workflow(&stub.workflow_type) {
                return Err(HarnessError::UnknownWorkflowType {
                    task_queue: feature.task_queue().to_string(),
                    workflow_type: stub.workflow_type.clone(),
                });
            }
        }

        debug!(
            task_queue = %feature.task_queue(),
            checks = feature.checks().len(),
            "Feature registered"
        );
        self.features.push(Arc::new(feature));
        Ok(())
    }

    /// All features in registration order. The iterator can be cloned to
    /// walk the features again.
    pub fn all_features(&self) -> impl Iterator<Item = &Arc<Feature>> + Clone + '_ {
        self.features.iter()
    }

    pub fn get(&self, task_queue: &str) -> Option<&Arc<Feature>> {
        self.features.iter().find(|f| f.task_queue() == task_queue)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Register every feature submitted through [`FeatureProvider`], sorted
    /// by task queue. When `prefixes` is non-empty only features whose task
    /// queue starts with one of them are registered.
    pub fn discover(prefixes: &[String]) -> Result<Self> {
        let mut features: Vec<Feature> = inventory::iter::<FeatureProvider>
            .into_iter()
            .map(|provider| (provider.build)())
            .collect();
        features.sort_by(|a, b| a.task_queue().cmp(b.task_queue()));

        let mut registry = Self::new();
        for feature in features {
            let selected = prefixes.is_empty()
                || prefixes
                    .iter()
                    .any(|prefix| feature.task_queue().starts_with(prefix.as_str()));
            if selected {
                registry.register(feature)?;
            } else {
                debug!(task_queue = %feature.task_queue(), "Feature filtered out");
            }
        }

        info!(features = registry.len(), "Features discovered");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Check, StubDescriptor};
    use harness_client::{
        ApplicationFailure, HandlerPoll, WorkflowInstance, WorkflowRegistration, WorkflowStub,
    };
    use serde_json::Value;
    use std::task::Poll;

    struct Done;

    impl WorkflowInstance for Done {
        fn poll_run(&mut self) -> HandlerPoll {
            Poll::Ready(Ok(Value::Null))
        }
    }

    fn done(_args: &[Value]) -> std::result::Result<Box<dyn WorkflowInstance>, ApplicationFailure> {
        Ok(Box::new(Done))
    }

    async fn check(_stub: WorkflowStub) -> anyhow::Result<()> {
        Ok(())
    }

    fn feature(task_queue: &str, stub_type: &str) -> Feature {
        Feature::new(task_queue)
            .with_workflow(WorkflowRegistration::new("Workflow", done))
            .with_check(Check::new("Checker", "check", check).stub(0, StubDescriptor::new(stub_type)))
    }

    #[test]
    fn test_register_preserves_order() {
        let mut registry = FeatureRegistry::new();
        registry.register(feature("b", "Workflow")).unwrap();
        registry.register(feature("a", "Workflow")).unwrap();

        let all = registry.all_features();
        let first: Vec<_> = all.clone().map(|f| f.task_queue().to_string()).collect();
        let second: Vec<_> = all.map(|f| f.task_queue().to_string()).collect();
        assert_eq!(first, vec!["b", "a"]);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_some());
    }

    #[test]
    fn test_duplicate_task_queue_rejected() {
        let mut registry = FeatureRegistry::new();
        registry.register(feature("a", "Workflow")).unwrap();

        let err = registry.register(feature("a", "Workflow")).unwrap_err();
        assert!(matches!(err, HarnessError::DuplicateTaskQueue { ref task_queue } if task_queue == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_stub_for_undefined_workflow_rejected() {
        let mut registry = FeatureRegistry::new();
        let err = registry.register(feature("a", "Other")).unwrap_err();
        assert!(matches!(err, HarnessError::UnknownWorkflowType { .. }));
        assert!(registry.is_empty());
    }
}
