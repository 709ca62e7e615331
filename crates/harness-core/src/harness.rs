// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Harness driver: runs every registered feature and collects a report.

use std::sync::Arc;
use std::time::Duration;

use harness_client::{WorkerHost, WorkflowClient, WorkflowService};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::config::HarnessConfig;
use crate::error::CheckFailure;
use crate::executor::{Executor, FeatureResult};
use crate::registry::FeatureRegistry;
use crate::state::RuntimeState;

/// Aggregated outcome of a harness run.
#[derive(Debug)]
pub struct HarnessReport {
    pub features: Vec<FeatureResult>,
    pub duration: Duration,
}

impl HarnessReport {
    pub fn passed(&self) -> usize {
        self.features.iter().map(|f| f.passed.len()).sum()
    }

    pub fn failed(&self) -> usize {
        self.features.iter().map(|f| f.failures.len()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.features.iter().map(|f| f.skipped.len()).sum()
    }

    /// Every failure of the run.
    pub fn failures(&self) -> impl Iterator<Item = &CheckFailure> {
        self.features.iter().flat_map(|f| f.failures.iter())
    }

    pub fn is_success(&self) -> bool {
        self.features.iter().all(FeatureResult::is_success)
    }
}

/// Runs the features of a registry against one engine.
pub struct Harness {
    config: HarnessConfig,
    registry: FeatureRegistry,
    state: RuntimeState,
    executor: Executor,
}

impl Harness {
    pub fn new(
        config: HarnessConfig,
        registry: FeatureRegistry,
        service: Arc<dyn WorkflowService>,
        host: Arc<dyn WorkerHost>,
    ) -> Self {
        let client = WorkflowClient::new(service, config.client_options());
        Self {
            state: RuntimeState::new(client),
            executor: Executor::new(host, config.check_timeout),
            registry,
            config,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    /// Run every registered feature in registration order.
    #[instrument(skip(self), fields(namespace = %self.state.namespace, features = self.registry.len()))]
    pub async fn run_all(&mut self) -> HarnessReport {
        let started = Instant::now();
        let features: Vec<_> = self.registry.all_features().cloned().collect();

        let mut results = Vec::with_capacity(features.len());
        for feature in features {
            info!(feature = %feature.task_queue(), checks = feature.checks().len(), "Running feature");
            self.state.enter_feature(feature.clone());
            let result = self.executor.run(&self.state, feature).await;
            self.state.leave_feature();

            if result.is_success() {
                info!(
                    feature = %result.task_queue,
                    passed = result.passed.len(),
                    duration_ms = result.duration.as_millis() as u64,
                    "Feature passed"
                );
            } else {
                warn!(
                    feature = %result.task_queue,
                    failed = result.failures.len(),
                    skipped = result.skipped.len(),
                    "Feature failed"
                );
            }
            results.push(result);
        }

        HarnessReport {
            features: results,
            duration: started.elapsed(),
        }
    }
}
