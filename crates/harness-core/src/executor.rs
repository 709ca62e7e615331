// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Check execution.
//!
//! The [`Executor`] runs a feature's checks one at a time. Each invocation
//! gets a fresh [`ResolutionContext`] that is released on every exit path,
//! and each check body runs in its own task so a panic or a hang is recorded
//! against that check alone. A failed release fails the check even when the
//! body passed.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use harness_client::WorkerHost;
use tokio::time::Instant;
use tracing::{Instrument, error, info, info_span, instrument, warn};

use crate::descriptor::Check;
use crate::error::{CheckError, CheckFailure};
use crate::feature::Feature;
use crate::injector::{Injector, ResolutionContext};
use crate::runner::Runner;
use crate::state::RuntimeState;

/// Outcome of running one feature.
#[derive(Debug)]
pub struct FeatureResult {
    pub task_queue: String,
    /// Ids of checks that passed, in run order.
    pub passed: Vec<String>,
    pub failures: Vec<CheckFailure>,
    /// Ids of checks never run because setup failed.
    pub skipped: Vec<String>,
    pub duration: Duration,
}

impl FeatureResult {
    fn new(task_queue: &str) -> Self {
        Self {
            task_queue: task_queue.to_string(),
            passed: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

/// Runs the checks of a feature.
#[derive(Clone)]
pub struct Executor {
    host: Arc<dyn WorkerHost>,
    check_timeout: Duration,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("check_timeout", &self.check_timeout)
            .finish()
    }
}

impl Executor {
    pub fn new(host: Arc<dyn WorkerHost>, check_timeout: Duration) -> Self {
        Self {
            host,
            check_timeout,
        }
    }

    /// Run every check of `feature` in registration order.
    ///
    /// A failing check does not stop the others. A setup failure (worker
    /// start or parameter resolution) ends the feature; the remaining checks
    /// are reported as skipped.
    #[instrument(skip_all, fields(task_queue = %feature.task_queue()))]
    pub async fn run(&self, state: &RuntimeState, feature: Arc<Feature>) -> FeatureResult {
        let started = Instant::now();
        let options = feature.worker_options(&state.namespace, state.client().converter());
        let runner = Runner::new(self.host.clone(), options);
        let injector = Injector::new(state.scoped_to(feature.clone()), feature.clone(), runner.clone());

        let mut result = FeatureResult::new(feature.task_queue());
        let mut checks = feature.checks().iter();
        while let Some(check) = checks.next() {
            let check_id = check.id();
            match self.run_check(&injector, &runner, check).await {
                Ok(()) => {
                    info!(check = %check_id, "Check passed");
                    result.passed.push(check_id);
                }
                Err(cause) => {
                    error!(check = %check_id, error = %cause, "Check failed");
                    let setup = cause.is_setup();
                    result.failures.push(CheckFailure { check_id, cause });
                    if setup {
                        result.skipped.extend(checks.by_ref().map(Check::id));
                        break;
                    }
                }
            }
        }

        if let Err(e) = runner.stop().await {
            warn!(error = %e, "Failed to stop worker");
        }
        result.duration = started.elapsed();
        result
    }

    async fn run_check(&self, injector: &Injector, runner: &Runner, check: &Check) -> Result<(), CheckError> {
        runner.start().await.map_err(CheckError::Setup)?;

        let mut ctx = ResolutionContext::new();
        let outcome = self.invoke(injector, check, &mut ctx).await;
        let teardown = ctx.release().await;
        if teardown.is_empty() {
            return outcome;
        }
        Err(CheckError::Teardown {
            errors: teardown,
            cause: outcome.err().map(Box::new),
        })
    }

    async fn invoke(
        &self,
        injector: &Injector,
        check: &Check,
        ctx: &mut ResolutionContext,
    ) -> Result<(), CheckError> {
        let args = injector.resolve(check, ctx).await.map_err(CheckError::Setup)?;
        let body = check.invoke(args).map_err(CheckError::Setup)?;

        let span = info_span!("check", check = %check.id());
        let task = tokio::spawn(body.instrument(span));
        let abort = task.abort_handle();

        match tokio::time::timeout(self.check_timeout, task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(CheckError::Failed(e)),
            Ok(Err(join_error)) if join_error.is_panic() => {
                Err(CheckError::Panicked(panic_message(join_error.into_panic())))
            }
            Ok(Err(join_error)) => Err(CheckError::Panicked(join_error.to_string())),
            Err(_) => {
                abort.abort();
                Err(CheckError::TimedOut(self.check_timeout))
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
