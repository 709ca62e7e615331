// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Manually triggering a paused schedule starts its action each time.

use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use anyhow::Context;
use harness_client::{
    ApplicationFailure, HandlerPoll, Schedule, ScheduleClient, ScheduleHandle, ScheduleOptions,
    ScheduleSpec, ScheduleState, StartWorkflowAction, WorkflowInstance, WorkflowRegistration,
};
use harness_core::{Check, Feature, FeatureProvider, RuntimeState, wait_until};
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

/// Gap between manual triggers; the engine drops triggers that come faster.
const TRIGGER_PACING: Duration = Duration::from_secs(2);
const ACTIONS_DEADLINE: Duration = Duration::from_secs(10);
const ACTIONS_POLL: Duration = Duration::from_millis(100);

/// Returns its first argument.
struct ArgWorkflow {
    arg: Value,
}

impl WorkflowInstance for ArgWorkflow {
    fn poll_run(&mut self) -> HandlerPoll {
        Poll::Ready(Ok(self.arg.clone()))
    }
}

fn build(args: &[Value]) -> Result<Box<dyn WorkflowInstance>, ApplicationFailure> {
    Ok(Box::new(ArgWorkflow {
        arg: args.first().cloned().unwrap_or(Value::Null),
    }))
}

async fn check(
    schedules: ScheduleClient,
    feature: Arc<Feature>,
    runtime: RuntimeState,
) -> anyhow::Result<()> {
    let schedule = Schedule::new()
        .with_action(
            StartWorkflowAction::new("Workflow")
                .with_task_queue(feature.task_queue())
                .with_input(vec![json!("arg1")]),
        )
        .with_spec(ScheduleSpec::new().with_interval(Duration::from_secs(60)))
        .with_state(ScheduleState::new().with_paused(true));
    let handle = schedules
        .create_schedule(
            schedule,
            ScheduleOptions::new()
                .with_schedule_id(Uuid::new_v4().to_string())
                .with_namespace(&runtime.namespace),
        )
        .await?;

    let triggered = trigger_twice(&handle).await;
    let deleted = handle.delete().await;
    triggered?;
    deleted?;
    Ok(())
}

async fn trigger_twice(handle: &ScheduleHandle) -> anyhow::Result<()> {
    handle.trigger().await?;
    tokio::time::sleep(TRIGGER_PACING).await;
    handle.trigger().await?;

    wait_until(ACTIONS_DEADLINE, ACTIONS_POLL, || async {
        let description = handle.describe().await?;
        debug!(num_actions = description.info.num_actions, "Polled schedule");
        Ok::<_, anyhow::Error>(description.info.num_actions >= 2)
    })
    .await
    .context("schedule did not take two actions")
}

pub fn feature() -> Feature {
    Feature::new("schedule/trigger")
        .with_workflow(WorkflowRegistration::new("Workflow", build))
        .with_check(Check::new("FeatureChecker", "check", check))
}

inventory::submit! { FeatureProvider::new(feature) }
