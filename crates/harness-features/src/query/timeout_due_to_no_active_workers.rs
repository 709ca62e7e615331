// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! A query sent while no worker polls the task queue fails with either
//! `DEADLINE_EXCEEDED` (engine gave up) or `CANCELLED` (client gave up first).

use std::task::Poll;

use harness_client::{
    ApplicationFailure, HandlerPoll, WorkflowInstance, WorkflowRegistration, WorkflowStub,
};
use harness_core::{
    Check, Feature, FeatureProvider, Runner, StubDescriptor, expect_deadline_or_cancelled,
};
use serde_json::{Value, json};
use tracing::info;

#[derive(Default)]
struct QueryWorkflow {
    be_done: bool,
}

impl WorkflowInstance for QueryWorkflow {
    fn poll_run(&mut self) -> HandlerPoll {
        if self.be_done {
            Poll::Ready(Ok(Value::Null))
        } else {
            Poll::Pending
        }
    }

    fn handle_signal(&mut self, name: &str, _args: &[Value]) -> Result<(), ApplicationFailure> {
        match name {
            "finish" => {
                self.be_done = true;
                Ok(())
            }
            other => Err(ApplicationFailure::unknown_handler("signal", other)),
        }
    }

    fn handle_query(&self, name: &str, _args: &[Value]) -> Result<Value, ApplicationFailure> {
        match name {
            "simple_query" => Ok(json!(true)),
            other => Err(ApplicationFailure::unknown_handler("query", other)),
        }
    }
}

fn build(_args: &[Value]) -> Result<Box<dyn WorkflowInstance>, ApplicationFailure> {
    Ok(Box::new(QueryWorkflow::default()))
}

async fn check(stub: WorkflowStub, runner: Runner) -> anyhow::Result<()> {
    runner.stop().await?;
    let code = expect_deadline_or_cancelled(stub.query("simple_query", vec![]).await)?;
    info!(code = %code, "Query without an active worker failed");

    runner.start().await?;
    stub.signal("finish", vec![]).await?;
    stub.get_result(None).await?;
    Ok(())
}

pub fn feature() -> Feature {
    Feature::new("query/timeout_due_to_no_active_workers")
        .with_workflow(WorkflowRegistration::new("Workflow", build))
        .with_check(Check::new("FeatureChecker", "check", check).stub(0, StubDescriptor::new("Workflow")))
}

inventory::submit! { FeatureProvider::new(feature) }
