// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! A client built with a custom interceptor pipeline rewrites update
//! arguments before they leave the client.

use std::task::Poll;

use anyhow::ensure;
use harness_client::{
    ApplicationFailure, ClientInterceptor, HandlerPoll, InterceptorPipeline, UpdateInput,
    WorkflowInstance, WorkflowRegistration, WorkflowStub,
};
use harness_core::{Check, ClientDescriptor, Feature, FeatureProvider, StubDescriptor};
use serde_json::{Value, json};

#[derive(Default)]
struct EchoWorkflow {
    done: bool,
}

impl WorkflowInstance for EchoWorkflow {
    fn poll_run(&mut self) -> HandlerPoll {
        if self.done {
            Poll::Ready(Ok(Value::Null))
        } else {
            Poll::Pending
        }
    }

    fn handle_update(&mut self, name: &str, args: &[Value]) -> HandlerPoll {
        match name {
            "my_update" => {
                self.done = true;
                Poll::Ready(Ok(args.first().cloned().unwrap_or(Value::Null)))
            }
            other => Poll::Ready(Err(ApplicationFailure::unknown_handler("update", other))),
        }
    }
}

fn build(_args: &[Value]) -> Result<Box<dyn WorkflowInstance>, ApplicationFailure> {
    Ok(Box::new(EchoWorkflow::default()))
}

/// Adds one to the first argument of `my_update`.
struct IncrementUpdateArg;

impl ClientInterceptor for IncrementUpdateArg {
    fn update(&self, mut input: UpdateInput) -> UpdateInput {
        if input.update_name == "my_update"
            && let Some(arg) = input.args.first_mut()
            && let Some(n) = arg.as_i64()
        {
            *arg = json!(n + 1);
        }
        input
    }
}

fn pipeline() -> InterceptorPipeline {
    InterceptorPipeline::default().with(IncrementUpdateArg)
}

async fn check(stub: WorkflowStub) -> anyhow::Result<()> {
    let result = stub.update("my_update", vec![json!(1)]).await?;
    ensure!(result == json!(2), "expected 2, got {}", result);
    stub.get_result(None).await?;
    Ok(())
}

pub fn feature() -> Feature {
    Feature::new("update/client_interceptor")
        .with_workflow(WorkflowRegistration::new("Workflow", build))
        .with_check(
            Check::new("FeatureChecker", "check", check)
                .stub(0, StubDescriptor::new("Workflow"))
                .client(0, ClientDescriptor::new().with_pipeline_provider(pipeline)),
        )
}

inventory::submit! { FeatureProvider::new(feature) }
