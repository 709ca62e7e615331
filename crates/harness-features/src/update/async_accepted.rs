// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Updates started with `wait_for_stage = Accepted` return before the handler
//! finishes. Every handle to the update observes the same outcome.

use std::task::Poll;
use std::time::Duration;

use anyhow::{Context, bail, ensure};
use harness_client::{
    ApplicationFailure, ClientError, HandlerPoll, LifecycleStage, UpdateOptions, WorkflowInstance,
    WorkflowRegistration, WorkflowStub,
};
use harness_core::{Check, Feature, FeatureProvider, StubDescriptor, expect_timeout};
use serde_json::{Value, json};
use uuid::Uuid;

/// How long a blocked update is observed before unblocking it.
const BLOCKED_WAIT: Duration = Duration::from_millis(1500);

struct AcceptedWorkflow {
    done: bool,
    blocked: bool,
}

impl WorkflowInstance for AcceptedWorkflow {
    fn poll_run(&mut self) -> HandlerPoll {
        if self.done {
            Poll::Ready(Ok(json!("Hello, World!")))
        } else {
            Poll::Pending
        }
    }

    fn handle_signal(&mut self, name: &str, _args: &[Value]) -> Result<(), ApplicationFailure> {
        match name {
            "finish" => self.done = true,
            "unblock" => self.blocked = false,
            other => return Err(ApplicationFailure::unknown_handler("signal", other)),
        }
        Ok(())
    }

    fn handle_update(&mut self, name: &str, args: &[Value]) -> HandlerPoll {
        if name != "my_update" {
            return Poll::Ready(Err(ApplicationFailure::unknown_handler("update", name)));
        }
        let block = args.first().and_then(Value::as_bool).unwrap_or(false);
        if !block {
            return Poll::Ready(Err(ApplicationFailure::new(
                "Dying on purpose",
                "my_update",
                true,
            )));
        }
        if self.blocked {
            return Poll::Pending;
        }
        self.blocked = true;
        Poll::Ready(Ok(json!(123)))
    }
}

fn build(_args: &[Value]) -> Result<Box<dyn WorkflowInstance>, ApplicationFailure> {
    Ok(Box::new(AcceptedWorkflow {
        done: false,
        blocked: true,
    }))
}

async fn check(stub: WorkflowStub) -> anyhow::Result<()> {
    let update_id = Uuid::new_v4().to_string();
    let handle = stub
        .start_update(
            UpdateOptions::new("my_update", LifecycleStage::Accepted).with_update_id(&update_id),
            vec![json!(true)],
        )
        .await?;

    expect_timeout(handle.get_result(Some(BLOCKED_WAIT)).await)
        .context("blocked update returned through its start handle")?;
    let other = stub.get_update_handle(&update_id);
    expect_timeout(other.get_result(Some(BLOCKED_WAIT)).await)
        .context("blocked update returned through a second handle")?;

    stub.signal("unblock", vec![]).await?;
    let first = handle.get_result(None).await?;
    ensure!(first == json!(123), "start handle: expected 123, got {}", first);
    let second = other.get_result(None).await?;
    ensure!(second == json!(123), "second handle: expected 123, got {}", second);

    let update_id = Uuid::new_v4().to_string();
    let failed = stub
        .start_update(
            UpdateOptions::new("my_update", LifecycleStage::Completed).with_update_id(&update_id),
            vec![json!(false)],
        )
        .await;
    match failed {
        Ok(_) => bail!("failing update reported success"),
        Err(ClientError::WorkflowUpdate {
            update_id: failed_id,
            update_name,
            source,
        }) => {
            ensure!(
                source.message.contains("Dying on purpose"),
                "unexpected failure: {}",
                source
            );
            ensure!(failed_id == update_id, "update id {} != {}", failed_id, update_id);
            ensure!(update_name == "my_update", "unexpected update name {}", update_name);
        }
        Err(e) => return Err(e).context("expected an update failure"),
    }
    Ok(())
}

pub fn feature() -> Feature {
    Feature::new("update/async_accepted")
        .with_workflow(WorkflowRegistration::new("Workflow", build))
        .with_check(Check::new("FeatureChecker", "check", check).stub(0, StubDescriptor::new("Workflow")))
}

inventory::submit! { FeatureProvider::new(feature) }
