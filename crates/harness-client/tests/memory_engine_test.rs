// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end tests of the typed client against the in-process engine.

use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::time::Duration;

use harness_client::{
    ApplicationFailure, ClientError, ClientInterceptor, ClientOptions, EngineConfig, HandlerPoll,
    InterceptorPipeline, LifecycleStage, MemoryEngine, Schedule, ScheduleHandle, ScheduleOptions,
    ScheduleSpec, ScheduleState, StartWorkflowAction, StatusCode, UpdateInput, UpdateOptions, WorkerHost,
    WorkerOptions, WorkflowClient, WorkflowInstance, WorkflowOptions, WorkflowRegistration,
    WorkflowStatus,
};
use serde_json::{Value, json};

const TASK_QUEUE: &str = "client-test";

// ============================================================================
// Test workflow
// ============================================================================

/// Completes on `finish`; `my_update(true)` waits for `unblock`,
/// `my_update(false)` fails, `echo` returns its argument.
struct GateWorkflow {
    done: bool,
    blocked: bool,
}

impl WorkflowInstance for GateWorkflow {
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

    fn handle_query(&self, name: &str, _args: &[Value]) -> Result<Value, ApplicationFailure> {
        match name {
            "is_blocked" => Ok(json!(self.blocked)),
            other => Err(ApplicationFailure::unknown_handler("query", other)),
        }
    }

    fn handle_update(&mut self, name: &str, args: &[Value]) -> HandlerPoll {
        match name {
            "my_update" if args.first().and_then(Value::as_bool) == Some(true) => {
                if self.blocked {
                    return Poll::Pending;
                }
                self.blocked = true;
                Poll::Ready(Ok(json!(123)))
            }
            "my_update" => Poll::Ready(Err(ApplicationFailure::new(
                "Dying on purpose",
                "my_update",
                true,
            ))),
            "echo" => Poll::Ready(Ok(args.first().cloned().unwrap_or(Value::Null))),
            other => Poll::Ready(Err(ApplicationFailure::unknown_handler("update", other))),
        }
    }
}

fn gate(_args: &[Value]) -> Result<Box<dyn WorkflowInstance>, ApplicationFailure> {
    Ok(Box::new(GateWorkflow {
        done: false,
        blocked: true,
    }))
}

fn worker_options() -> WorkerOptions {
    WorkerOptions::new("default", TASK_QUEUE).with_workflow(WorkflowRegistration::new("Gate", gate))
}

async fn setup(rpc_timeout: Duration) -> (MemoryEngine, WorkflowClient) {
    let engine = MemoryEngine::new(
        EngineConfig::new()
            .with_server_deadline(Duration::from_millis(200))
            .with_trigger_cooldown(Duration::from_millis(100)),
    );
    engine.start_worker(worker_options()).await.unwrap();

    let client = WorkflowClient::new(
        Arc::new(engine.clone()),
        ClientOptions::new()
            .with_rpc_timeout(rpc_timeout)
            .with_long_poll(Duration::from_millis(100)),
    );
    (engine, client)
}

fn gate_stub(client: &WorkflowClient) -> harness_client::WorkflowStub {
    client.new_workflow_stub("Gate", WorkflowOptions::new(TASK_QUEUE))
}

// ============================================================================
// Stubs
// ============================================================================

#[tokio::test]
async fn test_lazy_stub_starts_on_first_call() {
    let (engine, client) = setup(Duration::from_secs(2)).await;
    let stub = gate_stub(&client);
    assert!(stub.execution().is_none());
    assert_eq!(engine.running_executions("default", TASK_QUEUE), 0);

    stub.signal("finish", vec![]).await.unwrap();
    assert!(stub.execution().is_some());

    let result = stub.get_result(None).await.unwrap();
    assert_eq!(result, json!("Hello, World!"));
    assert_eq!(stub.describe().await.unwrap().status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn test_attached_stub_shares_execution() {
    let (_engine, client) = setup(Duration::from_secs(2)).await;
    let other_client = client.with_pipeline(InterceptorPipeline::default());

    let stub = gate_stub(&client);
    let attached = stub.attach(&other_client);
    let started = attached.start().await.unwrap();

    assert!(stub.same_execution(&attached));
    assert_eq!(stub.execution(), Some(&started));
    // Starting again through the first handle is a no-op
    assert_eq!(stub.start().await.unwrap(), started);
}

#[tokio::test]
async fn test_query_reads_workflow_state() {
    let (_engine, client) = setup(Duration::from_secs(2)).await;
    let stub = gate_stub(&client);

    assert_eq!(stub.query("is_blocked", vec![]).await.unwrap(), json!(true));
    stub.signal("unblock", vec![]).await.unwrap();
    assert_eq!(stub.query("is_blocked", vec![]).await.unwrap(), json!(false));

    let err = stub.query("missing", vec![]).await.unwrap_err();
    assert!(matches!(err, ClientError::QueryFailed { .. }));
}

#[tokio::test]
async fn test_result_wait_times_out() {
    let (_engine, client) = setup(Duration::from_secs(2)).await;
    let stub = gate_stub(&client);

    let err = stub
        .get_result(Some(Duration::from_millis(250)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_terminated_workflow_reports_reason() {
    let (engine, client) = setup(Duration::from_secs(2)).await;
    let stub = client
        .start_workflow("Gate", WorkflowOptions::new(TASK_QUEUE))
        .await
        .unwrap();
    assert_eq!(engine.running_executions("default", TASK_QUEUE), 1);

    stub.terminate("enough").await.unwrap();
    assert_eq!(engine.running_executions("default", TASK_QUEUE), 0);

    match stub.get_result(None).await {
        Err(ClientError::WorkflowTerminated { reason, .. }) => assert_eq!(reason, "enough"),
        other => panic!("expected termination, got {:?}", other),
    }
}

// ============================================================================
// Updates
// ============================================================================

#[tokio::test]
async fn test_accepted_update_observed_by_both_handles() {
    let (_engine, client) = setup(Duration::from_secs(2)).await;
    let stub = gate_stub(&client);

    let handle = stub
        .start_update(
            UpdateOptions::new("my_update", LifecycleStage::Accepted).with_update_id("u-1"),
            vec![json!(true)],
        )
        .await
        .unwrap();
    let other = stub.get_update_handle("u-1");

    let err = handle
        .get_result(Some(Duration::from_millis(250)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    let err = other
        .get_result(Some(Duration::from_millis(250)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    stub.signal("unblock", vec![]).await.unwrap();
    assert_eq!(handle.get_result(None).await.unwrap(), json!(123));
    assert_eq!(other.get_result(None).await.unwrap(), json!(123));
}

#[tokio::test]
async fn test_failed_update_carries_identity() {
    let (_engine, client) = setup(Duration::from_secs(2)).await;
    let stub = gate_stub(&client);

    let err = stub
        .start_update(
            UpdateOptions::new("my_update", LifecycleStage::Completed).with_update_id("u-fail"),
            vec![json!(false)],
        )
        .await
        .unwrap_err();

    match err {
        ClientError::WorkflowUpdate {
            update_id,
            update_name,
            source,
        } => {
            assert_eq!(update_id, "u-fail");
            assert_eq!(update_name, "my_update");
            assert!(source.message.contains("Dying on purpose"));
        }
        other => panic!("expected update failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pending_update_fails_when_workflow_closes() {
    let (_engine, client) = setup(Duration::from_secs(2)).await;
    let stub = gate_stub(&client);

    let handle = stub
        .start_update(
            UpdateOptions::new("my_update", LifecycleStage::Accepted),
            vec![json!(true)],
        )
        .await
        .unwrap();
    stub.signal("finish", vec![]).await.unwrap();

    let err = handle.get_result(None).await.unwrap_err();
    assert!(matches!(err, ClientError::WorkflowUpdate { .. }));
}

struct AddOne;

impl ClientInterceptor for AddOne {
    fn update(&self, mut input: UpdateInput) -> UpdateInput {
        if let Some(n) = input.args.first().and_then(Value::as_i64) {
            input.args[0] = json!(n + 1);
        }
        input
    }
}

#[tokio::test]
async fn test_interceptor_rewrites_update_arguments() {
    let (_engine, client) = setup(Duration::from_secs(2)).await;
    let intercepted = client.with_pipeline(InterceptorPipeline::default().with(AddOne));
    let stub = gate_stub(&intercepted);

    assert_eq!(stub.update("echo", vec![json!(1)]).await.unwrap(), json!(2));
}

// ============================================================================
// Worker availability
// ============================================================================

#[tokio::test]
async fn test_query_without_worker_hits_server_deadline() {
    let (engine, client) = setup(Duration::from_secs(2)).await;
    let stub = gate_stub(&client);
    stub.start().await.unwrap();

    engine.stop_worker("default", TASK_QUEUE).await.unwrap();
    let err = stub.query("is_blocked", vec![]).await.unwrap_err();
    assert_eq!(err.status_code(), Some(StatusCode::DeadlineExceeded));

    engine.start_worker(worker_options()).await.unwrap();
    assert_eq!(stub.query("is_blocked", vec![]).await.unwrap(), json!(true));
}

#[tokio::test]
async fn test_query_without_worker_hits_client_deadline() {
    // Client deadline shorter than the engine's 200ms
    let (engine, client) = setup(Duration::from_millis(50)).await;
    let stub = gate_stub(&client);
    stub.start().await.unwrap();

    engine.stop_worker("default", TASK_QUEUE).await.unwrap();
    let err = stub.query("is_blocked", vec![]).await.unwrap_err();
    assert_eq!(err.status_code(), Some(StatusCode::Cancelled));
}

#[tokio::test]
async fn test_update_without_worker_is_not_admitted() {
    let (engine, client) = setup(Duration::from_secs(2)).await;
    let stub = gate_stub(&client);
    stub.start().await.unwrap();

    engine.stop_worker("default", TASK_QUEUE).await.unwrap();
    let err = stub.update("echo", vec![json!(5)]).await.unwrap_err();
    assert_eq!(err.status_code(), Some(StatusCode::DeadlineExceeded));

    // Signals are buffered and delivered once a worker returns
    stub.signal("finish", vec![]).await.unwrap();
    engine.start_worker(worker_options()).await.unwrap();
    assert_eq!(stub.get_result(None).await.unwrap(), json!("Hello, World!"));
}

// ============================================================================
// Schedules
// ============================================================================

fn paused_schedule() -> Schedule {
    Schedule::new()
        .with_action(
            StartWorkflowAction::new("Gate")
                .with_task_queue(TASK_QUEUE)
                .with_input(vec![json!("arg1")]),
        )
        .with_spec(ScheduleSpec::new().with_interval(Duration::from_secs(60)))
        .with_state(ScheduleState::new().with_paused(true))
}

#[tokio::test]
async fn test_schedule_trigger_is_rate_limited() {
    let (engine, client) = setup(Duration::from_secs(2)).await;
    let handle = client
        .schedule_client()
        .create_schedule(paused_schedule(), ScheduleOptions::new().with_schedule_id("sched-1"))
        .await
        .unwrap();

    handle.trigger().await.unwrap();
    // Too soon: dropped without an error
    handle.trigger().await.unwrap();
    assert_eq!(handle.describe().await.unwrap().info.num_actions, 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    handle.trigger().await.unwrap();

    let description = handle.describe().await.unwrap();
    assert!(description.paused);
    assert_eq!(description.info.num_actions, 2);
    let started: Vec<_> = description
        .info
        .recent_actions
        .iter()
        .map(|a| a.workflow_id.as_str())
        .collect();
    assert_eq!(started, vec!["sched-1-action-1", "sched-1-action-2"]);
    assert_eq!(engine.running_executions("default", TASK_QUEUE), 2);

    handle.delete().await.unwrap();
    assert!(handle.describe().await.unwrap_err().is_not_found());
    assert!(handle.delete().await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_unpaused_schedule_fires_on_interval() {
    let (engine, client) = setup(Duration::from_secs(2)).await;
    let schedule = Schedule::new()
        .with_action(StartWorkflowAction::new("Gate").with_task_queue(TASK_QUEUE))
        .with_spec(ScheduleSpec::new().with_interval(Duration::from_millis(50)));
    let handle = client
        .schedule_client()
        .create_schedule(schedule, ScheduleOptions::new())
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while handle.describe().await.unwrap().info.num_actions < 2 {
        assert!(tokio::time::Instant::now() < deadline, "schedule never fired");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    handle.pause("hold").await.unwrap();
    let description = handle.describe().await.unwrap();
    assert!(description.paused);
    assert_eq!(description.note, "hold");

    handle.delete().await.unwrap();
    assert_eq!(engine.schedule_count("default"), 0);
}

#[tokio::test]
async fn test_created_hook_sees_every_schedule() {
    let (_engine, client) = setup(Duration::from_secs(2)).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let schedules = client
        .schedule_client()
        .with_created_hook(Arc::new(move |handle: &ScheduleHandle| {
            sink.lock().unwrap().push(handle.schedule_id().to_string());
        }));

    schedules
        .create_schedule(paused_schedule(), ScheduleOptions::new().with_schedule_id("a"))
        .await
        .unwrap();
    let err = schedules
        .create_schedule(paused_schedule(), ScheduleOptions::new().with_schedule_id("a"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(StatusCode::AlreadyExists));

    assert_eq!(*seen.lock().unwrap(), vec!["a".to_string()]);
}
