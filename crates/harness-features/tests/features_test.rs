// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runs the shipped features end to end against the in-process engine.

use std::sync::Arc;
use std::time::Duration;

use harness_client::{ClientOptions, EngineConfig, MemoryEngine, WorkflowClient};
use harness_core::{Executor, Feature, FeatureResult, Harness, HarnessConfig, RuntimeState};
use harness_features::{query, schedule, update};

const NAMESPACE: &str = "default";

// ============================================================================
// Helpers
// ============================================================================

fn engine(server_deadline: Duration) -> MemoryEngine {
    MemoryEngine::new(
        EngineConfig::new()
            .with_server_deadline(server_deadline)
            .with_trigger_cooldown(Duration::from_secs(1)),
    )
}

async fn run_feature(engine: &MemoryEngine, rpc_timeout: Duration, feature: Feature) -> FeatureResult {
    let client = WorkflowClient::new(
        Arc::new(engine.clone()),
        ClientOptions::new()
            .with_namespace(NAMESPACE)
            .with_rpc_timeout(rpc_timeout)
            .with_result_timeout(Duration::from_secs(5))
            .with_long_poll(Duration::from_millis(200)),
    );
    let executor = Executor::new(Arc::new(engine.clone()), Duration::from_secs(30));
    executor.run(&RuntimeState::new(client), Arc::new(feature)).await
}

fn assert_passed(result: &FeatureResult) {
    assert!(
        result.is_success(),
        "{} failed: {:?}",
        result.task_queue,
        result.failures.iter().map(ToString::to_string).collect::<Vec<_>>()
    );
    assert_eq!(result.passed, vec!["FeatureChecker::check"]);
}

// ============================================================================
// Discovery
// ============================================================================

#[test]
fn test_discovers_features_in_task_queue_order() {
    let registry = harness_features::registry(&[]).unwrap();
    let task_queues: Vec<_> = registry.all_features().map(|f| f.task_queue()).collect();
    assert_eq!(
        task_queues,
        vec![
            "query/timeout_due_to_no_active_workers",
            "schedule/trigger",
            "update/async_accepted",
            "update/client_interceptor",
        ]
    );
}

#[test]
fn test_discovery_applies_prefix_filter() {
    let registry = harness_features::registry(&["update/".to_string()]).unwrap();
    assert_eq!(registry.len(), 2);
    assert!(registry.get("update/async_accepted").is_some());
    assert!(registry.get("schedule/trigger").is_none());
}

// ============================================================================
// Features
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_async_accepted() {
    let engine = engine(Duration::from_secs(1));
    let result = run_feature(&engine, Duration::from_secs(5), update::async_accepted::feature()).await;
    assert_passed(&result);
    assert_eq!(engine.running_executions(NAMESPACE, "update/async_accepted"), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_client_interceptor() {
    let engine = engine(Duration::from_secs(1));
    let result = run_feature(&engine, Duration::from_secs(5), update::client_interceptor::feature()).await;
    assert_passed(&result);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_query_without_worker_engine_deadline_first() {
    let engine = engine(Duration::from_millis(300));
    let feature = query::timeout_due_to_no_active_workers::feature();
    let result = run_feature(&engine, Duration::from_secs(5), feature).await;
    assert_passed(&result);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_query_without_worker_client_deadline_first() {
    let engine = engine(Duration::from_secs(5));
    let feature = query::timeout_due_to_no_active_workers::feature();
    let result = run_feature(&engine, Duration::from_millis(200), feature).await;
    assert_passed(&result);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_schedule_trigger() {
    let engine = engine(Duration::from_secs(1));
    let result = run_feature(&engine, Duration::from_secs(5), schedule::trigger::feature()).await;
    assert_passed(&result);
    assert_eq!(engine.schedule_count(NAMESPACE), 0);
}

// ============================================================================
// Driver
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_harness_runs_every_feature() {
    let config = HarnessConfig::default()
        .with_check_timeout(Duration::from_secs(30))
        .with_rpc_timeout(Duration::from_secs(5))
        .with_result_timeout(Duration::from_secs(5))
        .with_server_deadline(Duration::from_millis(300));
    let registry = harness_features::registry(&config.features).unwrap();
    let engine = MemoryEngine::new(config.engine_config());

    let mut harness = Harness::new(config, registry, Arc::new(engine.clone()), Arc::new(engine));
    let report = harness.run_all().await;

    assert!(
        report.is_success(),
        "failures: {:?}",
        report.failures().map(ToString::to_string).collect::<Vec<_>>()
    );
    assert_eq!(report.features.len(), 4);
    assert_eq!(report.passed(), 4);
}
