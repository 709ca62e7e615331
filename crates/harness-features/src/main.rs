// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Harness - runs the conformance features against the embedded engine.
//!
//! Configuration comes from `HARNESS_*` environment variables (see
//! `HarnessConfig::from_env`); a `.env` file is loaded when present.

use std::sync::Arc;

use harness_client::MemoryEngine;
use harness_core::{Harness, HarnessConfig};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harness=info,harness_core=info,harness_features=info".into()),
        )
        .init();

    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }

    let config = HarnessConfig::from_env()?;
    info!(
        namespace = %config.namespace,
        features = ?config.features,
        check_timeout_ms = config.check_timeout.as_millis() as u64,
        "Starting conformance harness"
    );

    let registry = harness_features::registry(&config.features)?;
    if registry.is_empty() {
        warn!("No features selected");
    }

    let engine = MemoryEngine::new(config.engine_config());
    let mut harness = Harness::new(config, registry, Arc::new(engine.clone()), Arc::new(engine));
    let report = harness.run_all().await;

    for feature in &report.features {
        for failure in &feature.failures {
            error!(feature = %feature.task_queue, check = %failure.check_id, error = %failure.cause, "FAILED");
        }
        for check in &feature.skipped {
            warn!(feature = %feature.task_queue, check = %check, "SKIPPED");
        }
    }

    info!(
        features = report.features.len(),
        passed = report.passed(),
        failed = report.failed(),
        skipped = report.skipped(),
        duration_ms = report.duration.as_millis() as u64,
        "Harness finished"
    );

    if !report.is_success() {
        anyhow::bail!(
            "{} check(s) failed, {} skipped",
            report.failed(),
            report.skipped()
        );
    }
    Ok(())
}
