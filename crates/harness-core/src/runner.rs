// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker lifecycle control.
//!
//! A [`Runner`] owns the worker binding of one feature. Checks receive it as
//! a parameter and stop it to simulate a task queue with no active worker;
//! the executor starts it before every check.

use std::fmt;
use std::sync::Arc;

use harness_client::{WorkerHost, WorkerOptions};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::Result;

struct RunnerInner {
    host: Arc<dyn WorkerHost>,
    options: WorkerOptions,
    started: Mutex<bool>,
}

/// Starts and stops the worker for one task queue.
///
/// Both operations are idempotent. Clones share state, so a check stopping
/// its injected runner stops the executor's runner too.
#[derive(Clone)]
pub struct Runner {
    inner: Arc<RunnerInner>,
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("namespace", &self.inner.options.namespace)
            .field("task_queue", &self.inner.options.task_queue)
            .finish()
    }
}

impl Runner {
    pub fn new(host: Arc<dyn WorkerHost>, options: WorkerOptions) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                host,
                options,
                started: Mutex::new(false),
            }),
        }
    }

    pub fn task_queue(&self) -> &str {
        &self.inner.options.task_queue
    }

    /// Whether this runner last started the worker.
    pub async fn is_running(&self) -> bool {
        *self.inner.started.lock().await
    }

    /// Attach the worker. No-op if already started.
    #[instrument(skip(self), fields(task_queue = %self.inner.options.task_queue))]
    pub async fn start(&self) -> Result<()> {
        let mut started = self.inner.started.lock().await;
        if *started {
            debug!("Worker already running");
            return Ok(());
        }
        self.inner
            .host
            .start_worker(self.inner.options.clone())
            .await?;
        *started = true;
        info!("Worker started");
        Ok(())
    }

    /// Detach the worker. No-op if already stopped.
    ///
    /// Calls that need a worker issued after this race the client deadline
    /// against the engine's deadline.
    #[instrument(skip(self), fields(task_queue = %self.inner.options.task_queue))]
    pub async fn stop(&self) -> Result<()> {
        let mut started = self.inner.started.lock().await;
        if !*started {
            debug!("Worker already stopped");
            return Ok(());
        }
        self.inner
            .host
            .stop_worker(&self.inner.options.namespace, &self.inner.options.task_queue)
            .await?;
        *started = false;
        info!("Worker stopped");
        Ok(())
    }
}
