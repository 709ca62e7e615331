// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed workflow client.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::ClientOptions;
use crate::error::{ClientError, Result, StatusCode};
use crate::interceptor::InterceptorPipeline;
use crate::payload::DataConverter;
use crate::schedule::ScheduleClient;
use crate::service::WorkflowService;
use crate::stub::{WorkflowOptions, WorkflowStub};

/// High-level client bound to one namespace.
///
/// Cloning is cheap; clones share the underlying service. Derived clients
/// created with [`WorkflowClient::with_pipeline`] or
/// [`WorkflowClient::with_converter`] also share it.
#[derive(Clone)]
pub struct WorkflowClient {
    service: Arc<dyn WorkflowService>,
    options: Arc<ClientOptions>,
    pipeline: InterceptorPipeline,
    converter: DataConverter,
}

impl fmt::Debug for WorkflowClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowClient")
            .field("namespace", &self.options.namespace)
            .field("pipeline", &self.pipeline)
            .field("converter", &self.converter)
            .finish()
    }
}

impl WorkflowClient {
    /// Create a client with an empty interceptor pipeline and the JSON converter.
    pub fn new(service: Arc<dyn WorkflowService>, options: ClientOptions) -> Self {
        Self {
            service,
            options: Arc::new(options),
            pipeline: InterceptorPipeline::default(),
            converter: DataConverter::default(),
        }
    }

    /// A client sharing this one's service but using `pipeline`.
    pub fn with_pipeline(&self, pipeline: InterceptorPipeline) -> Self {
        Self {
            pipeline,
            ..self.clone()
        }
    }

    /// A client sharing this one's service but using `converter`.
    pub fn with_converter(&self, converter: DataConverter) -> Self {
        Self {
            converter,
            ..self.clone()
        }
    }

    pub fn namespace(&self) -> &str {
        &self.options.namespace
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn pipeline(&self) -> &InterceptorPipeline {
        &self.pipeline
    }

    pub fn converter(&self) -> &DataConverter {
        &self.converter
    }

    pub(crate) fn service(&self) -> &Arc<dyn WorkflowService> {
        &self.service
    }

    /// Create a stub for a workflow that is started lazily on first use.
    pub fn new_workflow_stub(
        &self,
        workflow_type: impl Into<String>,
        options: WorkflowOptions,
    ) -> WorkflowStub {
        WorkflowStub::new(self.clone(), workflow_type.into(), options)
    }

    /// Create a stub and start the workflow immediately.
    pub async fn start_workflow(
        &self,
        workflow_type: impl Into<String>,
        options: WorkflowOptions,
    ) -> Result<WorkflowStub> {
        let stub = self.new_workflow_stub(workflow_type, options);
        stub.start().await?;
        Ok(stub)
    }

    /// Schedule client for this client's namespace.
    pub fn schedule_client(&self) -> ScheduleClient {
        ScheduleClient::new(self.clone())
    }

    /// Wait to pass to a long-poll call given the time left before the caller's deadline.
    ///
    /// Stays under half the call deadline so an idle long-poll never trips it.
    pub(crate) fn poll_wait(&self, remaining: Duration) -> Duration {
        remaining
            .min(self.options.long_poll)
            .min(self.options.rpc_timeout / 2)
    }

    /// Run one service call under the client-side deadline.
    ///
    /// When the deadline fires before the service answers the call fails with
    /// `CANCELLED`, the same status a real transport reports for a cancelled
    /// context.
    pub(crate) async fn call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.options.rpc_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                debug!(
                    operation,
                    timeout_ms = self.options.rpc_timeout.as_millis() as u64,
                    "Client deadline fired before service replied"
                );
                Err(ClientError::service(
                    StatusCode::Cancelled,
                    format!(
                        "{} cancelled: client deadline of {:?} exceeded",
                        operation, self.options.rpc_timeout
                    ),
                ))
            }
        }
    }
}
