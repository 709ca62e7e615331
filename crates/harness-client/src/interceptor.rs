// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outbound call interceptors.
//!
//! An [`InterceptorPipeline`] is an ordered chain of [`ClientInterceptor`]s.
//! Each interceptor receives the call input produced by the previous one and
//! may rewrite it before the call is encoded and sent to the service.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::types::LifecycleStage;

/// Input of a workflow start call.
#[derive(Debug, Clone, PartialEq)]
pub struct StartInput {
    pub workflow_id: String,
    pub workflow_type: String,
    pub task_queue: String,
    pub args: Vec<Value>,
    pub memo: Map<String, Value>,
}

/// Input of a signal call.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalInput {
    pub workflow_id: String,
    pub signal_name: String,
    pub args: Vec<Value>,
}

/// Input of a query call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryInput {
    pub workflow_id: String,
    pub query_name: String,
    pub args: Vec<Value>,
}

/// Input of an update call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateInput {
    pub workflow_id: String,
    pub update_id: String,
    pub update_name: String,
    pub wait_for_stage: LifecycleStage,
    pub args: Vec<Value>,
}

/// Hook that can rewrite outbound client calls.
///
/// Every method defaults to passing the input through unchanged.
pub trait ClientInterceptor: Send + Sync {
    fn start(&self, input: StartInput) -> StartInput {
        input
    }

    fn signal(&self, input: SignalInput) -> SignalInput {
        input
    }

    fn query(&self, input: QueryInput) -> QueryInput {
        input
    }

    fn update(&self, input: UpdateInput) -> UpdateInput {
        input
    }
}

/// Ordered chain of interceptors.
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    interceptors: Vec<Arc<dyn ClientInterceptor>>,
}

impl fmt::Debug for InterceptorPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorPipeline")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

impl InterceptorPipeline {
    /// Create a pipeline from interceptors, applied first to last.
    pub fn new(interceptors: Vec<Arc<dyn ClientInterceptor>>) -> Self {
        Self { interceptors }
    }

    /// Append an interceptor at the end of the chain.
    pub fn with(mut self, interceptor: impl ClientInterceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn start(&self, input: StartInput) -> StartInput {
        self.interceptors.iter().fold(input, |acc, i| i.start(acc))
    }

    pub fn signal(&self, input: SignalInput) -> SignalInput {
        self.interceptors.iter().fold(input, |acc, i| i.signal(acc))
    }

    pub fn query(&self, input: QueryInput) -> QueryInput {
        self.interceptors.iter().fold(input, |acc, i| i.query(acc))
    }

    pub fn update(&self, input: UpdateInput) -> UpdateInput {
        self.interceptors.iter().fold(input, |acc, i| i.update(acc))
    }
}
