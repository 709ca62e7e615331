// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Parameter resolution.
//!
//! Resolution happens in two steps. [`plan`] maps each parameter to a
//! [`Strategy`] without touching the engine, so an unresolvable parameter
//! aborts the check before any call is made. The [`Injector`] then
//! materializes each strategy, caching stubs and custom clients in the
//! invocation's [`ResolutionContext`].
//!
//! | Parameter                                 | Strategy                  |
//! |-------------------------------------------|---------------------------|
//! | `WorkflowStub` + stub descriptor          | stub (through custom client if a client descriptor is attached) |
//! | `WorkflowClient`/`ScheduleClient` + client descriptor | custom client |
//! | any kind except `WorkflowStub`, no descriptors | shared runtime object |
//! | anything else                             | `UnresolvableParameter`   |

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use harness_client::{
    ClientError, ScheduleClient, ScheduleHandle, StatusCode, WorkflowClient, WorkflowOptions,
    WorkflowStub,
};
use tracing::{debug, info, warn};

use crate::descriptor::{
    Check, ClientDescriptor, Injected, ParamKind, ParamSpec, PipelineProvider, StubDescriptor,
};
use crate::error::{HarnessError, Result};
use crate::feature::Feature;
use crate::runner::Runner;
use crate::state::RuntimeState;

/// How one parameter is resolved.
#[derive(Debug, Clone, Copy)]
pub enum Strategy<'a> {
    Stub {
        descriptor: &'a StubDescriptor,
        client: Option<&'a ClientDescriptor>,
    },
    Client {
        descriptor: &'a ClientDescriptor,
        kind: ParamKind,
    },
    Shared(Shared),
}

/// Runtime objects injected without descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shared {
    WorkflowClient,
    ScheduleClient,
    Feature,
    RuntimeState,
    Runner,
}

impl Shared {
    fn of(kind: ParamKind) -> Option<Self> {
        match kind {
            ParamKind::WorkflowClient => Some(Shared::WorkflowClient),
            ParamKind::ScheduleClient => Some(Shared::ScheduleClient),
            ParamKind::Feature => Some(Shared::Feature),
            ParamKind::RuntimeState => Some(Shared::RuntimeState),
            ParamKind::Runner => Some(Shared::Runner),
            ParamKind::WorkflowStub => None,
        }
    }
}

/// Pick the resolution strategy for parameter `index` of `check`.
pub fn plan<'a>(check: &Check, index: usize, param: &'a ParamSpec) -> Result<Strategy<'a>> {
    match (param.kind, &param.stub, &param.client) {
        (Some(ParamKind::WorkflowStub), Some(descriptor), client) => Ok(Strategy::Stub {
            descriptor,
            client: client.as_ref(),
        }),
        (
            Some(kind @ (ParamKind::WorkflowClient | ParamKind::ScheduleClient)),
            None,
            Some(descriptor),
        ) => Ok(Strategy::Client { descriptor, kind }),
        (Some(kind), None, None) => Shared::of(kind)
            .map(Strategy::Shared)
            .ok_or_else(|| unresolvable(check, index, param)),
        _ => Err(unresolvable(check, index, param)),
    }
}

fn unresolvable(check: &Check, index: usize, param: &ParamSpec) -> HarnessError {
    HarnessError::UnresolvableParameter {
        check: check.id(),
        param_index: index,
        declared_type: param.declared_type().to_string(),
    }
}

/// Stub cache key: workflow type and explicit workflow id.
type StubKey = (String, Option<String>);

/// Per-invocation cache of resolved objects and resources to release.
#[derive(Default)]
pub struct ResolutionContext {
    stubs: HashMap<StubKey, WorkflowStub>,
    clients: Vec<(PipelineProvider, WorkflowClient)>,
    schedules: Arc<Mutex<Vec<ScheduleHandle>>>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct logical stubs resolved so far.
    pub fn stub_count(&self) -> usize {
        self.stubs.len()
    }

    /// Schedules created through injected schedule clients.
    pub fn tracked_schedules(&self) -> Vec<ScheduleHandle> {
        self.schedules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Client for `descriptor`, building it once per invocation.
    fn client(&mut self, descriptor: &ClientDescriptor, base: &WorkflowClient) -> WorkflowClient {
        let Some(provider) = descriptor.pipeline_provider else {
            return base.clone();
        };
        if let Some((_, client)) = self
            .clients
            .iter()
            .find(|(cached, _)| std::ptr::fn_addr_eq(*cached, provider))
        {
            return client.clone();
        }
        let pipeline = provider();
        debug!(interceptors = pipeline.len(), "Built client with custom pipeline");
        let client = base.with_pipeline(pipeline);
        self.clients.push((provider, client.clone()));
        client
    }

    /// Schedule client whose created schedules are released with this context.
    fn schedule_client(&self, client: &WorkflowClient) -> ScheduleClient {
        let tracked = self.schedules.clone();
        client
            .schedule_client()
            .with_created_hook(Arc::new(move |handle: &ScheduleHandle| {
                tracked
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(handle.clone());
            }))
    }

    /// A handle to the logical stub for `descriptor`. Repeated requests get
    /// fresh handles to the same execution.
    async fn stub(
        &mut self,
        descriptor: &StubDescriptor,
        client: &WorkflowClient,
        task_queue: &str,
    ) -> Result<WorkflowStub> {
        let key = (
            descriptor.workflow_type.clone(),
            descriptor.workflow_id.clone(),
        );
        let stub = match self.stubs.get(&key) {
            Some(existing) => existing.attach(client),
            None => {
                let mut options = WorkflowOptions::new(task_queue)
                    .with_args(descriptor.args.clone())
                    .with_memo(descriptor.memo.clone());
                if let Some(workflow_id) = &descriptor.workflow_id {
                    options = options.with_workflow_id(workflow_id);
                }
                let stub = client.new_workflow_stub(&descriptor.workflow_type, options);
                self.stubs.insert(key, stub.clone());
                stub
            }
        };

        if descriptor.eager_start {
            stub.start().await?;
        }
        Ok(stub)
    }

    /// Delete tracked schedules and terminate started workflows that are
    /// still running. Resources already gone are skipped; every other
    /// failure is returned.
    pub async fn release(self) -> Vec<ClientError> {
        let mut errors = Vec::new();
        let schedules = std::mem::take(
            &mut *self.schedules.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in schedules {
            match handle.delete().await {
                Ok(()) => debug!(schedule_id = %handle.schedule_id(), "Released schedule"),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(schedule_id = %handle.schedule_id(), error = %e, "Failed to release schedule");
                    errors.push(e);
                }
            }
        }

        for stub in self.stubs.into_values() {
            if stub.execution().is_none() {
                continue;
            }
            match stub.terminate("released by harness").await {
                Ok(()) => info!(workflow_id = %stub.workflow_id(), "Terminated leftover workflow"),
                Err(e)
                    if matches!(
                        e.status_code(),
                        Some(StatusCode::NotFound | StatusCode::FailedPrecondition)
                    ) => {}
                Err(e) => {
                    warn!(workflow_id = %stub.workflow_id(), error = %e, "Failed to release workflow");
                    errors.push(e);
                }
            }
        }
        errors
    }
}

/// Materializes check parameters for one feature.
#[derive(Debug, Clone)]
pub struct Injector {
    state: RuntimeState,
    feature: Arc<Feature>,
    runner: Runner,
}

impl Injector {
    pub fn new(state: RuntimeState, feature: Arc<Feature>, runner: Runner) -> Self {
        Self {
            state,
            feature,
            runner,
        }
    }

    /// Resolve every parameter of `check`, in declaration order.
    pub async fn resolve(&self, check: &Check, ctx: &mut ResolutionContext) -> Result<Vec<Injected>> {
        let strategies = check
            .params()
            .iter()
            .enumerate()
            .map(|(index, param)| plan(check, index, param))
            .collect::<Result<Vec<_>>>()?;

        let mut values = Vec::with_capacity(strategies.len());
        for strategy in strategies {
            values.push(self.materialize(strategy, ctx).await?);
        }
        Ok(values)
    }

    async fn materialize(&self, strategy: Strategy<'_>, ctx: &mut ResolutionContext) -> Result<Injected> {
        let base = self.state.client();
        let value = match strategy {
            Strategy::Stub { descriptor, client } => {
                let client = match client {
                    Some(client) => ctx.client(client, base),
                    None => base.clone(),
                };
                Injected::WorkflowStub(
                    ctx.stub(descriptor, &client, self.feature.task_queue())
                        .await?,
                )
            }
            Strategy::Client { descriptor, kind } => {
                let client = ctx.client(descriptor, base);
                match kind {
                    ParamKind::ScheduleClient => Injected::ScheduleClient(ctx.schedule_client(&client)),
                    _ => Injected::WorkflowClient(client),
                }
            }
            Strategy::Shared(shared) => match shared {
                Shared::WorkflowClient => Injected::WorkflowClient(base.clone()),
                Shared::ScheduleClient => Injected::ScheduleClient(ctx.schedule_client(base)),
                Shared::Feature => Injected::Feature(self.feature.clone()),
                Shared::RuntimeState => Injected::RuntimeState(self.state.clone()),
                Shared::Runner => Injected::Runner(self.runner.clone()),
            },
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ClientDescriptor;
    use harness_client::{ClientOptions, EngineConfig, InterceptorPipeline, MemoryEngine};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn stub_and_runner(_stub: WorkflowStub, _runner: Runner) -> anyhow::Result<()> {
        Ok(())
    }

    async fn client_only(_client: WorkflowClient) -> anyhow::Result<()> {
        Ok(())
    }

    async fn feature_only(_feature: Arc<Feature>) -> anyhow::Result<()> {
        Ok(())
    }

    fn pipeline() -> InterceptorPipeline {
        InterceptorPipeline::default()
    }

    static OTHER_BUILDS: AtomicUsize = AtomicUsize::new(0);

    fn other_pipeline() -> InterceptorPipeline {
        OTHER_BUILDS.fetch_add(1, Ordering::SeqCst);
        InterceptorPipeline::default()
    }

    fn strategies(check: &Check) -> Result<Vec<Strategy<'_>>> {
        check
            .params()
            .iter()
            .enumerate()
            .map(|(i, p)| plan(check, i, p))
            .collect()
    }

    #[test]
    fn test_plan_stub_and_shared() {
        let check = Check::new("Checker", "check", stub_and_runner).stub(0, StubDescriptor::new("Workflow"));
        let planned = strategies(&check).unwrap();
        assert!(matches!(planned[0], Strategy::Stub { client: None, .. }));
        assert!(matches!(planned[1], Strategy::Shared(Shared::Runner)));
    }

    #[test]
    fn test_stubs_are_never_shared() {
        assert_eq!(Shared::of(ParamKind::WorkflowStub), None);
        assert_eq!(Shared::of(ParamKind::Runner), Some(Shared::Runner));
    }

    #[test]
    fn test_clients_cached_per_provider() {
        let base = WorkflowClient::new(
            Arc::new(MemoryEngine::new(EngineConfig::new())),
            ClientOptions::new(),
        );
        let mut ctx = ResolutionContext::new();
        let first = ClientDescriptor::new().with_pipeline_provider(pipeline);
        let second = ClientDescriptor::new().with_pipeline_provider(other_pipeline);

        ctx.client(&first, &base);
        ctx.client(&first, &base);
        assert_eq!(ctx.clients.len(), 1);
        ctx.client(&second, &base);
        ctx.client(&second, &base);
        assert_eq!(ctx.clients.len(), 2);
        assert_eq!(OTHER_BUILDS.load(Ordering::SeqCst), 1);
        ctx.client(&ClientDescriptor::new(), &base);
        assert_eq!(ctx.clients.len(), 2);
    }

    #[test]
    fn test_plan_stub_through_custom_client() {
        let check = Check::new("Checker", "check", stub_and_runner)
            .stub(0, StubDescriptor::new("Workflow"))
            .client(0, ClientDescriptor::new().with_pipeline_provider(pipeline));
        let planned = strategies(&check).unwrap();
        assert!(matches!(planned[0], Strategy::Stub { client: Some(_), .. }));
    }

    #[test]
    fn test_plan_custom_client() {
        let check = Check::new("Checker", "check", client_only)
            .client(0, ClientDescriptor::new().with_pipeline_provider(pipeline));
        let planned = strategies(&check).unwrap();
        assert!(matches!(
            planned[0],
            Strategy::Client {
                kind: ParamKind::WorkflowClient,
                ..
            }
        ));
    }

    #[test]
    fn test_stub_without_descriptor_is_unresolvable() {
        let check = Check::new("Checker", "check", stub_and_runner);
        match strategies(&check) {
            Err(HarnessError::UnresolvableParameter {
                param_index,
                declared_type,
                ..
            }) => {
                assert_eq!(param_index, 0);
                assert_eq!(declared_type, "WorkflowStub");
            }
            other => panic!("expected unresolvable parameter, got {:?}", other),
        }
    }

    #[test]
    fn test_descriptor_on_wrong_kind_is_unresolvable() {
        let check = Check::new("Checker", "check", feature_only).stub(0, StubDescriptor::new("Workflow"));
        assert!(matches!(
            strategies(&check),
            Err(HarnessError::UnresolvableParameter { param_index: 0, .. })
        ));

        let check = Check::new("Checker", "check", feature_only).stub(1, StubDescriptor::new("Workflow"));
        match strategies(&check) {
            Err(HarnessError::UnresolvableParameter {
                param_index,
                declared_type,
                ..
            }) => {
                assert_eq!(param_index, 1);
                assert_eq!(declared_type, "<undeclared>");
            }
            other => panic!("expected unresolvable parameter, got {:?}", other),
        }
    }
}
