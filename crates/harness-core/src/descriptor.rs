// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Check descriptors.
//!
//! A [`Check`] carries the metadata the injector needs to call a check
//! function: its identity ([`CheckDescriptor`]), one [`ParamSpec`] per
//! parameter and a type-erased entry point. Parameter kinds are derived from
//! the function signature when the check is built; stub and client
//! descriptors are attached per parameter index.
//!
//! ```ignore
//! async fn check(stub: WorkflowStub, runner: Runner) -> anyhow::Result<()> { ... }
//!
//! Check::new("FeatureChecker", "check", check)
//!     .stub(0, StubDescriptor::new("Workflow"))
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use harness_client::{InterceptorPipeline, ScheduleClient, WorkflowClient, WorkflowStub};
use serde_json::{Map, Value};

use crate::error::{HarnessError, Result};
use crate::feature::Feature;
use crate::runner::Runner;
use crate::state::RuntimeState;

/// Describes the workflow stub injected into a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct StubDescriptor {
    /// Workflow type; must be defined by the owning feature.
    pub workflow_type: String,
    /// Start the workflow when the stub is resolved instead of on first use.
    pub eager_start: bool,
    /// Fixed workflow id; a fresh id is generated when absent.
    pub workflow_id: Option<String>,
    pub args: Vec<Value>,
    pub memo: Map<String, Value>,
}

impl StubDescriptor {
    pub fn new(workflow_type: impl Into<String>) -> Self {
        Self {
            workflow_type: workflow_type.into(),
            eager_start: false,
            workflow_id: None,
            args: Vec::new(),
            memo: Map::new(),
        }
    }

    pub fn eager(mut self) -> Self {
        self.eager_start = true;
        self
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_memo(mut self, memo: Map<String, Value>) -> Self {
        self.memo = memo;
        self
    }
}

/// Returns the interceptor pipeline for a custom client.
pub type PipelineProvider = fn() -> InterceptorPipeline;

/// Describes a custom client injected into a parameter.
#[derive(Clone, Copy, Default)]
pub struct ClientDescriptor {
    pub pipeline_provider: Option<PipelineProvider>,
}

impl ClientDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pipeline_provider(mut self, provider: PipelineProvider) -> Self {
        self.pipeline_provider = Some(provider);
        self
    }
}

impl fmt::Debug for ClientDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientDescriptor")
            .field("pipeline_provider", &self.pipeline_provider.is_some())
            .finish()
    }
}

/// Identity of a check entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CheckDescriptor {
    pub owner: &'static str,
    pub method: &'static str,
}

impl CheckDescriptor {
    pub const fn new(owner: &'static str, method: &'static str) -> Self {
        Self { owner, method }
    }

    /// `owner::method`
    pub fn id(&self) -> String {
        format!("{}::{}", self.owner, self.method)
    }
}

/// The closed set of injectable parameter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    WorkflowStub,
    WorkflowClient,
    ScheduleClient,
    Feature,
    RuntimeState,
    Runner,
}

impl ParamKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamKind::WorkflowStub => "WorkflowStub",
            ParamKind::WorkflowClient => "WorkflowClient",
            ParamKind::ScheduleClient => "ScheduleClient",
            ParamKind::Feature => "Feature",
            ParamKind::RuntimeState => "RuntimeState",
            ParamKind::Runner => "Runner",
        }
    }
}

/// One check parameter: its declared kind and attached descriptors.
///
/// `kind` is `None` for descriptors attached past the end of the signature.
#[derive(Debug, Clone, Default)]
pub struct ParamSpec {
    pub kind: Option<ParamKind>,
    pub stub: Option<StubDescriptor>,
    pub client: Option<ClientDescriptor>,
}

impl ParamSpec {
    fn of(kind: ParamKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn declared_type(&self) -> &'static str {
        self.kind.map_or("<undeclared>", |k| k.type_name())
    }
}

/// A resolved parameter value.
#[derive(Debug, Clone)]
pub enum Injected {
    WorkflowStub(WorkflowStub),
    WorkflowClient(WorkflowClient),
    ScheduleClient(ScheduleClient),
    Feature(Arc<Feature>),
    RuntimeState(RuntimeState),
    Runner(Runner),
}

/// Types a check function may declare as parameters.
pub trait Inject: Sized + Send + 'static {
    const KIND: ParamKind;

    fn from_injected(value: Injected) -> Option<Self>;
}

macro_rules! impl_inject {
    ($ty:ty, $kind:ident) => {
        impl Inject for $ty {
            const KIND: ParamKind = ParamKind::$kind;

            fn from_injected(value: Injected) -> Option<Self> {
                match value {
                    Injected::$kind(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_inject!(WorkflowStub, WorkflowStub);
impl_inject!(WorkflowClient, WorkflowClient);
impl_inject!(ScheduleClient, ScheduleClient);
impl_inject!(Arc<Feature>, Feature);
impl_inject!(RuntimeState, RuntimeState);
impl_inject!(Runner, Runner);

/// Future returned by a check body.
pub type CheckFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Type-erased check entry point.
pub type CheckFn = Arc<dyn Fn(Vec<Injected>) -> Result<CheckFuture> + Send + Sync>;

/// Async functions usable as checks.
pub trait IntoCheck<Args>: Send + Sync + 'static {
    fn param_kinds() -> Vec<ParamKind>;

    fn into_check_fn(self, check_id: String) -> CheckFn;
}

fn take<T: Inject>(check_id: &str, param_index: usize, value: Option<Injected>) -> Result<T> {
    value
        .and_then(T::from_injected)
        .ok_or_else(|| HarnessError::UnresolvableParameter {
            check: check_id.to_string(),
            param_index,
            declared_type: T::KIND.type_name().to_string(),
        })
}

macro_rules! impl_into_check {
    ($($ty:ident),*) => {
        impl<F, Fut, $($ty,)*> IntoCheck<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
            $($ty: Inject,)*
        {
            fn param_kinds() -> Vec<ParamKind> {
                vec![$($ty::KIND),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn into_check_fn(self, check_id: String) -> CheckFn {
                let handler = self;
                Arc::new(move |args: Vec<Injected>| -> Result<CheckFuture> {
                    let mut args = args.into_iter();
                    let mut index = 0;
                    $(
                        let $ty = take::<$ty>(&check_id, index, args.next())?;
                        index += 1;
                    )*
                    let future: CheckFuture = Box::pin(handler($($ty),*));
                    Ok(future)
                })
            }
        }
    };
}

impl_into_check!();
impl_into_check!(T1);
impl_into_check!(T1, T2);
impl_into_check!(T1, T2, T3);
impl_into_check!(T1, T2, T3, T4);

/// A check entry point with its parameter metadata.
#[derive(Clone)]
pub struct Check {
    descriptor: CheckDescriptor,
    params: Vec<ParamSpec>,
    invoke: CheckFn,
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("descriptor", &self.descriptor)
            .field("params", &self.params)
            .finish()
    }
}

impl Check {
    /// Build a check from an async function; parameter kinds come from its signature.
    pub fn new<F, Args>(owner: &'static str, method: &'static str, check: F) -> Self
    where
        F: IntoCheck<Args>,
    {
        let descriptor = CheckDescriptor::new(owner, method);
        Self {
            params: F::param_kinds().into_iter().map(ParamSpec::of).collect(),
            invoke: check.into_check_fn(descriptor.id()),
            descriptor,
        }
    }

    /// Attach a stub descriptor to parameter `index`.
    pub fn stub(mut self, index: usize, stub: StubDescriptor) -> Self {
        self.param_mut(index).stub = Some(stub);
        self
    }

    /// Attach a client descriptor to parameter `index`.
    pub fn client(mut self, index: usize, client: ClientDescriptor) -> Self {
        self.param_mut(index).client = Some(client);
        self
    }

    fn param_mut(&mut self, index: usize) -> &mut ParamSpec {
        if self.params.len() <= index {
            self.params.resize_with(index + 1, ParamSpec::default);
        }
        &mut self.params[index]
    }

    pub fn descriptor(&self) -> &CheckDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> String {
        self.descriptor.id()
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Call the check with resolved arguments, in parameter order.
    pub fn invoke(&self, args: Vec<Injected>) -> Result<CheckFuture> {
        (self.invoke)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn no_params() -> anyhow::Result<()> {
        Ok(())
    }

    async fn two_params(_feature: Arc<Feature>, _state: RuntimeState) -> anyhow::Result<()> {
        anyhow::bail!("reached")
    }

    #[test]
    fn test_param_kinds_follow_signature() {
        let check = Check::new("Checker", "two", two_params);
        let kinds: Vec<_> = check.params().iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![Some(ParamKind::Feature), Some(ParamKind::RuntimeState)]);
        assert_eq!(check.id(), "Checker::two");

        let check = Check::new("Checker", "none", no_params);
        assert!(check.params().is_empty());
    }

    #[test]
    fn test_descriptor_past_signature_is_undeclared() {
        let check = Check::new("Checker", "none", no_params).stub(1, StubDescriptor::new("Workflow"));
        assert_eq!(check.params().len(), 2);
        assert_eq!(check.params()[0].declared_type(), "<undeclared>");
        assert_eq!(
            check.params()[1].stub.as_ref().map(|s| s.workflow_type.as_str()),
            Some("Workflow")
        );
    }

    #[tokio::test]
    async fn test_invoke_with_no_params() {
        let check = Check::new("Checker", "none", no_params);
        let future = check.invoke(Vec::new()).unwrap();
        assert!(future.await.is_ok());
    }

    #[test]
    fn test_invoke_rejects_mismatched_argument() {
        let check = Check::new("Checker", "two", two_params);
        let err = match check.invoke(Vec::new()) {
            Err(err) => err,
            Ok(_) => panic!("expected missing argument to fail"),
        };
        match err {
            HarnessError::UnresolvableParameter {
                check,
                param_index,
                declared_type,
            } => {
                assert_eq!(check, "Checker::two");
                assert_eq!(param_index, 0);
                assert_eq!(declared_type, "Feature");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_stub_descriptor_builder() {
        let stub = StubDescriptor::new("Workflow")
            .eager()
            .with_workflow_id("wf-1")
            .with_args(vec![Value::Bool(true)]);
        assert!(stub.eager_start);
        assert_eq!(stub.workflow_id.as_deref(), Some("wf-1"));
        assert_eq!(stub.args, vec![Value::Bool(true)]);
    }
}
