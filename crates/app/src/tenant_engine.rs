//! Tenant engine: the per-tenant container of lifecycle components.
//!
//! A [`TenantEngineModule`] describes what every tenant of a functional area
//! needs; a [`TenantEngine`] owns one tenant's instance of those components
//! and drives them through the engine's [`LifecycleState`] machine.

use std::future::Future;
use std::sync::Arc;

use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::lifecycle::{LifecycleOperation, LifecycleState};
use tenanthub_domain::tenant::{DatasetTemplate, Tenant};

use crate::lifecycle::{CompositeLifecycleStep, LifecycleComponent, ProgressMonitor, StepReport};

/// The set of components owned by one tenant engine.
pub trait TenantComponents: Send + Sync {
    /// Lifecycle components in dependency order: each may rely on those
    /// listed before it. Initialize and start run in this order, stop runs
    /// in reverse.
    fn lifecycle_components(&self) -> Vec<Arc<dyn LifecycleComponent>>;
}

/// Factory and hooks for the tenant engines of one functional area.
pub trait TenantEngineModule: Send + Sync + 'static {
    type Components: TenantComponents + 'static;

    fn name(&self) -> &'static str;

    /// Build a fresh, tenant-scoped set of components.
    ///
    /// # Errors
    ///
    /// Returns an error when the components cannot be constructed.
    fn create_components(&self, tenant: &Tenant) -> Result<Self::Components, TenantHubError>;

    /// Seed a newly created tenant with the data described by `template`.
    /// Does nothing by default.
    fn bootstrap_dataset(
        &self,
        tenant: &Tenant,
        components: &Self::Components,
        template: &DatasetTemplate,
    ) -> impl Future<Output = Result<(), TenantHubError>> + Send {
        let _ = (tenant, components, template);
        async { Ok(()) }
    }
}

/// One tenant's engine.
pub struct TenantEngine<M: TenantEngineModule> {
    tenant: Tenant,
    module: Arc<M>,
    state: LifecycleState,
    components: Option<M::Components>,
}

impl<M: TenantEngineModule> TenantEngine<M> {
    /// Create an uninitialized engine; components are built by
    /// [`initialize`](Self::initialize).
    pub fn new(tenant: Tenant, module: Arc<M>) -> Self {
        Self {
            tenant,
            module,
            state: LifecycleState::Uninitialized,
            components: None,
        }
    }

    #[must_use]
    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The engine's components, once initialized.
    #[must_use]
    pub fn components(&self) -> Option<&M::Components> {
        self.components.as_ref()
    }

    /// Name used for composite step plans and logs.
    #[must_use]
    pub fn component_name(&self) -> String {
        format!("{} ({})", self.module.name(), self.tenant.token)
    }

    fn begin(
        &mut self,
        operation: LifecycleOperation,
        transitional: LifecycleState,
    ) -> Result<(), TenantHubError> {
        if !self.state.accepts(operation) {
            return Err(TenantHubError::InvalidTransition {
                operation,
                state: self.state,
            });
        }
        self.state = transitional;
        Ok(())
    }

    fn finish(
        &mut self,
        operation: LifecycleOperation,
        result: Result<StepReport, TenantHubError>,
        target: LifecycleState,
    ) -> Result<StepReport, TenantHubError> {
        match result {
            Ok(report) => {
                self.state = target;
                tracing::info!(engine = %self.component_name(), %operation, state = %target, "tenant engine transitioned");
                Ok(report)
            }
            Err(error) => {
                self.state = LifecycleState::Failed;
                tracing::error!(engine = %self.component_name(), %operation, %error, "tenant engine failed");
                Err(error)
            }
        }
    }

    fn plan(&self, operation: LifecycleOperation) -> Result<CompositeLifecycleStep, TenantHubError> {
        let components = self
            .components
            .as_ref()
            .ok_or_else(|| TenantHubError::not_ready(self.component_name()))?;
        let name = match operation {
            LifecycleOperation::Initialize => "Initialize",
            LifecycleOperation::Start => "Start",
            LifecycleOperation::Stop => "Stop",
        };
        let mut plan = CompositeLifecycleStep::new(format!("{name} {}", self.component_name()));
        let mut ordered = components.lifecycle_components();
        if operation == LifecycleOperation::Stop {
            ordered.reverse();
        }
        for component in ordered {
            match operation {
                LifecycleOperation::Stop => plan.add_stop_step(component),
                other => plan.add_step(component, other, true),
            };
        }
        Ok(plan)
    }

    /// Build the components and initialize each of them in dependency order.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::InvalidTransition`] unless the engine is
    /// uninitialized. Any component failure leaves the engine `Failed`.
    #[tracing::instrument(skip_all, fields(tenant = %self.tenant.token))]
    pub async fn initialize(&mut self, monitor: &dyn ProgressMonitor) -> Result<(), TenantHubError> {
        self.begin(LifecycleOperation::Initialize, LifecycleState::Initializing)?;
        let result = match self.module.create_components(&self.tenant) {
            Ok(components) => {
                self.components = Some(components);
                match self.plan(LifecycleOperation::Initialize) {
                    Ok(plan) => plan.execute(monitor).await,
                    Err(error) => Err(error),
                }
            }
            Err(error) => Err(error),
        };
        self.finish(
            LifecycleOperation::Initialize,
            result,
            LifecycleState::Initialized,
        )
        .map(drop)
    }

    /// Start every component in dependency order.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::InvalidTransition`] unless the engine is
    /// initialized or stopped. Any component failure leaves the engine
    /// `Failed`.
    #[tracing::instrument(skip_all, fields(tenant = %self.tenant.token))]
    pub async fn start(&mut self, monitor: &dyn ProgressMonitor) -> Result<(), TenantHubError> {
        self.begin(LifecycleOperation::Start, LifecycleState::Starting)?;
        let result = match self.plan(LifecycleOperation::Start) {
            Ok(plan) => plan.execute(monitor).await,
            Err(error) => Err(error),
        };
        self.finish(LifecycleOperation::Start, result, LifecycleState::Started)
            .map(drop)
    }

    /// Stop every component in reverse dependency order.
    ///
    /// Component failures do not prevent the other components from stopping;
    /// they are returned in the report and the engine still ends `Stopped`.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::InvalidTransition`] unless the engine is
    /// started or failed.
    #[tracing::instrument(skip_all, fields(tenant = %self.tenant.token))]
    pub async fn stop(&mut self, monitor: &dyn ProgressMonitor) -> Result<StepReport, TenantHubError> {
        self.begin(LifecycleOperation::Stop, LifecycleState::Stopping)?;
        // A failure before any component was built leaves nothing to stop.
        let result = match self.plan(LifecycleOperation::Stop) {
            Ok(plan) => plan.execute(monitor).await,
            Err(_) => Ok(StepReport::default()),
        };
        self.finish(LifecycleOperation::Stop, result, LifecycleState::Stopped)
    }

    /// Seed the tenant with `template` through the module's hook.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::ComponentNotReady`] before initialization,
    /// or the module's error.
    #[tracing::instrument(skip_all, fields(tenant = %self.tenant.token, template = %template.id))]
    pub async fn bootstrap_dataset(&self, template: &DatasetTemplate) -> Result<(), TenantHubError> {
        let components = self
            .components
            .as_ref()
            .ok_or_else(|| TenantHubError::not_ready(self.component_name()))?;
        self.module
            .bootstrap_dataset(&self.tenant, components, template)
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use tenanthub_domain::error::ErrorKind;

    use super::*;
    use crate::lifecycle::step::tests::{CallLog, RecordingComponent, RecordingMonitor, call_log};

    pub(crate) struct FakeComponents {
        components: Vec<Arc<dyn LifecycleComponent>>,
    }

    impl TenantComponents for FakeComponents {
        fn lifecycle_components(&self) -> Vec<Arc<dyn LifecycleComponent>> {
            self.components.clone()
        }
    }

    /// Module whose components are `a`, `b`, `c`, with an optional failure.
    pub(crate) struct FakeModule {
        pub(crate) calls: CallLog,
        failing: Option<(&'static str, LifecycleOperation)>,
        fail_create: bool,
        pub(crate) bootstrapped: Mutex<Vec<String>>,
    }

    impl FakeModule {
        pub(crate) fn new() -> Self {
            Self {
                calls: call_log(),
                failing: None,
                fail_create: false,
                bootstrapped: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(component: &'static str, operation: LifecycleOperation) -> Self {
            Self {
                failing: Some((component, operation)),
                ..Self::new()
            }
        }

        pub(crate) fn failing_create() -> Self {
            Self {
                fail_create: true,
                ..Self::new()
            }
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TenantEngineModule for FakeModule {
        type Components = FakeComponents;

        fn name(&self) -> &'static str {
            "fake"
        }

        fn create_components(&self, tenant: &Tenant) -> Result<FakeComponents, TenantHubError> {
            if self.fail_create {
                return Err(TenantHubError::not_ready(tenant.token.clone()));
            }
            let components = ["a", "b", "c"]
                .into_iter()
                .map(|name| -> Arc<dyn LifecycleComponent> {
                    match self.failing {
                        Some((failing, operation)) if failing == name => {
                            RecordingComponent::failing(name, &self.calls, operation)
                        }
                        _ => RecordingComponent::new(name, &self.calls),
                    }
                })
                .collect();
            Ok(FakeComponents { components })
        }

        async fn bootstrap_dataset(
            &self,
            tenant: &Tenant,
            _components: &FakeComponents,
            template: &DatasetTemplate,
        ) -> Result<(), TenantHubError> {
            self.bootstrapped
                .lock()
                .unwrap()
                .push(format!("{}:{}", tenant.token, template.id));
            Ok(())
        }
    }

    fn engine(module: FakeModule) -> (TenantEngine<FakeModule>, Arc<FakeModule>) {
        let module = Arc::new(module);
        let engine = TenantEngine::new(Tenant::new("acme", "Acme").unwrap(), Arc::clone(&module));
        (engine, module)
    }

    #[tokio::test]
    async fn should_start_components_in_order_and_stop_in_reverse() {
        let (mut engine, module) = engine(FakeModule::new());
        let monitor = RecordingMonitor::default();

        engine.initialize(&monitor).await.unwrap();
        engine.start(&monitor).await.unwrap();
        let report = engine.stop(&monitor).await.unwrap();

        assert_eq!(
            module.calls(),
            vec![
                "a:initialize",
                "b:initialize",
                "c:initialize",
                "a:start",
                "b:start",
                "c:start",
                "c:stop",
                "b:stop",
                "a:stop",
            ]
        );
        assert!(report.is_clean());
        assert_eq!(engine.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn should_fail_start_without_running_later_components() {
        let (mut engine, module) = engine(FakeModule::failing("b", LifecycleOperation::Start));
        let monitor = RecordingMonitor::default();
        engine.initialize(&monitor).await.unwrap();

        let err = engine.start(&monitor).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::LifecycleStepFailed);
        assert_eq!(engine.state(), LifecycleState::Failed);
        assert!(!module.calls().contains(&"c:start".to_string()));
    }

    #[tokio::test]
    async fn should_stop_every_component_even_when_one_fails() {
        let (mut engine, module) = engine(FakeModule::failing("b", LifecycleOperation::Stop));
        let monitor = RecordingMonitor::default();
        engine.initialize(&monitor).await.unwrap();
        engine.start(&monitor).await.unwrap();

        let report = engine.stop(&monitor).await.unwrap();

        let calls = module.calls();
        assert_eq!(&calls[calls.len() - 3..], ["c:stop", "b:stop", "a:stop"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(engine.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn should_allow_stop_after_failure() {
        let (mut engine, _module) = engine(FakeModule::failing("c", LifecycleOperation::Start));
        let monitor = RecordingMonitor::default();
        engine.initialize(&monitor).await.unwrap();
        engine.start(&monitor).await.unwrap_err();

        engine.stop(&monitor).await.unwrap();
        assert_eq!(engine.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn should_restart_after_stop() {
        let (mut engine, _module) = engine(FakeModule::new());
        let monitor = RecordingMonitor::default();
        engine.initialize(&monitor).await.unwrap();
        engine.start(&monitor).await.unwrap();
        engine.stop(&monitor).await.unwrap();

        engine.start(&monitor).await.unwrap();
        assert_eq!(engine.state(), LifecycleState::Started);
    }

    #[tokio::test]
    async fn should_reject_start_before_initialize() {
        let (mut engine, module) = engine(FakeModule::new());

        let err = engine.start(&RecordingMonitor::default()).await.unwrap_err();

        assert!(matches!(
            err,
            TenantHubError::InvalidTransition {
                operation: LifecycleOperation::Start,
                state: LifecycleState::Uninitialized,
            }
        ));
        assert_eq!(engine.state(), LifecycleState::Uninitialized);
        assert!(module.calls().is_empty());
    }

    #[tokio::test]
    async fn should_reject_second_initialize() {
        let (mut engine, _module) = engine(FakeModule::new());
        let monitor = RecordingMonitor::default();
        engine.initialize(&monitor).await.unwrap();

        let err = engine.initialize(&monitor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(engine.state(), LifecycleState::Initialized);
    }

    #[tokio::test]
    async fn should_fail_when_components_cannot_be_created() {
        let (mut engine, _module) = engine(FakeModule::failing_create());
        let monitor = RecordingMonitor::default();

        assert!(engine.initialize(&monitor).await.is_err());
        assert_eq!(engine.state(), LifecycleState::Failed);
        assert!(engine.components().is_none());

        let report = engine.stop(&monitor).await.unwrap();
        assert!(report.executed.is_empty());
    }

    #[tokio::test]
    async fn should_delegate_bootstrap_to_module() {
        let (mut engine, module) = engine(FakeModule::new());
        engine.initialize(&RecordingMonitor::default()).await.unwrap();

        engine
            .bootstrap_dataset(&DatasetTemplate::empty())
            .await
            .unwrap();

        assert_eq!(*module.bootstrapped.lock().unwrap(), vec!["acme:empty"]);
    }

    #[tokio::test]
    async fn should_reject_bootstrap_before_initialize() {
        let (engine, _module) = engine(FakeModule::new());
        let err = engine
            .bootstrap_dataset(&DatasetTemplate::empty())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ComponentNotReady);
    }
}
