//! Tenant engine manager: creates, starts and tears down one
//! [`TenantEngine`] per active tenant.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use tenanthub_domain::error::{NotFoundError, TenantHubError, ValidationError};
use tenanthub_domain::id::TenantId;
use tenanthub_domain::lifecycle::{LifecycleOperation, LifecycleState};
use tenanthub_domain::tenant::{DatasetTemplate, Tenant};

use crate::lifecycle::{ProgressMonitor, StepReport};
use crate::tenant_engine::{TenantEngine, TenantEngineModule};

/// Registry of the running tenant engines of one module.
///
/// Engines are keyed by tenant id; each active tenant has exactly one.
pub struct TenantEngineManager<M: TenantEngineModule> {
    module: Arc<M>,
    monitor: Arc<dyn ProgressMonitor>,
    engines: Mutex<HashMap<TenantId, TenantEngine<M>>>,
}

impl<M: TenantEngineModule> TenantEngineManager<M> {
    pub fn new(module: Arc<M>, monitor: Arc<dyn ProgressMonitor>) -> Self {
        Self {
            module,
            monitor,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Create, initialize and start the engine of `tenant`.
    ///
    /// Activating an already active tenant is a no-op returning its state.
    /// On failure, whatever part of the engine came up is stopped again and
    /// the tenant is left inactive.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::Validation`] for an invalid tenant or for a
    /// token already active under another tenant id, or the initialize/start
    /// failure.
    #[tracing::instrument(skip_all, fields(tenant = %tenant.token))]
    pub async fn activate(&self, tenant: Tenant) -> Result<LifecycleState, TenantHubError> {
        tenant.validate()?;
        let mut engines = self.engines.lock().await;
        if let Some(engine) = engines.get(&tenant.id) {
            tracing::debug!("tenant engine already active");
            return Ok(engine.state());
        }
        // Topics are named after the token, so two engines sharing one would
        // consume the same messages.
        if engines.values().any(|engine| engine.tenant().token == tenant.token) {
            return Err(ValidationError::DuplicateToken {
                token: tenant.token,
            }
            .into());
        }

        let monitor = self.monitor.as_ref();
        let mut engine = TenantEngine::new(tenant, Arc::clone(&self.module));
        let result = match engine.initialize(monitor).await {
            Ok(()) => engine.start(monitor).await,
            Err(error) => Err(error),
        };
        if let Err(error) = result {
            if engine.state().accepts(LifecycleOperation::Stop)
                && let Err(stop_error) = engine.stop(monitor).await
            {
                tracing::warn!(error = %stop_error, "cleanup of failed tenant engine failed");
            }
            return Err(error);
        }

        let state = engine.state();
        tracing::info!(engine = %engine.component_name(), "tenant engine activated");
        engines.insert(engine.tenant().id, engine);
        Ok(state)
    }

    /// Stop the engine of `tenant_id` and forget it.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::NotFound`] when the tenant is not active.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self, tenant_id: TenantId) -> Result<StepReport, TenantHubError> {
        let mut engine = self
            .engines
            .lock()
            .await
            .remove(&tenant_id)
            .ok_or_else(|| NotFoundError {
                entity: "TenantEngine",
                id: tenant_id.to_string(),
            })?;
        let report = engine.stop(self.monitor.as_ref()).await?;
        tracing::info!(engine = %engine.component_name(), failures = report.failures.len(), "tenant engine deactivated");
        Ok(report)
    }

    /// Seed an active tenant with `template`.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::NotFound`] when the tenant is not active, or
    /// the module's bootstrap error.
    pub async fn bootstrap(
        &self,
        tenant_id: TenantId,
        template: &DatasetTemplate,
    ) -> Result<(), TenantHubError> {
        let engines = self.engines.lock().await;
        let engine = engines.get(&tenant_id).ok_or_else(|| NotFoundError {
            entity: "TenantEngine",
            id: tenant_id.to_string(),
        })?;
        engine.bootstrap_dataset(template).await
    }

    /// State of the tenant's engine, or `None` when the tenant is not active.
    pub async fn state(&self, tenant_id: TenantId) -> Option<LifecycleState> {
        self.engines
            .lock()
            .await
            .get(&tenant_id)
            .map(TenantEngine::state)
    }

    pub async fn active_tenants(&self) -> Vec<TenantId> {
        self.engines.lock().await.keys().copied().collect()
    }

    /// Run `f` against the components of an active tenant's engine.
    pub async fn with_components<R>(
        &self,
        tenant_id: TenantId,
        f: impl FnOnce(&M::Components) -> R,
    ) -> Option<R> {
        let engines = self.engines.lock().await;
        engines
            .get(&tenant_id)
            .and_then(TenantEngine::components)
            .map(f)
    }

    /// Stop every engine. Failures are logged and do not stop the others.
    pub async fn shutdown(&self) {
        let engines: Vec<TenantEngine<M>> = self.engines.lock().await.drain().map(|(_, e)| e).collect();
        for mut engine in engines {
            match engine.stop(self.monitor.as_ref()).await {
                Ok(report) if report.is_clean() => {}
                Ok(report) => {
                    tracing::warn!(engine = %engine.component_name(), failures = report.failures.len(), "tenant engine stopped with failures");
                }
                Err(error) => {
                    tracing::warn!(engine = %engine.component_name(), %error, "tenant engine failed to stop");
                }
            }
        }
        tracing::info!("all tenant engines stopped");
    }
}
