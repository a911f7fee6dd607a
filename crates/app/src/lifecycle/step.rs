//! Composite lifecycle step: an ordered plan of `(component, operation)`
//! entries executed sequentially.
//!
//! A failing entry marked *required* aborts the plan: later entries do not
//! run and the failure is wrapped in [`TenantHubError::LifecycleStepFailed`].
//! A failing optional entry is recorded in the [`StepReport`] and the plan
//! continues.

use std::sync::Arc;

use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::lifecycle::LifecycleOperation;

use super::{LifecycleComponent, Progress, ProgressMonitor, ProgressStatus};

struct StepEntry {
    component: Arc<dyn LifecycleComponent>,
    operation: LifecycleOperation,
    required: bool,
}

/// A failure of an optional entry.
#[derive(Debug)]
pub struct StepFailure {
    pub component: String,
    pub operation: LifecycleOperation,
    pub error: TenantHubError,
}

/// What a successful execution did.
#[derive(Debug, Default)]
pub struct StepReport {
    /// Names of the components whose entry ran, in execution order.
    pub executed: Vec<String>,
    /// Optional entries that failed.
    pub failures: Vec<StepFailure>,
}

impl StepReport {
    /// Whether every entry succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered plan of lifecycle operations.
pub struct CompositeLifecycleStep {
    name: String,
    entries: Vec<StepEntry>,
}

impl CompositeLifecycleStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry at the end of the plan.
    pub fn add_step(
        &mut self,
        component: Arc<dyn LifecycleComponent>,
        operation: LifecycleOperation,
        required: bool,
    ) -> &mut Self {
        self.entries.push(StepEntry {
            component,
            operation,
            required,
        });
        self
    }

    pub fn add_initialize_step(
        &mut self,
        component: Arc<dyn LifecycleComponent>,
        required: bool,
    ) -> &mut Self {
        self.add_step(component, LifecycleOperation::Initialize, required)
    }

    pub fn add_start_step(
        &mut self,
        component: Arc<dyn LifecycleComponent>,
        required: bool,
    ) -> &mut Self {
        self.add_step(component, LifecycleOperation::Start, required)
    }

    /// Stop entries are always optional so one failing component does not
    /// keep the others running.
    pub fn add_stop_step(&mut self, component: Arc<dyn LifecycleComponent>) -> &mut Self {
        self.add_step(component, LifecycleOperation::Stop, false)
    }

    /// Run every entry in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::LifecycleStepFailed`] naming this plan and
    /// the component of the first required entry that failed. Entries after
    /// it are not executed.
    pub async fn execute(self, monitor: &dyn ProgressMonitor) -> Result<StepReport, TenantHubError> {
        let Self { name, entries } = self;
        let total = entries.len();
        let mut report = StepReport::default();

        for (index, entry) in entries.into_iter().enumerate() {
            let component = entry.component.name().to_string();
            let operation = entry.operation;
            let notify = |status| {
                monitor.report(&Progress {
                    plan: &name,
                    step: index + 1,
                    total,
                    component: &component,
                    operation,
                    status,
                });
            };

            notify(ProgressStatus::Started);
            let result = entry.component.execute(operation, monitor).await;
            match result {
                Ok(()) => {
                    notify(ProgressStatus::Completed);
                    report.executed.push(component);
                }
                Err(error) => {
                    notify(ProgressStatus::Failed);
                    if entry.required {
                        return Err(TenantHubError::LifecycleStepFailed {
                            step: name.clone(),
                            component,
                            source: Box::new(error),
                        });
                    }
                    tracing::warn!(
                        plan = %name,
                        component = %component,
                        %operation,
                        error = %error,
                        "optional lifecycle step failed, continuing"
                    );
                    report.executed.push(component.clone());
                    report.failures.push(StepFailure {
                        component,
                        operation,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }
}
