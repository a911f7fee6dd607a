//! Progress reporting for composite lifecycle steps.

use tenanthub_domain::lifecycle::LifecycleOperation;

/// Where a step entry is in its execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Started,
    Completed,
    Failed,
}

/// One progress notification emitted by a composite step.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// Name of the composite step being executed.
    pub plan: &'a str,
    /// 1-based position of the entry within the plan.
    pub step: usize,
    pub total: usize,
    pub component: &'a str,
    pub operation: LifecycleOperation,
    pub status: ProgressStatus,
}

/// Receives progress notifications while lifecycle operations run.
pub trait ProgressMonitor: Send + Sync {
    fn report(&self, progress: &Progress<'_>);
}

/// Monitor that turns every notification into a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingProgressMonitor;

impl ProgressMonitor for LoggingProgressMonitor {
    fn report(&self, progress: &Progress<'_>) {
        let Progress {
            plan,
            step,
            total,
            component,
            operation,
            status,
        } = *progress;
        match status {
            ProgressStatus::Started => {
                tracing::debug!(plan, step, total, component, %operation, "lifecycle step started");
            }
            ProgressStatus::Completed => {
                tracing::info!(plan, step, total, component, %operation, "lifecycle step completed");
            }
            ProgressStatus::Failed => {
                tracing::warn!(plan, step, total, component, %operation, "lifecycle step failed");
            }
        }
    }
}
