//! The lifecycle capability shared by every tenant engine sub-component.

use std::future::Future;
use std::pin::Pin;

use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::lifecycle::LifecycleOperation;

use super::ProgressMonitor;

/// Boxed future returned by lifecycle operations.
pub type LifecycleFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TenantHubError>> + Send + 'a>>;

/// A component with an initialize → start → stop lifecycle.
///
/// Components are held as `Arc<dyn LifecycleComponent>` by composite steps,
/// so operations return boxed futures.
pub trait LifecycleComponent: Send + Sync {
    /// Name used in progress reports, logs and step failures.
    fn name(&self) -> &str;

    /// Prepare resources. Called once, before the first `start`.
    fn initialize<'a>(&'a self, monitor: &'a dyn ProgressMonitor) -> LifecycleFuture<'a>;

    /// Begin processing. May be called again after a `stop`.
    fn start<'a>(&'a self, monitor: &'a dyn ProgressMonitor) -> LifecycleFuture<'a>;

    /// Stop processing and release what `start` acquired.
    fn stop<'a>(&'a self, monitor: &'a dyn ProgressMonitor) -> LifecycleFuture<'a>;

    /// Dispatch `operation` to the matching method.
    fn execute<'a>(
        &'a self,
        operation: LifecycleOperation,
        monitor: &'a dyn ProgressMonitor,
    ) -> LifecycleFuture<'a> {
        match operation {
            LifecycleOperation::Initialize => self.initialize(monitor),
            LifecycleOperation::Start => self.start(monitor),
            LifecycleOperation::Stop => self.stop(monitor),
        }
    }
}
