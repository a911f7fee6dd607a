//! Lifecycle orchestration: components with initialize/start/stop
//! operations, progress reporting, and composite steps that run an ordered
//! plan of operations across components.

pub mod component;
pub mod monitor;
pub mod step;

pub use component::{LifecycleComponent, LifecycleFuture};
pub use monitor::{LoggingProgressMonitor, Progress, ProgressMonitor, ProgressStatus};
pub use step::{CompositeLifecycleStep, StepFailure, StepReport};
