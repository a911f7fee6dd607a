//! Lifecycle states and operations shared by tenant engines and their
//! sub-components.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operation that can be applied to a lifecycle component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleOperation {
    Initialize,
    Start,
    Stop,
}

impl LifecycleOperation {
    /// Lowercase name used in logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a tenant engine.
///
/// ```text
/// Uninitialized → Initializing → Initialized → Starting → Started → Stopping → Stopped
///                      │                           │                              │
///                      └────────→ Failed ←─────────┘            (restart) Starting ←┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Initialized,
    Starting,
    Started,
    Stopping,
    Stopped,
    Failed,
}

impl LifecycleState {
    /// Whether `operation` may be applied while in this state.
    #[must_use]
    pub fn accepts(self, operation: LifecycleOperation) -> bool {
        match operation {
            LifecycleOperation::Initialize => self == Self::Uninitialized,
            LifecycleOperation::Start => matches!(self, Self::Initialized | Self::Stopped),
            LifecycleOperation::Stop => matches!(self, Self::Started | Self::Failed),
        }
    }

    /// Whether this is one of the in-flight states entered while an operation runs.
    #[must_use]
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Initializing | Self::Starting | Self::Stopping)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
