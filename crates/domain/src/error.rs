//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`TenantHubError`] via `From`. Wrapping variants keep the original error
//! reachable through [`std::error::Error::source`].

use std::time::Duration;

use crate::id::{AssignmentId, GroupId};
use crate::lifecycle::{LifecycleOperation, LifecycleState};

/// Top-level error for every tenanthub operation.
#[derive(Debug, thiserror::Error)]
pub enum TenantHubError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// The envelope carries an event kind the routing strategy cannot store.
    #[error("unknown event type sent for storage: {kind}")]
    UnsupportedEventType { kind: String },

    /// Stream data references a stream that is not attached to the assignment.
    #[error("stream data references invalid stream: {stream_id}")]
    InvalidReference {
        assignment_id: AssignmentId,
        stream_id: String,
    },

    #[error("device group {0} not found")]
    GroupNotFound(GroupId),

    /// A required entry of a composite lifecycle step failed.
    #[error("lifecycle step '{step}' failed on component '{component}'")]
    LifecycleStepFailed {
        step: String,
        component: String,
        #[source]
        source: Box<TenantHubError>,
    },

    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        operation: LifecycleOperation,
        state: LifecycleState,
    },

    /// The component was used before its lifecycle allowed it.
    #[error("component '{component}' is not ready")]
    ComponentNotReady { component: String },

    #[error("event delivery did not complete within {0:?}")]
    DeliveryTimeout(Duration),

    #[error("event delivery was abandoned before completion")]
    DeliveryAbandoned,

    #[error("failed to decode payload")]
    Decode(#[from] serde_json::Error),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Flat classification of [`TenantHubError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    UnsupportedEventType,
    InvalidReference,
    GroupNotFound,
    LifecycleStepFailed,
    InvalidTransition,
    ComponentNotReady,
    DeliveryTimeout,
    DeliveryAbandoned,
    Decode,
    Storage,
}

impl TenantHubError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::UnsupportedEventType { .. } => ErrorKind::UnsupportedEventType,
            Self::InvalidReference { .. } => ErrorKind::InvalidReference,
            Self::GroupNotFound(_) => ErrorKind::GroupNotFound,
            Self::LifecycleStepFailed { .. } => ErrorKind::LifecycleStepFailed,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::ComponentNotReady { .. } => ErrorKind::ComponentNotReady,
            Self::DeliveryTimeout(_) => ErrorKind::DeliveryTimeout,
            Self::DeliveryAbandoned => ErrorKind::DeliveryAbandoned,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Follow nested [`LifecycleStepFailed`](Self::LifecycleStepFailed)
    /// wrappers down to the error that originated in a component.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        let mut current = self;
        while let Self::LifecycleStepFailed { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    /// Build a [`ComponentNotReady`](Self::ComponentNotReady) error.
    pub fn not_ready(component: impl Into<String>) -> Self {
        Self::ComponentNotReady {
            component: component.into(),
        }
    }
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("token must not be empty")]
    EmptyToken,

    #[error("{field} is out of range")]
    OutOfRange { field: &'static str },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("token {token} is already in use")]
    DuplicateToken { token: String },
}

/// A lookup by id found nothing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn should_name_the_kind_when_event_type_unsupported() {
        let err = TenantHubError::UnsupportedEventType {
            kind: "Telemetry".to_string(),
        };
        assert_eq!(err.to_string(), "unknown event type sent for storage: Telemetry");
        assert_eq!(err.kind(), ErrorKind::UnsupportedEventType);
    }

    #[test]
    fn should_expose_original_cause_through_source() {
        let err = TenantHubError::LifecycleStepFailed {
            step: "Start inbound".to_string(),
            component: "consumer".to_string(),
            source: Box::new(group_not_found()),
        };
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), group_not_found().to_string());
    }

    #[test]
    fn should_walk_nested_step_failures_to_root_cause() {
        let inner = TenantHubError::LifecycleStepFailed {
            step: "inner".to_string(),
            component: "a".to_string(),
            source: Box::new(TenantHubError::DeliveryAbandoned),
        };
        let outer = TenantHubError::LifecycleStepFailed {
            step: "outer".to_string(),
            component: "b".to_string(),
            source: Box::new(inner),
        };
        assert_eq!(outer.root_cause().kind(), ErrorKind::DeliveryAbandoned);
    }

    #[test]
    fn should_return_self_as_root_cause_when_not_wrapped() {
        let err = TenantHubError::not_ready("producer");
        assert_eq!(err.root_cause().kind(), ErrorKind::ComponentNotReady);
    }

    #[test]
    fn should_format_not_found_with_entity_and_id() {
        let err: TenantHubError = NotFoundError {
            entity: "DeviceAssignment",
            id: "abc".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "DeviceAssignment abc not found");
    }

    fn group_not_found() -> TenantHubError {
        TenantHubError::GroupNotFound(GroupId::from_uuid(uuid::Uuid::nil()))
    }
}
