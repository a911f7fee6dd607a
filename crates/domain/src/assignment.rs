//! Device assignment: the association between a device and its active
//! operational context. Every event is attributed to exactly one assignment.

use serde::{Deserialize, Serialize};

use crate::id::{AssignmentId, DeviceId};

/// Status of a device assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Active,
    Missing,
    Released,
}

impl AssignmentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Missing => "missing",
            Self::Released => "released",
        }
    }

    /// Parse the value produced by [`as_str`](Self::as_str).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "missing" => Some(Self::Missing),
            "released" => Some(Self::Released),
            _ => None,
        }
    }
}

/// A resolved device assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAssignment {
    pub id: AssignmentId,
    pub token: String,
    pub device_id: DeviceId,
    pub status: AssignmentStatus,
}

impl DeviceAssignment {
    /// Create an active assignment for `device_id` with a fresh id.
    #[must_use]
    pub fn new(token: impl Into<String>, device_id: DeviceId) -> Self {
        Self {
            id: AssignmentId::new(),
            token: token.into(),
            device_id,
            status: AssignmentStatus::Active,
        }
    }
}

/// A named data stream attached to an assignment.
///
/// Stream-data events can only be delivered once the stream they reference
/// exists; event delivery consumes this reference but never creates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStream {
    pub assignment_id: AssignmentId,
    pub stream_id: String,
    pub content_type: String,
}
