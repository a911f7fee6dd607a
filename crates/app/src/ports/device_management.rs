//! Device management port: lookups the inbound pipeline needs to resolve
//! the assignment an event was sent for.

use std::future::Future;

use tenanthub_domain::assignment::{DeviceAssignment, DeviceStream};
use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::id::AssignmentId;

/// Read access to device assignments and their streams.
pub trait DeviceManagement: Send + Sync {
    /// Look up an assignment by id.
    fn get_device_assignment(
        &self,
        id: AssignmentId,
    ) -> impl Future<Output = Result<Option<DeviceAssignment>, TenantHubError>> + Send;

    /// Look up a stream attached to an assignment.
    ///
    /// Returns `Ok(None)` when `stream_id` is not attached to `assignment_id`.
    fn get_device_stream(
        &self,
        assignment_id: AssignmentId,
        stream_id: &str,
    ) -> impl Future<Output = Result<Option<DeviceStream>, TenantHubError>> + Send;
}
