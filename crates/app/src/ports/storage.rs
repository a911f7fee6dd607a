//! Storage port — repository traits for persistence.

use std::future::Future;

use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::group::{DeviceGroup, DeviceGroupElement};
use tenanthub_domain::id::GroupId;

/// Repository for device groups and their elements.
pub trait DeviceGroupRepository: Send + Sync {
    /// Persist a new group.
    fn create(
        &self,
        group: DeviceGroup,
    ) -> impl Future<Output = Result<DeviceGroup, TenantHubError>> + Send;

    /// Find a group by id.
    fn get_by_id(
        &self,
        id: GroupId,
    ) -> impl Future<Output = Result<Option<DeviceGroup>, TenantHubError>> + Send;

    /// Increment the group's `last_index` by one and return the new value.
    ///
    /// Implementations must perform the read and the write as a single
    /// store-level atomic operation: concurrent callers on the same group
    /// observe distinct, contiguous values. Fails with
    /// [`TenantHubError::GroupNotFound`] and creates nothing when no group
    /// has `id`.
    fn next_index(&self, id: GroupId) -> impl Future<Output = Result<i64, TenantHubError>> + Send;

    /// Persist a group element.
    fn create_element(
        &self,
        element: DeviceGroupElement,
    ) -> impl Future<Output = Result<DeviceGroupElement, TenantHubError>> + Send;

    /// List the elements of a group ordered by index.
    fn list_elements(
        &self,
        group_id: GroupId,
    ) -> impl Future<Output = Result<Vec<DeviceGroupElement>, TenantHubError>> + Send;
}
