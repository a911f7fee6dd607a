//! Device group service: use-cases for groups and their indexed elements.

use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::group::{DeviceGroup, DeviceGroupElement, GroupElementRequest};
use tenanthub_domain::id::{GroupElementId, GroupId};

use crate::ports::DeviceGroupRepository;

/// Application service for device groups.
pub struct DeviceGroupService<R> {
    repo: R,
}

impl<R: DeviceGroupRepository> DeviceGroupService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Create a group after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip_all, fields(group = %group.token))]
    pub async fn create_group(&self, mut group: DeviceGroup) -> Result<DeviceGroup, TenantHubError> {
        group.validate()?;
        group.last_index = 0;
        self.repo.create(group).await
    }

    /// Look up a group by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::GroupNotFound`] when no group with `id`
    /// exists, or a storage error from the repository.
    pub async fn get_group(&self, id: GroupId) -> Result<DeviceGroup, TenantHubError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(TenantHubError::GroupNotFound(id))
    }

    /// Allocate the next element index of a group.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::GroupNotFound`] when the group does not exist.
    pub async fn next_index(&self, id: GroupId) -> Result<i64, TenantHubError> {
        self.repo.next_index(id).await
    }

    /// Append elements to a group, each positioned by a freshly allocated index.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::GroupNotFound`] when the group does not
    /// exist. Elements created before a storage failure are kept.
    #[tracing::instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn add_elements(
        &self,
        group_id: GroupId,
        requests: Vec<GroupElementRequest>,
    ) -> Result<Vec<DeviceGroupElement>, TenantHubError> {
        let mut created = Vec::with_capacity(requests.len());
        for request in requests {
            let index = self.repo.next_index(group_id).await?;
            let element = DeviceGroupElement {
                id: GroupElementId::new(),
                group_id,
                index,
                target: request.target,
                roles: request.roles,
            };
            created.push(self.repo.create_element(element).await?);
        }
        Ok(created)
    }

    /// List the elements of a group ordered by index.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::GroupNotFound`] when the group does not exist.
    pub async fn list_elements(
        &self,
        group_id: GroupId,
    ) -> Result<Vec<DeviceGroupElement>, TenantHubError> {
        self.get_group(group_id).await?;
        self.repo.list_elements(group_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Mutex;
    use tenanthub_domain::error::{ErrorKind, ValidationError};
    use tenanthub_domain::group::GroupElementTarget;
    use tenanthub_domain::id::DeviceId;

    #[derive(Default)]
    struct InMemoryGroupRepo {
        groups: Mutex<HashMap<GroupId, DeviceGroup>>,
        elements: Mutex<Vec<DeviceGroupElement>>,
    }

    impl DeviceGroupRepository for InMemoryGroupRepo {
        fn create(
            &self,
            group: DeviceGroup,
        ) -> impl Future<Output = Result<DeviceGroup, TenantHubError>> + Send {
            let mut groups = self.groups.lock().unwrap();
            groups.insert(group.id, group.clone());
            async { Ok(group) }
        }

        fn get_by_id(
            &self,
            id: GroupId,
        ) -> impl Future<Output = Result<Option<DeviceGroup>, TenantHubError>> + Send {
            let groups = self.groups.lock().unwrap();
            let result = groups.get(&id).cloned();
            async { Ok(result) }
        }

        fn next_index(&self, id: GroupId) -> impl Future<Output = Result<i64, TenantHubError>> + Send {
            let mut groups = self.groups.lock().unwrap();
            let result = match groups.get_mut(&id) {
                Some(group) => {
                    group.last_index += 1;
                    Ok(group.last_index)
                }
                None => Err(TenantHubError::GroupNotFound(id)),
            };
            async { result }
        }

        fn create_element(
            &self,
            element: DeviceGroupElement,
        ) -> impl Future<Output = Result<DeviceGroupElement, TenantHubError>> + Send {
            self.elements.lock().unwrap().push(element.clone());
            async { Ok(element) }
        }

        fn list_elements(
            &self,
            group_id: GroupId,
        ) -> impl Future<Output = Result<Vec<DeviceGroupElement>, TenantHubError>> + Send {
            let mut result: Vec<DeviceGroupElement> = self
                .elements
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.group_id == group_id)
                .cloned()
                .collect();
            result.sort_by_key(|e| e.index);
            async { Ok(result) }
        }
    }

    fn make_service() -> DeviceGroupService<InMemoryGroupRepo> {
        DeviceGroupService::new(InMemoryGroupRepo::default())
    }

    fn valid_group() -> DeviceGroup {
        DeviceGroup::builder()
            .token("fleet-a")
            .name("Fleet A")
            .build()
            .unwrap()
    }

    fn device_element() -> GroupElementRequest {
        GroupElementRequest {
            target: GroupElementTarget::Device(DeviceId::new()),
            roles: vec!["member".to_string()],
        }
    }

    #[tokio::test]
    async fn should_create_group_with_zero_index() {
        let svc = make_service();
        let mut group = valid_group();
        group.last_index = 42;
        let id = group.id;

        svc.create_group(group).await.unwrap();

        let fetched = svc.get_group(id).await.unwrap();
        assert_eq!(fetched.last_index, 0);
    }

    #[tokio::test]
    async fn should_reject_create_when_name_is_empty() {
        let svc = make_service();
        let mut group = valid_group();
        group.name = String::new();

        let result = svc.create_group(group).await;
        assert!(matches!(
            result,
            Err(TenantHubError::Validation(ValidationError::EmptyName))
        ));
    }

    #[tokio::test]
    async fn should_hand_out_consecutive_indexes() {
        let svc = make_service();
        let group = svc.create_group(valid_group()).await.unwrap();

        let first = svc.next_index(group.id).await.unwrap();
        let second = svc.next_index(group.id).await.unwrap();

        assert_eq!((first, second), (1, 2));
        assert_eq!(svc.get_group(group.id).await.unwrap().last_index, 2);
    }

    #[tokio::test]
    async fn should_return_group_not_found_without_creating_group() {
        let svc = make_service();
        let missing = GroupId::new();

        let err = svc.next_index(missing).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::GroupNotFound);
        assert_eq!(svc.get_group(missing).await.unwrap_err().kind(), ErrorKind::GroupNotFound);
    }

    #[tokio::test]
    async fn should_position_added_elements_by_allocated_index() {
        let svc = make_service();
        let group = svc.create_group(valid_group()).await.unwrap();
        svc.next_index(group.id).await.unwrap();

        let created = svc
            .add_elements(group.id, vec![device_element(), device_element()])
            .await
            .unwrap();

        let indexes: Vec<i64> = created.iter().map(|e| e.index).collect();
        assert_eq!(indexes, vec![2, 3]);
        let listed = svc.list_elements(group.id).await.unwrap();
        assert_eq!(listed, created);
    }

    #[tokio::test]
    async fn should_fail_adding_elements_to_missing_group() {
        let svc = make_service();
        let result = svc.add_elements(GroupId::new(), vec![device_element()]).await;
        assert!(matches!(result, Err(TenantHubError::GroupNotFound(_))));
    }
}
