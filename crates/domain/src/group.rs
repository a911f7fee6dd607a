//! Device group: a named, role-tagged collection of devices and nested groups.
//!
//! Group members are positioned by an index allocated from the group's
//! `last_index` counter. The counter only ever moves through the store's
//! atomic increment; it is never written back from a read copy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{TenantHubError, ValidationError};
use crate::id::{DeviceId, GroupElementId, GroupId};
use crate::time::{self, Timestamp};

/// A persisted device group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceGroup {
    pub id: GroupId,
    pub token: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Ordered role names.
    pub roles: Vec<String>,
    /// Last index handed out to a member; `0` for a new group.
    pub last_index: i64,
    pub created_date: Timestamp,
    pub metadata: BTreeMap<String, String>,
}

impl DeviceGroup {
    /// Create a builder for constructing a [`DeviceGroup`].
    #[must_use]
    pub fn builder() -> DeviceGroupBuilder {
        DeviceGroupBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::Validation`] when `token` or `name` is empty.
    pub fn validate(&self) -> Result<(), TenantHubError> {
        if self.token.is_empty() {
            return Err(ValidationError::EmptyToken.into());
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`DeviceGroup`].
#[derive(Debug, Default)]
pub struct DeviceGroupBuilder {
    id: Option<GroupId>,
    token: Option<String>,
    name: Option<String>,
    description: Option<String>,
    image_url: Option<String>,
    roles: Vec<String>,
    metadata: BTreeMap<String, String>,
}

impl DeviceGroupBuilder {
    #[must_use]
    pub fn id(mut self, id: GroupId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Consume the builder, validate, and return a [`DeviceGroup`].
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::Validation`] if `token` or `name` is missing.
    pub fn build(self) -> Result<DeviceGroup, TenantHubError> {
        let group = DeviceGroup {
            id: self.id.unwrap_or_default(),
            token: self.token.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            description: self.description,
            image_url: self.image_url,
            roles: self.roles,
            last_index: 0,
            created_date: time::now(),
            metadata: self.metadata,
        };
        group.validate()?;
        Ok(group)
    }
}

/// What a group element points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum GroupElementTarget {
    Device(DeviceId),
    Group(GroupId),
}

/// Request to append a member to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupElementRequest {
    pub target: GroupElementTarget,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A member of a [`DeviceGroup`], positioned by `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGroupElement {
    pub id: GroupElementId,
    pub group_id: GroupId,
    pub index: i64,
    pub target: GroupElementTarget,
    pub roles: Vec<String>,
}
