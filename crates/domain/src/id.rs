//! Typed identifier newtypes backed by UUIDs.
//!
//! Ids serialize as plain UUID strings, which is also how the storage
//! adapter writes them to TEXT columns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Identity of a [`Tenant`](crate::tenant::Tenant). Keys the tenant
    /// engine registry; topic names use the tenant token instead.
    TenantId
);

define_id!(
    /// A physical or virtual device. Only referenced here, through
    /// assignments and group elements; devices themselves live elsewhere.
    DeviceId
);

define_id!(
    /// A [`DeviceAssignment`](crate::assignment::DeviceAssignment). Every
    /// envelope names one, and its string form is the bus message key, so it
    /// also decides the consumer partition.
    AssignmentId
);

define_id!(
    /// A [`DeviceGroup`](crate::group::DeviceGroup), stored in the `_id`
    /// column and scoping the atomic index counter.
    GroupId
);

define_id!(
    /// A [`DeviceGroupElement`](crate::group::DeviceGroupElement).
    GroupElementId
);

define_id!(
    /// A stored [`DeviceEvent`](crate::event::DeviceEvent), assigned by the
    /// delivery API. Command responses point back at their invocation with it.
    EventId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        let a = AssignmentId::new();
        let b = AssignmentId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = GroupId::new();
        let text = id.to_string();
        let parsed: GroupId = text.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_serialize_as_plain_uuid_string() {
        let id = TenantId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: TenantId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_return_error_when_parsing_invalid_uuid() {
        let result = EventId::from_str("not-a-uuid");
        assert!(result.is_err());
    }

    #[test]
    fn should_wrap_existing_uuid_when_using_from_uuid() {
        let uuid = uuid::Uuid::new_v4();
        let id = DeviceId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }
}
