//! Tenant: an isolated customer/account context.
//!
//! Each active tenant owns exactly one tenant engine; nothing owned by that
//! engine is shared with other tenants.

use serde::{Deserialize, Serialize};

use crate::error::{TenantHubError, ValidationError};
use crate::id::TenantId;

/// An isolated customer context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    /// Stable, human-readable key used in topic names.
    pub token: String,
    pub name: String,
}

impl Tenant {
    /// Create a tenant with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::Validation`] when `token` or `name` is empty.
    pub fn new(token: impl Into<String>, name: impl Into<String>) -> Result<Self, TenantHubError> {
        let tenant = Self {
            id: TenantId::new(),
            token: token.into(),
            name: name.into(),
        };
        tenant.validate()?;
        Ok(tenant)
    }

    /// Replace the generated id with a known one.
    #[must_use]
    pub fn with_id(mut self, id: TenantId) -> Self {
        self.id = id;
        self
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

/// Template naming the initial dataset a tenant is bootstrapped with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetTemplate {
    pub id: String,
    pub name: String,
}

impl DatasetTemplate {
    /// The empty template: no data is seeded.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            id: "empty".to_string(),
            name: "Empty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_create_tenant_when_token_and_name_present() {
        let tenant = Tenant::new("acme", "Acme Corp").unwrap();
        assert_eq!(tenant.token, "acme");
        assert_eq!(tenant.name, "Acme Corp");
    }

    #[test]
    fn should_reject_empty_token() {
        let result = Tenant::new("", "Acme Corp");
        assert!(matches!(
            result,
            Err(TenantHubError::Validation(ValidationError::EmptyToken))
        ));
    }

    #[test]
    fn should_reject_empty_name() {
        let result = Tenant::new("acme", "");
        assert!(matches!(
            result,
            Err(TenantHubError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_keep_provided_id() {
        let id = TenantId::new();
        let tenant = Tenant::new("acme", "Acme").unwrap().with_id(id);
        assert_eq!(tenant.id, id);
    }
}
