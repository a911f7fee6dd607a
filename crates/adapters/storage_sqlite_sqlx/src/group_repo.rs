//! `SQLite` implementation of [`DeviceGroupRepository`].

use std::collections::BTreeMap;
use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use tenanthub_app::ports::DeviceGroupRepository;
use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::group::{DeviceGroup, DeviceGroupElement, GroupElementTarget};
use tenanthub_domain::id::{DeviceId, GroupId};

use crate::codec;
use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`DeviceGroup`].
struct GroupRow(DeviceGroup);

impl<'r> FromRow<'r, SqliteRow> for GroupRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("_id")?;
        let roles: String = row.try_get("role")?;
        let created_date: String = row.try_get("created_date")?;
        let metadata: String = row.try_get("metadata")?;

        Ok(Self(DeviceGroup {
            id: codec::parse(&id)?,
            token: row.try_get("tokn")?,
            name: row.try_get("name")?,
            description: row.try_get("desc")?,
            image_url: row.try_get("imgu")?,
            roles: codec::json(&roles)?,
            last_index: row.try_get("lidx")?,
            created_date: codec::timestamp(&created_date)?,
            metadata: codec::json::<BTreeMap<String, String>>(&metadata)?,
        }))
    }
}

/// Wrapper for converting database rows into domain [`DeviceGroupElement`].
struct ElementRow(DeviceGroupElement);

impl<'r> FromRow<'r, SqliteRow> for ElementRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let group_id: String = row.try_get("group_id")?;
        let target_type: String = row.try_get("target_type")?;
        let target_id: String = row.try_get("target_id")?;
        let roles: String = row.try_get("roles")?;

        let target = match target_type.as_str() {
            "device" => GroupElementTarget::Device(codec::parse::<DeviceId>(&target_id)?),
            "group" => GroupElementTarget::Group(codec::parse::<GroupId>(&target_id)?),
            other => {
                return Err(sqlx::Error::Decode(
                    format!("unknown group element target type: {other}").into(),
                ));
            }
        };

        Ok(Self(DeviceGroupElement {
            id: codec::parse(&id)?,
            group_id: codec::parse(&group_id)?,
            index: row.try_get("idx")?,
            target,
            roles: codec::json(&roles)?,
        }))
    }
}

fn target_columns(target: GroupElementTarget) -> (&'static str, String) {
    match target {
        GroupElementTarget::Device(id) => ("device", id.to_string()),
        GroupElementTarget::Group(id) => ("group", id.to_string()),
    }
}

const INSERT_GROUP: &str = r#"
    INSERT INTO device_groups (_id, tokn, name, "desc", imgu, role, lidx, created_date, metadata)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;
const SELECT_GROUP_BY_ID: &str = "SELECT * FROM device_groups WHERE _id = ?";
// Read-modify-write in one statement: concurrent callers never see the same value.
const INCREMENT_INDEX: &str = "UPDATE device_groups SET lidx = lidx + 1 WHERE _id = ? RETURNING lidx";
const INSERT_ELEMENT: &str = r"
    INSERT INTO device_group_elements (id, group_id, idx, target_type, target_id, roles)
    VALUES (?, ?, ?, ?, ?, ?)
";
const SELECT_ELEMENTS: &str = "SELECT * FROM device_group_elements WHERE group_id = ? ORDER BY idx";

/// `SQLite`-backed device group repository.
pub struct SqliteDeviceGroupRepository {
    pool: SqlitePool,
}

impl SqliteDeviceGroupRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DeviceGroupRepository for SqliteDeviceGroupRepository {
    fn create(
        &self,
        group: DeviceGroup,
    ) -> impl Future<Output = Result<DeviceGroup, TenantHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let roles = serde_json::to_string(&group.roles).map_err(StorageError::from)?;
            let metadata = serde_json::to_string(&group.metadata).map_err(StorageError::from)?;

            sqlx::query(INSERT_GROUP)
                .bind(group.id.to_string())
                .bind(&group.token)
                .bind(&group.name)
                .bind(&group.description)
                .bind(&group.image_url)
                .bind(roles)
                .bind(group.last_index)
                .bind(group.created_date.to_rfc3339())
                .bind(metadata)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(group)
        }
    }

    fn get_by_id(
        &self,
        id: GroupId,
    ) -> impl Future<Output = Result<Option<DeviceGroup>, TenantHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<GroupRow> = sqlx::query_as(SELECT_GROUP_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn next_index(&self, id: GroupId) -> impl Future<Output = Result<i64, TenantHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let index: Option<i64> = sqlx::query_scalar(INCREMENT_INDEX)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            index.ok_or(TenantHubError::GroupNotFound(id))
        }
    }

    fn create_element(
        &self,
        element: DeviceGroupElement,
    ) -> impl Future<Output = Result<DeviceGroupElement, TenantHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let (target_type, target_id) = target_columns(element.target);
            let roles = serde_json::to_string(&element.roles).map_err(StorageError::from)?;

            sqlx::query(INSERT_ELEMENT)
                .bind(element.id.to_string())
                .bind(element.group_id.to_string())
                .bind(element.index)
                .bind(target_type)
                .bind(target_id)
                .bind(roles)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(element)
        }
    }

    fn list_elements(
        &self,
        group_id: GroupId,
    ) -> impl Future<Output = Result<Vec<DeviceGroupElement>, TenantHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<ElementRow> = sqlx::query_as(SELECT_ELEMENTS)
                .bind(group_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }
}
