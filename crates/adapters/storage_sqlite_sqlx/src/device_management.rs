//! `SQLite` implementation of [`DeviceManagement`].

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use tenanthub_app::ports::DeviceManagement;
use tenanthub_domain::assignment::{AssignmentStatus, DeviceAssignment, DeviceStream};
use tenanthub_domain::error::{TenantHubError, ValidationError};
use tenanthub_domain::id::AssignmentId;

use crate::codec;
use crate::error::StorageError;

struct AssignmentRow(DeviceAssignment);

impl<'r> FromRow<'r, SqliteRow> for AssignmentRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let device_id: String = row.try_get("device_id")?;
        let status: String = row.try_get("status")?;

        let status = AssignmentStatus::parse(&status).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown assignment status: {status}").into())
        })?;

        Ok(Self(DeviceAssignment {
            id: codec::parse(&id)?,
            token: row.try_get("token")?,
            device_id: codec::parse(&device_id)?,
            status,
        }))
    }
}

struct StreamRow(DeviceStream);

impl<'r> FromRow<'r, SqliteRow> for StreamRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let assignment_id: String = row.try_get("assignment_id")?;

        Ok(Self(DeviceStream {
            assignment_id: codec::parse(&assignment_id)?,
            stream_id: row.try_get("stream_id")?,
            content_type: row.try_get("content_type")?,
        }))
    }
}

const INSERT_ASSIGNMENT: &str =
    "INSERT INTO device_assignments (id, token, device_id, status) VALUES (?, ?, ?, ?)";
const SELECT_ASSIGNMENT_BY_ID: &str = "SELECT * FROM device_assignments WHERE id = ?";
const INSERT_STREAM: &str =
    "INSERT INTO device_streams (assignment_id, stream_id, content_type) VALUES (?, ?, ?)";
const SELECT_STREAM: &str =
    "SELECT * FROM device_streams WHERE assignment_id = ? AND stream_id = ?";

/// `SQLite`-backed device assignments and streams.
pub struct SqliteDeviceManagement {
    pool: SqlitePool,
}

impl SqliteDeviceManagement {
    /// Create a new instance using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a new assignment.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::Validation`] for an empty token, or a
    /// storage error (e.g. duplicate token).
    pub async fn create_assignment(
        &self,
        assignment: DeviceAssignment,
    ) -> Result<DeviceAssignment, TenantHubError> {
        if assignment.token.is_empty() {
            return Err(ValidationError::EmptyToken.into());
        }
        sqlx::query(INSERT_ASSIGNMENT)
            .bind(assignment.id.to_string())
            .bind(&assignment.token)
            .bind(assignment.device_id.to_string())
            .bind(assignment.status.as_str())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(assignment)
    }

    /// Attach a stream to an existing assignment.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the assignment does not exist or the
    /// stream is already attached.
    pub async fn create_stream(&self, stream: DeviceStream) -> Result<DeviceStream, TenantHubError> {
        sqlx::query(INSERT_STREAM)
            .bind(stream.assignment_id.to_string())
            .bind(&stream.stream_id)
            .bind(&stream.content_type)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(stream)
    }
}

impl DeviceManagement for SqliteDeviceManagement {
    fn get_device_assignment(
        &self,
        id: AssignmentId,
    ) -> impl Future<Output = Result<Option<DeviceAssignment>, TenantHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<AssignmentRow> = sqlx::query_as(SELECT_ASSIGNMENT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn get_device_stream(
        &self,
        assignment_id: AssignmentId,
        stream_id: &str,
    ) -> impl Future<Output = Result<Option<DeviceStream>, TenantHubError>> + Send {
        let pool = self.pool.clone();
        let stream_id = stream_id.to_string();
        async move {
            let row: Option<StreamRow> = sqlx::query_as(SELECT_STREAM)
                .bind(assignment_id.to_string())
                .bind(stream_id)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }
}
