//! `SQLite` implementation of [`DeviceEventManagement`].
//!
//! Each submission spawns its insert on the runtime and returns at once; the
//! observer is completed when the insert finishes.

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use tenanthub_app::ports::{CompletionObserver, DeviceEventManagement};
use tenanthub_domain::assignment::DeviceStream;
use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::event::{
    AlertRequest, CommandInvocationRequest, CommandResponseRequest, DeviceEvent, EventHeader,
    EventKind, LocationRequest, MeasurementsRequest, StateChangeRequest, StreamDataRequest,
};
use tenanthub_domain::id::{AssignmentId, EventId};
use tenanthub_domain::time::now;

use crate::codec;
use crate::error::StorageError;

struct Wrapper(DeviceEvent);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let kind: String = row.try_get("kind")?;
        let assignment_id: String = row.try_get("assignment_id")?;
        let event_date: String = row.try_get("event_date")?;
        let received_date: String = row.try_get("received_date")?;
        let payload: String = row.try_get("payload")?;
        let metadata: String = row.try_get("metadata")?;

        Ok(Self(DeviceEvent {
            id: codec::parse(&id)?,
            kind: codec::parse::<EventKind>(&kind)?,
            assignment_id: codec::parse(&assignment_id)?,
            event_date: codec::timestamp(&event_date)?,
            received_date: codec::timestamp(&received_date)?,
            payload: codec::json(&payload)?,
            metadata: codec::json(&metadata)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO device_events (id, kind, assignment_id, event_date, received_date, payload, metadata)
    VALUES (?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM device_events WHERE id = ?";
const SELECT_BY_ASSIGNMENT: &str = r"
    SELECT * FROM device_events WHERE assignment_id = ?
    ORDER BY received_date ASC, rowid ASC
    LIMIT ?
";

async fn insert(pool: &SqlitePool, event: DeviceEvent) -> Result<DeviceEvent, TenantHubError> {
    let payload = serde_json::to_string(&event.payload).map_err(StorageError::from)?;
    let metadata = serde_json::to_string(&event.metadata).map_err(StorageError::from)?;

    sqlx::query(INSERT)
        .bind(event.id.to_string())
        .bind(event.kind.as_str())
        .bind(event.assignment_id.to_string())
        .bind(event.event_date.to_rfc3339())
        .bind(event.received_date.to_rfc3339())
        .bind(payload)
        .bind(metadata)
        .execute(pool)
        .await
        .map_err(StorageError::from)?;

    Ok(event)
}

/// `SQLite`-backed event delivery.
pub struct SqliteDeviceEventManagement {
    pool: SqlitePool,
}

impl SqliteDeviceEventManagement {
    /// Create a new instance using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn submit<T: Serialize>(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: &T,
        observer: CompletionObserver,
    ) {
        let payload = match serde_json::to_value(request) {
            Ok(payload) => payload,
            Err(err) => {
                observer.fail(StorageError::from(err).into());
                return;
            }
        };
        let received_date = now();
        let event = DeviceEvent {
            id: EventId::new(),
            kind: observer.kind(),
            assignment_id,
            event_date: header.event_date.unwrap_or(received_date),
            received_date,
            payload,
            metadata: header.metadata,
        };
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let result = insert(&pool, event).await;
            if let Err(error) = &result {
                tracing::debug!(assignment = %assignment_id, %error, "event insert failed");
            }
            observer.complete(result);
        });
    }

    /// Find a stored event by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn get_by_id(&self, id: EventId) -> Result<Option<DeviceEvent>, TenantHubError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|w| w.0))
    }

    /// List the events of an assignment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn find_by_assignment(
        &self,
        assignment_id: AssignmentId,
        limit: usize,
    ) -> Result<Vec<DeviceEvent>, TenantHubError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_ASSIGNMENT)
            .bind(assignment_id.to_string())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

impl DeviceEventManagement for SqliteDeviceEventManagement {
    fn add_measurements(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: MeasurementsRequest,
        observer: CompletionObserver,
    ) {
        self.submit(assignment_id, header, &request, observer);
    }

    fn add_alert(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: AlertRequest,
        observer: CompletionObserver,
    ) {
        self.submit(assignment_id, header, &request, observer);
    }

    fn add_command_invocation(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: CommandInvocationRequest,
        observer: CompletionObserver,
    ) {
        self.submit(assignment_id, header, &request, observer);
    }

    fn add_command_response(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: CommandResponseRequest,
        observer: CompletionObserver,
    ) {
        self.submit(assignment_id, header, &request, observer);
    }

    fn add_location(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: LocationRequest,
        observer: CompletionObserver,
    ) {
        if let Err(err) = request.validate() {
            observer.fail(err.into());
            return;
        }
        self.submit(assignment_id, header, &request, observer);
    }

    fn add_state_change(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: StateChangeRequest,
        observer: CompletionObserver,
    ) {
        self.submit(assignment_id, header, &request, observer);
    }

    fn add_stream_data(
        &self,
        assignment_id: AssignmentId,
        stream: DeviceStream,
        header: EventHeader,
        request: StreamDataRequest,
        observer: CompletionObserver,
    ) {
        if stream.assignment_id != assignment_id || stream.stream_id != request.stream_id {
            observer.fail(TenantHubError::InvalidReference {
                assignment_id,
                stream_id: request.stream_id,
            });
            return;
        }
        self.submit(assignment_id, header, &request, observer);
    }
}
