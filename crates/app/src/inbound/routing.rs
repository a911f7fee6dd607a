//! Event routing: dispatches a decoded envelope to the delivery operation
//! matching its kind.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use tenanthub_domain::assignment::DeviceAssignment;
use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::event::{DeviceEventEnvelope, DeviceEventRequest, EventKind};
use tenanthub_domain::id::AssignmentId;

use super::BlockingDeviceEventManagement;
use crate::ports::{CompletionObserver, DeliveryOutcome, DeviceEventManagement, DeviceManagement};

/// Routes events to the delivery API.
///
/// Every kind but stream data is submitted asynchronously; its outcome goes
/// to the outcome channel given at construction. Stream data is resolved
/// against its stream first and then stored synchronously, bounded by the
/// configured timeout.
pub struct EventStorageStrategy<DM, EM> {
    device_management: Arc<DM>,
    event_management: Arc<EM>,
    outcomes: mpsc::UnboundedSender<DeliveryOutcome>,
    stream_data_timeout: Duration,
}

impl<DM: DeviceManagement, EM: DeviceEventManagement> EventStorageStrategy<DM, EM> {
    pub fn new(
        device_management: Arc<DM>,
        event_management: Arc<EM>,
        outcomes: mpsc::UnboundedSender<DeliveryOutcome>,
        stream_data_timeout: Duration,
    ) -> Self {
        Self {
            device_management,
            event_management,
            outcomes,
            stream_data_timeout,
        }
    }

    fn observer(&self, assignment_id: AssignmentId, kind: EventKind) -> CompletionObserver {
        CompletionObserver::forwarding(assignment_id, kind, self.outcomes.clone())
    }

    /// Store one event for `assignment`.
    ///
    /// # Errors
    ///
    /// - [`TenantHubError::UnsupportedEventType`] for a kind that has no
    ///   delivery operation; nothing is submitted.
    /// - [`TenantHubError::InvalidReference`] for stream data whose stream is
    ///   not attached to the assignment; nothing is submitted.
    /// - Any error of the synchronous stream data delivery.
    #[tracing::instrument(skip_all, fields(assignment = %assignment.id, kind = envelope.request.kind_name()))]
    pub async fn store_device_event(
        &self,
        assignment: &DeviceAssignment,
        envelope: &DeviceEventEnvelope,
    ) -> Result<(), TenantHubError> {
        let id = assignment.id;
        let header = envelope.header.clone();
        let events = self.event_management.as_ref();

        match &envelope.request {
            DeviceEventRequest::Measurements(request) => events.add_measurements(
                id,
                header,
                request.clone(),
                self.observer(id, EventKind::Measurements),
            ),
            DeviceEventRequest::Alert(request) => {
                events.add_alert(id, header, request.clone(), self.observer(id, EventKind::Alert));
            }
            DeviceEventRequest::CommandInvocation(request) => events.add_command_invocation(
                id,
                header,
                request.clone(),
                self.observer(id, EventKind::CommandInvocation),
            ),
            DeviceEventRequest::CommandResponse(request) => events.add_command_response(
                id,
                header,
                request.clone(),
                self.observer(id, EventKind::CommandResponse),
            ),
            DeviceEventRequest::Location(request) => events.add_location(
                id,
                header,
                request.clone(),
                self.observer(id, EventKind::Location),
            ),
            DeviceEventRequest::StateChange(request) => events.add_state_change(
                id,
                header,
                request.clone(),
                self.observer(id, EventKind::StateChange),
            ),
            DeviceEventRequest::StreamData(request) => {
                let stream = self
                    .device_management
                    .get_device_stream(id, &request.stream_id)
                    .await?
                    .ok_or_else(|| TenantHubError::InvalidReference {
                        assignment_id: id,
                        stream_id: request.stream_id.clone(),
                    })?;
                let event = BlockingDeviceEventManagement::new(events, self.stream_data_timeout)
                    .add_stream_data(id, stream, header, request.clone())
                    .await?;
                tracing::trace!(event = %event.id, "stream data stored");
            }
            DeviceEventRequest::Unrecognized { kind, .. } => {
                return Err(TenantHubError::UnsupportedEventType { kind: kind.clone() });
            }
        }
        Ok(())
    }
}
