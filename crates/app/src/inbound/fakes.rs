//! In-memory port implementations shared by the inbound tests.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Mutex;

use tenanthub_domain::assignment::{DeviceAssignment, DeviceStream};
use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::event::{
    AlertRequest, CommandInvocationRequest, CommandResponseRequest, DeviceEvent, EventHeader,
    EventKind, LocationRequest, MeasurementsRequest, StateChangeRequest, StreamDataRequest,
};
use tenanthub_domain::id::{AssignmentId, DeviceId, EventId};
use tenanthub_domain::time::now;

use crate::ports::{CompletionObserver, DeviceEventManagement, DeviceManagement};

#[derive(Default)]
pub(crate) struct InMemoryDeviceManagement {
    assignments: Mutex<HashMap<AssignmentId, DeviceAssignment>>,
    streams: Mutex<HashMap<(AssignmentId, String), DeviceStream>>,
}

impl InMemoryDeviceManagement {
    pub(crate) fn add_assignment(&self, token: &str) -> DeviceAssignment {
        let assignment = DeviceAssignment::new(token, DeviceId::new());
        self.assignments
            .lock()
            .unwrap()
            .insert(assignment.id, assignment.clone());
        assignment
    }

    pub(crate) fn add_stream(&self, assignment_id: AssignmentId, stream_id: &str) {
        let stream = DeviceStream {
            assignment_id,
            stream_id: stream_id.to_string(),
            content_type: "application/octet-stream".to_string(),
        };
        self.streams
            .lock()
            .unwrap()
            .insert((assignment_id, stream_id.to_string()), stream);
    }
}

impl DeviceManagement for InMemoryDeviceManagement {
    fn get_device_assignment(
        &self,
        id: AssignmentId,
    ) -> impl Future<Output = Result<Option<DeviceAssignment>, TenantHubError>> + Send {
        let found = self.assignments.lock().unwrap().get(&id).cloned();
        async { Ok(found) }
    }

    fn get_device_stream(
        &self,
        assignment_id: AssignmentId,
        stream_id: &str,
    ) -> impl Future<Output = Result<Option<DeviceStream>, TenantHubError>> + Send {
        let found = self
            .streams
            .lock()
            .unwrap()
            .get(&(assignment_id, stream_id.to_string()))
            .cloned();
        async { Ok(found) }
    }
}

/// How [`RecordingEventManagement`] completes observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    Succeed,
    Fail,
    Abandon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Recorded {
    pub(crate) assignment_id: AssignmentId,
    pub(crate) kind: EventKind,
    pub(crate) label: String,
}

/// Records every delivery call and completes its observer synchronously.
pub(crate) struct RecordingEventManagement {
    behavior: Behavior,
    calls: Mutex<Vec<Recorded>>,
}

impl RecordingEventManagement {
    pub(crate) fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, assignment_id: AssignmentId, label: String, observer: CompletionObserver) {
        let kind = observer.kind();
        self.calls.lock().unwrap().push(Recorded {
            assignment_id,
            kind,
            label,
        });
        match self.behavior {
            Behavior::Succeed => observer.succeed(DeviceEvent {
                id: EventId::new(),
                kind,
                assignment_id,
                event_date: now(),
                received_date: now(),
                payload: serde_json::Value::Null,
                metadata: BTreeMap::new(),
            }),
            Behavior::Fail => observer.fail(TenantHubError::Storage("disk full".into())),
            Behavior::Abandon => drop(observer),
        }
    }
}

impl DeviceEventManagement for RecordingEventManagement {
    fn add_measurements(
        &self,
        assignment_id: AssignmentId,
        _header: EventHeader,
        request: MeasurementsRequest,
        observer: CompletionObserver,
    ) {
        let label = request.measurements.keys().cloned().collect::<Vec<_>>().join(",");
        self.record(assignment_id, label, observer);
    }

    fn add_alert(
        &self,
        assignment_id: AssignmentId,
        _header: EventHeader,
        request: AlertRequest,
        observer: CompletionObserver,
    ) {
        self.record(assignment_id, request.alert_type, observer);
    }

    fn add_command_invocation(
        &self,
        assignment_id: AssignmentId,
        _header: EventHeader,
        request: CommandInvocationRequest,
        observer: CompletionObserver,
    ) {
        self.record(assignment_id, request.command_token, observer);
    }

    fn add_command_response(
        &self,
        assignment_id: AssignmentId,
        _header: EventHeader,
        request: CommandResponseRequest,
        observer: CompletionObserver,
    ) {
        self.record(assignment_id, request.response, observer);
    }

    fn add_location(
        &self,
        assignment_id: AssignmentId,
        _header: EventHeader,
        request: LocationRequest,
        observer: CompletionObserver,
    ) {
        self.record(assignment_id, format!("{},{}", request.latitude, request.longitude), observer);
    }

    fn add_state_change(
        &self,
        assignment_id: AssignmentId,
        _header: EventHeader,
        request: StateChangeRequest,
        observer: CompletionObserver,
    ) {
        self.record(assignment_id, request.attribute, observer);
    }

    fn add_stream_data(
        &self,
        assignment_id: AssignmentId,
        stream: DeviceStream,
        _header: EventHeader,
        request: StreamDataRequest,
        observer: CompletionObserver,
    ) {
        let label = format!("{}#{}", stream.stream_id, request.sequence_number);
        self.record(assignment_id, label, observer);
    }
}

pub(crate) fn measurements(name: &str, value: f64) -> MeasurementsRequest {
    MeasurementsRequest {
        measurements: BTreeMap::from([(name.to_string(), value)]),
    }
}

pub(crate) fn command(token: &str) -> CommandInvocationRequest {
    CommandInvocationRequest {
        initiator: "rest".to_string(),
        target: "assignment".to_string(),
        command_token: token.to_string(),
        parameter_values: BTreeMap::new(),
    }
}
