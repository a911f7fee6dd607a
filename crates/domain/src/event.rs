//! Device events: decoded envelopes received from the bus and the records
//! persisted once an event has been stored.
//!
//! The set of event kinds is closed. An envelope whose `kind` is not one of
//! them still decodes, as [`DeviceEventRequest::Unrecognized`], so the routing
//! layer can reject it by name instead of the bus consumer failing to parse.
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "source_id": "gateway-7",
//!   "assignment_id": "6f1c…",
//!   "event_date": "2024-05-01T12:00:00Z",
//!   "metadata": { "fw": "1.2.0" },
//!   "kind": "Measurements",
//!   "payload": { "measurements": { "temp": 21.5 } }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assignment::DeviceAssignment;
use crate::error::{TenantHubError, ValidationError};
use crate::id::{AssignmentId, EventId, TenantId};
use crate::time::Timestamp;

/// The closed set of storable event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Measurements,
    Alert,
    CommandInvocation,
    CommandResponse,
    Location,
    StateChange,
    StreamData,
}

impl EventKind {
    pub const ALL: [Self; 7] = [
        Self::Measurements,
        Self::Alert,
        Self::CommandInvocation,
        Self::CommandResponse,
        Self::Location,
        Self::StateChange,
        Self::StreamData,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Measurements => "Measurements",
            Self::Alert => "Alert",
            Self::CommandInvocation => "CommandInvocation",
            Self::CommandResponse => "CommandResponse",
            Self::Location => "Location",
            Self::StateChange => "StateChange",
            Self::StreamData => "StreamData",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a string that names no [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Named numeric readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementsRequest {
    pub measurements: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlertLevel {
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRequest {
    pub alert_type: String,
    #[serde(default)]
    pub level: AlertLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInvocationRequest {
    pub initiator: String,
    pub target: String,
    pub command_token: String,
    #[serde(default)]
    pub parameter_values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponseRequest {
    pub originating_event_id: EventId,
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl LocationRequest {
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfRange`] when a coordinate is outside
    /// its valid range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::OutOfRange { field: "latitude" });
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::OutOfRange { field: "longitude" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeRequest {
    pub attribute: String,
    pub change_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<String>,
    pub new_state: String,
}

/// A chunk of data belonging to a device stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDataRequest {
    pub stream_id: String,
    pub sequence_number: i64,
    pub data: Vec<u8>,
}

/// Kind-specific payload of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEventRequest {
    Measurements(MeasurementsRequest),
    Alert(AlertRequest),
    CommandInvocation(CommandInvocationRequest),
    CommandResponse(CommandResponseRequest),
    Location(LocationRequest),
    StateChange(StateChangeRequest),
    StreamData(StreamDataRequest),
    /// A kind this system does not know how to store.
    Unrecognized { kind: String, payload: Value },
}

impl DeviceEventRequest {
    /// The event kind, or `None` for [`Unrecognized`](Self::Unrecognized).
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Measurements(_) => Some(EventKind::Measurements),
            Self::Alert(_) => Some(EventKind::Alert),
            Self::CommandInvocation(_) => Some(EventKind::CommandInvocation),
            Self::CommandResponse(_) => Some(EventKind::CommandResponse),
            Self::Location(_) => Some(EventKind::Location),
            Self::StateChange(_) => Some(EventKind::StateChange),
            Self::StreamData(_) => Some(EventKind::StreamData),
            Self::Unrecognized { .. } => None,
        }
    }

    /// Name of the kind as it appeared on the wire.
    #[must_use]
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Unrecognized { kind, .. } => kind,
            known => known.kind().map_or("", EventKind::as_str),
        }
    }

    fn from_payload(kind: EventKind, payload: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            EventKind::Measurements => Self::Measurements(serde_json::from_value(payload)?),
            EventKind::Alert => Self::Alert(serde_json::from_value(payload)?),
            EventKind::CommandInvocation => {
                Self::CommandInvocation(serde_json::from_value(payload)?)
            }
            EventKind::CommandResponse => Self::CommandResponse(serde_json::from_value(payload)?),
            EventKind::Location => Self::Location(serde_json::from_value(payload)?),
            EventKind::StateChange => Self::StateChange(serde_json::from_value(payload)?),
            EventKind::StreamData => Self::StreamData(serde_json::from_value(payload)?),
        })
    }

    /// Serialize the payload alone, as stored alongside a persisted event.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which these payload types never produce
    /// in practice.
    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Measurements(r) => serde_json::to_value(r),
            Self::Alert(r) => serde_json::to_value(r),
            Self::CommandInvocation(r) => serde_json::to_value(r),
            Self::CommandResponse(r) => serde_json::to_value(r),
            Self::Location(r) => serde_json::to_value(r),
            Self::StateChange(r) => serde_json::to_value(r),
            Self::StreamData(r) => serde_json::to_value(r),
            Self::Unrecognized { payload, .. } => Ok(payload.clone()),
        }
    }
}

/// Fields common to every event kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    /// When the device observed the event; defaults to the receive time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// A decoded device event scoped to one assignment. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireEnvelope", into = "WireEnvelope")]
pub struct DeviceEventEnvelope {
    pub source_id: String,
    pub assignment_id: AssignmentId,
    pub header: EventHeader,
    pub request: DeviceEventRequest,
}

impl DeviceEventEnvelope {
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        assignment_id: AssignmentId,
        request: DeviceEventRequest,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            assignment_id,
            header: EventHeader::default(),
            request,
        }
    }

    #[must_use]
    pub fn with_header(mut self, header: EventHeader) -> Self {
        self.header = header;
        self
    }

    /// Decode and validate an envelope from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::Decode`] for malformed JSON or a payload
    /// that does not match its kind, and [`TenantHubError::Validation`] for
    /// out-of-range locations.
    pub fn decode(bytes: &[u8]) -> Result<Self, TenantHubError> {
        let envelope: Self = serde_json::from_slice(bytes)?;
        if let DeviceEventRequest::Location(location) = &envelope.request {
            location.validate()?;
        }
        Ok(envelope)
    }

    /// Encode to the JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::Decode`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, TenantHubError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    source_id: String,
    assignment_id: AssignmentId,
    #[serde(flatten)]
    header: EventHeader,
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<WireEnvelope> for DeviceEventEnvelope {
    type Error = serde_json::Error;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        let request = match wire.kind.parse::<EventKind>() {
            Ok(kind) => DeviceEventRequest::from_payload(kind, wire.payload)?,
            Err(_) => DeviceEventRequest::Unrecognized {
                kind: wire.kind,
                payload: wire.payload,
            },
        };
        Ok(Self {
            source_id: wire.source_id,
            assignment_id: wire.assignment_id,
            header: wire.header,
            request,
        })
    }
}

impl From<DeviceEventEnvelope> for WireEnvelope {
    fn from(envelope: DeviceEventEnvelope) -> Self {
        // Payload structs hold only strings, numbers and string-keyed maps.
        let payload = envelope.request.payload().unwrap_or_default();
        Self {
            source_id: envelope.source_id,
            assignment_id: envelope.assignment_id,
            header: envelope.header,
            kind: envelope.request.kind_name().to_string(),
            payload,
        }
    }
}

/// An envelope together with the tenant and assignment it was resolved
/// against, forwarded to downstream processing stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEventEnvelope {
    pub tenant_id: TenantId,
    pub assignment: DeviceAssignment,
    pub envelope: DeviceEventEnvelope,
}

/// A stored event as returned by the delivery API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub id: EventId,
    pub kind: EventKind,
    pub assignment_id: AssignmentId,
    pub event_date: Timestamp,
    pub received_date: Timestamp,
    pub payload: Value,
    pub metadata: BTreeMap<String, String>,
}
