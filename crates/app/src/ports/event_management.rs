//! Event delivery port: the API that persists device events.
//!
//! Every call returns immediately. The outcome is reported later through the
//! [`CompletionObserver`] passed with the request, exactly once: either the
//! implementation calls [`succeed`](CompletionObserver::succeed) /
//! [`fail`](CompletionObserver::fail), or the observer is dropped and reports
//! [`TenantHubError::DeliveryAbandoned`] on its own.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use tenanthub_domain::assignment::DeviceStream;
use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::event::{
    AlertRequest, CommandInvocationRequest, CommandResponseRequest, DeviceEvent, EventHeader,
    EventKind, LocationRequest, MeasurementsRequest, StateChangeRequest, StreamDataRequest,
};
use tenanthub_domain::id::AssignmentId;

/// Asynchronous event delivery, one operation per event kind.
pub trait DeviceEventManagement: Send + Sync {
    fn add_measurements(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: MeasurementsRequest,
        observer: CompletionObserver,
    );

    fn add_alert(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: AlertRequest,
        observer: CompletionObserver,
    );

    fn add_command_invocation(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: CommandInvocationRequest,
        observer: CompletionObserver,
    );

    fn add_command_response(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: CommandResponseRequest,
        observer: CompletionObserver,
    );

    fn add_location(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: LocationRequest,
        observer: CompletionObserver,
    );

    fn add_state_change(
        &self,
        assignment_id: AssignmentId,
        header: EventHeader,
        request: StateChangeRequest,
        observer: CompletionObserver,
    );

    /// Stream data is tied to a stream resolved by the caller.
    fn add_stream_data(
        &self,
        assignment_id: AssignmentId,
        stream: DeviceStream,
        header: EventHeader,
        request: StreamDataRequest,
        observer: CompletionObserver,
    );
}

/// Outcome of one asynchronous delivery, forwarded to a completion handler.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub assignment_id: AssignmentId,
    pub kind: EventKind,
    pub result: Result<DeviceEvent, TenantHubError>,
}

enum Target {
    Forward(mpsc::UnboundedSender<DeliveryOutcome>),
    Reply(oneshot::Sender<Result<DeviceEvent, TenantHubError>>),
}

/// Single-use completion callback for one delivery.
#[must_use = "a dropped observer reports the delivery as abandoned"]
pub struct CompletionObserver {
    assignment_id: AssignmentId,
    kind: EventKind,
    target: Option<Target>,
}

impl CompletionObserver {
    /// Observer whose outcome is forwarded to `outcomes`.
    pub fn forwarding(
        assignment_id: AssignmentId,
        kind: EventKind,
        outcomes: mpsc::UnboundedSender<DeliveryOutcome>,
    ) -> Self {
        Self {
            assignment_id,
            kind,
            target: Some(Target::Forward(outcomes)),
        }
    }

    /// Observer paired with a [`Completion`] the caller can await.
    pub fn reply(assignment_id: AssignmentId, kind: EventKind) -> (Self, Completion) {
        let (sender, receiver) = oneshot::channel();
        let observer = Self {
            assignment_id,
            kind,
            target: Some(Target::Reply(sender)),
        };
        (observer, Completion { receiver })
    }

    #[must_use]
    pub fn assignment_id(&self) -> AssignmentId {
        self.assignment_id
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn succeed(self, event: DeviceEvent) {
        self.complete(Ok(event));
    }

    pub fn fail(self, error: TenantHubError) {
        self.complete(Err(error));
    }

    pub fn complete(mut self, result: Result<DeviceEvent, TenantHubError>) {
        self.finish(result);
    }

    fn finish(&mut self, result: Result<DeviceEvent, TenantHubError>) {
        // A closed receiver means nobody is waiting anymore; the outcome is dropped.
        match self.target.take() {
            Some(Target::Forward(outcomes)) => {
                let _ = outcomes.send(DeliveryOutcome {
                    assignment_id: self.assignment_id,
                    kind: self.kind,
                    result,
                });
            }
            Some(Target::Reply(sender)) => {
                let _ = sender.send(result);
            }
            None => {}
        }
    }
}

impl Drop for CompletionObserver {
    fn drop(&mut self) {
        if self.target.is_some() {
            self.finish(Err(TenantHubError::DeliveryAbandoned));
        }
    }
}

impl std::fmt::Debug for CompletionObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionObserver")
            .field("assignment_id", &self.assignment_id)
            .field("kind", &self.kind)
            .field("pending", &self.target.is_some())
            .finish()
    }
}

/// Awaitable side of [`CompletionObserver::reply`].
#[derive(Debug)]
pub struct Completion {
    receiver: oneshot::Receiver<Result<DeviceEvent, TenantHubError>>,
}

impl Completion {
    /// Wait for the outcome, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the delivery error, [`TenantHubError::DeliveryTimeout`] when
    /// nothing arrives in time, or [`TenantHubError::DeliveryAbandoned`] when
    /// the observer was dropped unfinished.
    pub async fn wait(self, timeout: Duration) -> Result<DeviceEvent, TenantHubError> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TenantHubError::DeliveryAbandoned),
            Err(_) => Err(TenantHubError::DeliveryTimeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tenanthub_domain::error::ErrorKind;
    use tenanthub_domain::id::EventId;
    use tenanthub_domain::time::now;

    use super::*;

    fn stored(assignment_id: AssignmentId) -> DeviceEvent {
        DeviceEvent {
            id: EventId::new(),
            kind: EventKind::StreamData,
            assignment_id,
            event_date: now(),
            received_date: now(),
            payload: serde_json::json!({}),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn should_resolve_completion_when_observer_succeeds() {
        let assignment_id = AssignmentId::new();
        let (observer, completion) = CompletionObserver::reply(assignment_id, EventKind::StreamData);
        let event = stored(assignment_id);
        let event_id = event.id;

        observer.succeed(event);

        let received = completion.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(received.id, event_id);
    }

    #[tokio::test]
    async fn should_report_abandoned_when_observer_dropped() {
        let (observer, completion) =
            CompletionObserver::reply(AssignmentId::new(), EventKind::StreamData);
        drop(observer);

        let err = completion.wait(Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeliveryAbandoned);
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_when_observer_never_completes() {
        let (observer, completion) =
            CompletionObserver::reply(AssignmentId::new(), EventKind::StreamData);

        let err = completion.wait(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeliveryTimeout);
        drop(observer);
    }

    #[tokio::test]
    async fn should_forward_exactly_one_outcome_per_observer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let assignment_id = AssignmentId::new();

        CompletionObserver::forwarding(assignment_id, EventKind::Alert, tx.clone())
            .fail(TenantHubError::DeliveryAbandoned);
        drop(CompletionObserver::forwarding(
            assignment_id,
            EventKind::Location,
            tx,
        ));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::Alert);
        assert!(first.result.is_err());
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, EventKind::Location);
        assert_eq!(
            second.result.unwrap_err().kind(),
            ErrorKind::DeliveryAbandoned
        );
        assert!(rx.recv().await.is_none());
    }
}
