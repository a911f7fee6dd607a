//! Synchronous wrapper over the asynchronous delivery API.

use std::time::Duration;

use tenanthub_domain::assignment::DeviceStream;
use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::event::{DeviceEvent, EventHeader, EventKind, StreamDataRequest};
use tenanthub_domain::id::AssignmentId;

use crate::ports::{CompletionObserver, DeviceEventManagement};

/// Waits for the completion of a delivery instead of observing it.
///
/// Used for stream data, whose chunks must be stored before the next chunk
/// of the same assignment is processed.
pub struct BlockingDeviceEventManagement<'a, EM: ?Sized> {
    inner: &'a EM,
    timeout: Duration,
}

impl<'a, EM: DeviceEventManagement + ?Sized> BlockingDeviceEventManagement<'a, EM> {
    pub fn new(inner: &'a EM, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Submit stream data and wait for it to be stored.
    ///
    /// # Errors
    ///
    /// Returns the delivery error, [`TenantHubError::DeliveryTimeout`] after
    /// the configured timeout, or [`TenantHubError::DeliveryAbandoned`] if the
    /// implementation dropped the observer.
    pub async fn add_stream_data(
        &self,
        assignment_id: AssignmentId,
        stream: DeviceStream,
        header: EventHeader,
        request: StreamDataRequest,
    ) -> Result<DeviceEvent, TenantHubError> {
        let (observer, completion) = CompletionObserver::reply(assignment_id, EventKind::StreamData);
        self.inner
            .add_stream_data(assignment_id, stream, header, request, observer);
        completion.wait(self.timeout).await
    }
}
