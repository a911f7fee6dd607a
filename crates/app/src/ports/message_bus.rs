//! Message bus port: keyed publish/subscribe on named topics.

use std::fmt;
use std::future::Future;

use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::tenant::Tenant;

/// A keyed message on the bus.
///
/// Messages that share a key are processed in publish order by the inbound
/// consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub key: String,
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }
}

/// Stream of messages from one topic.
pub trait Subscription: Send + 'static {
    /// Wait for the next message, or `None` once the topic is closed.
    fn next(&mut self) -> impl Future<Output = Option<BusMessage>> + Send;
}

/// A topic-based bus.
///
/// A subscription only receives messages published after it was created.
pub trait MessageBus: Send + Sync + 'static {
    type Subscription: Subscription;

    /// Publish a message to `topic`. Succeeds when nobody is subscribed.
    fn publish(
        &self,
        topic: &str,
        message: BusMessage,
    ) -> impl Future<Output = Result<(), TenantHubError>> + Send;

    /// Subscribe to `topic`.
    fn subscribe(&self, topic: &str) -> Self::Subscription;
}

/// Logical channels a tenant engine reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalChannel {
    /// Decoded device events waiting to be stored.
    DecodedEvents,
    /// Command invocations enriched with their assignment, for command delivery.
    EnrichedCommandInvocations,
}

impl LogicalChannel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DecodedEvents => "inbound-decoded-events",
            Self::EnrichedCommandInvocations => "inbound-enriched-command-invocations",
        }
    }
}

impl fmt::Display for LogicalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a tenant and a logical channel to a concrete topic name.
pub trait TopicNaming: Send + Sync {
    fn resolve_topic(&self, tenant: &Tenant, channel: LogicalChannel) -> String;
}
