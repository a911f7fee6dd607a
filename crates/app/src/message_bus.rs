//! In-process message bus backed by one tokio broadcast channel per topic.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::tenant::Tenant;

use crate::ports::{BusMessage, LogicalChannel, MessageBus, Subscription, TopicNaming};

/// In-process message bus using tokio [`broadcast`] channels.
///
/// Topics are created lazily on first publish or subscribe. Publishing
/// succeeds even when a topic has no subscriber (the message is dropped).
pub struct InProcessMessageBus {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<BusMessage>>>,
}

impl InProcessMessageBus {
    /// Create a bus whose per-topic channels hold up to `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl MessageBus for InProcessMessageBus {
    type Subscription = InProcessSubscription;

    fn publish(
        &self,
        topic: &str,
        message: BusMessage,
    ) -> impl Future<Output = Result<(), TenantHubError>> + Send {
        // send fails only when the topic has no receiver, which is fine.
        let _ = self.sender(topic).send(message);
        async { Ok(()) }
    }

    fn subscribe(&self, topic: &str) -> InProcessSubscription {
        InProcessSubscription {
            topic: topic.to_string(),
            receiver: self.sender(topic).subscribe(),
        }
    }
}

/// Receiving end of one topic on an [`InProcessMessageBus`].
pub struct InProcessSubscription {
    topic: String,
    receiver: broadcast::Receiver<BusMessage>,
}

impl Subscription for InProcessSubscription {
    async fn next(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "subscriber lagged, messages dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Topic naming of the form `{prefix}.tenant.{token}.{channel}`.
#[derive(Debug, Clone)]
pub struct DefaultTopicNaming {
    prefix: String,
}

impl DefaultTopicNaming {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for DefaultTopicNaming {
    fn default() -> Self {
        Self::new("tenanthub")
    }
}

impl TopicNaming for DefaultTopicNaming {
    fn resolve_topic(&self, tenant: &Tenant, channel: LogicalChannel) -> String {
        format!("{}.tenant.{}.{}", self.prefix, tenant.token, channel)
    }
}
