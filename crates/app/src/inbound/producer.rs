//! Producer for enriched command invocations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::event::EnrichedEventEnvelope;
use tenanthub_domain::tenant::Tenant;

use crate::lifecycle::{LifecycleComponent, LifecycleFuture, ProgressMonitor};
use crate::ports::{BusMessage, LogicalChannel, MessageBus, TopicNaming};

const NAME: &str = "enriched-command-invocations-producer";

/// Publishes command invocations, enriched with their assignment, to the
/// tenant's enriched-command-invocations topic.
///
/// The target topic is resolved during `initialize`; `send` is only
/// accepted between `start` and `stop`.
pub struct EnrichedCommandInvocationsProducer<B> {
    tenant: Tenant,
    bus: Arc<B>,
    naming: Arc<dyn TopicNaming>,
    topic: OnceLock<String>,
    running: AtomicBool,
}

impl<B: MessageBus> EnrichedCommandInvocationsProducer<B> {
    pub fn new(tenant: Tenant, bus: Arc<B>, naming: Arc<dyn TopicNaming>) -> Self {
        Self {
            tenant,
            bus,
            naming,
            topic: OnceLock::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Topic messages are published to, once initialized.
    #[must_use]
    pub fn target_topic(&self) -> Option<&str> {
        self.topic.get().map(String::as_str)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Publish `enriched`, keyed by its assignment id.
    ///
    /// # Errors
    ///
    /// Returns [`TenantHubError::ComponentNotReady`] when the producer is not
    /// started, or the bus error.
    #[tracing::instrument(skip_all, fields(tenant = %self.tenant.token, assignment = %enriched.assignment.id))]
    pub async fn send(&self, enriched: &EnrichedEventEnvelope) -> Result<(), TenantHubError> {
        let topic = self
            .topic
            .get()
            .filter(|_| self.is_running())
            .ok_or_else(|| TenantHubError::not_ready(NAME))?;
        let payload = serde_json::to_vec(enriched)?;
        self.bus
            .publish(topic, BusMessage::new(enriched.assignment.id.to_string(), payload))
            .await?;
        tracing::debug!(topic, "forwarded enriched command invocation");
        Ok(())
    }
}

impl<B: MessageBus> LifecycleComponent for EnrichedCommandInvocationsProducer<B> {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize<'a>(&'a self, _monitor: &'a dyn ProgressMonitor) -> LifecycleFuture<'a> {
        Box::pin(async move {
            let topic = self.topic.get_or_init(|| {
                self.naming
                    .resolve_topic(&self.tenant, LogicalChannel::EnrichedCommandInvocations)
            });
            tracing::info!(tenant = %self.tenant.token, topic, "producer initialized");
            Ok(())
        })
    }

    fn start<'a>(&'a self, _monitor: &'a dyn ProgressMonitor) -> LifecycleFuture<'a> {
        Box::pin(async move {
            if self.topic.get().is_none() {
                return Err(TenantHubError::not_ready(NAME));
            }
            self.running.store(true, Ordering::Release);
            Ok(())
        })
    }

    fn stop<'a>(&'a self, _monitor: &'a dyn ProgressMonitor) -> LifecycleFuture<'a> {
        Box::pin(async move {
            self.running.store(false, Ordering::Release);
            Ok(())
        })
    }
}
