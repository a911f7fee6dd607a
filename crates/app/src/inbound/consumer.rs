//! Inbound events consumer.
//!
//! A dispatcher task reads the tenant's decoded-events topic and hands each
//! message to one of `workers` partition tasks, chosen by hashing the message
//! key. Messages sharing a key therefore land on the same partition and are
//! processed in publish order; different keys proceed in parallel.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tenanthub_domain::error::{NotFoundError, TenantHubError, ValidationError};
use tenanthub_domain::event::{DeviceEventEnvelope, DeviceEventRequest, EnrichedEventEnvelope};
use tenanthub_domain::tenant::Tenant;

use super::completion::{CompletionHandler, drain_outcomes};
use super::{EnrichedCommandInvocationsProducer, EventStorageStrategy};
use crate::lifecycle::{LifecycleComponent, LifecycleFuture, ProgressMonitor};
use crate::ports::{
    BusMessage, DeviceEventManagement, DeviceManagement, LogicalChannel, MessageBus, Subscription,
    TopicNaming,
};

const NAME: &str = "inbound-events-consumer";

/// Tuning of an [`InboundEventsConsumer`].
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Number of partition workers.
    pub workers: usize,
    /// Messages buffered per partition before the dispatcher waits.
    pub queue_depth: usize,
    /// Bound on the synchronous stream data delivery.
    pub stream_data_timeout: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 64,
            stream_data_timeout: Duration::from_secs(10),
        }
    }
}

impl ConsumerSettings {
    /// # Errors
    ///
    /// Returns [`ValidationError::NotPositive`] for a zero field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::NotPositive { field: "workers" });
        }
        if self.queue_depth == 0 {
            return Err(ValidationError::NotPositive {
                field: "queue_depth",
            });
        }
        if self.stream_data_timeout.is_zero() {
            return Err(ValidationError::NotPositive {
                field: "stream_data_timeout",
            });
        }
        Ok(())
    }
}

/// Per-message processing shared by all partition workers.
struct Pipeline<B, DM, EM> {
    tenant: Tenant,
    device_management: Arc<DM>,
    strategy: EventStorageStrategy<DM, EM>,
    producer: Arc<EnrichedCommandInvocationsProducer<B>>,
}

impl<B, DM, EM> Pipeline<B, DM, EM>
where
    B: MessageBus,
    DM: DeviceManagement,
    EM: DeviceEventManagement,
{
    async fn process(&self, message: &BusMessage) -> Result<(), TenantHubError> {
        let envelope = DeviceEventEnvelope::decode(&message.payload)?;
        let assignment = self
            .device_management
            .get_device_assignment(envelope.assignment_id)
            .await?
            .ok_or_else(|| NotFoundError {
                entity: "DeviceAssignment",
                id: envelope.assignment_id.to_string(),
            })?;

        self.strategy.store_device_event(&assignment, &envelope).await?;

        if matches!(envelope.request, DeviceEventRequest::CommandInvocation(_)) {
            let enriched = EnrichedEventEnvelope {
                tenant_id: self.tenant.id,
                assignment,
                envelope,
            };
            self.producer.send(&enriched).await?;
        }
        Ok(())
    }
}

struct Workers {
    shutdown: CancellationToken,
    dispatcher: JoinHandle<()>,
    partitions: Vec<JoinHandle<()>>,
    completions: JoinHandle<()>,
}

/// Consumes the tenant's decoded-events topic and stores each event.
///
/// Command invocations are additionally forwarded through the
/// [`EnrichedCommandInvocationsProducer`] once stored.
pub struct InboundEventsConsumer<B: MessageBus, DM, EM> {
    tenant: Tenant,
    bus: Arc<B>,
    naming: Arc<dyn TopicNaming>,
    device_management: Arc<DM>,
    event_management: Arc<EM>,
    producer: Arc<EnrichedCommandInvocationsProducer<B>>,
    completion_handler: Arc<dyn CompletionHandler>,
    settings: ConsumerSettings,
    topic: OnceLock<String>,
    workers: Mutex<Option<Workers>>,
}

impl<B, DM, EM> InboundEventsConsumer<B, DM, EM>
where
    B: MessageBus,
    DM: DeviceManagement + 'static,
    EM: DeviceEventManagement + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant: Tenant,
        bus: Arc<B>,
        naming: Arc<dyn TopicNaming>,
        device_management: Arc<DM>,
        event_management: Arc<EM>,
        producer: Arc<EnrichedCommandInvocationsProducer<B>>,
        completion_handler: Arc<dyn CompletionHandler>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            tenant,
            bus,
            naming,
            device_management,
            event_management,
            producer,
            completion_handler,
            settings,
            topic: OnceLock::new(),
            workers: Mutex::new(None),
        }
    }

    /// Topic this consumer reads from, once initialized.
    #[must_use]
    pub fn source_topic(&self) -> Option<&str> {
        self.topic.get().map(String::as_str)
    }

    #[must_use]
    pub fn producer(&self) -> &Arc<EnrichedCommandInvocationsProducer<B>> {
        &self.producer
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn spawn_workers(&self, topic: &str) -> Workers {
        let (outcomes, outcome_rx) = mpsc::unbounded_channel();
        let completions = tokio::spawn(drain_outcomes(
            outcome_rx,
            Arc::clone(&self.completion_handler),
        ));

        let pipeline = Arc::new(Pipeline {
            tenant: self.tenant.clone(),
            device_management: Arc::clone(&self.device_management),
            strategy: EventStorageStrategy::new(
                Arc::clone(&self.device_management),
                Arc::clone(&self.event_management),
                outcomes,
                self.settings.stream_data_timeout,
            ),
            producer: Arc::clone(&self.producer),
        });

        let mut inboxes = Vec::with_capacity(self.settings.workers);
        let mut partitions = Vec::with_capacity(self.settings.workers);
        for partition in 0..self.settings.workers {
            let (tx, rx) = mpsc::channel(self.settings.queue_depth);
            inboxes.push(tx);
            partitions.push(tokio::spawn(run_partition(
                Arc::clone(&pipeline),
                partition,
                rx,
            )));
        }

        let shutdown = CancellationToken::new();
        let subscription = self.bus.subscribe(topic);
        let dispatcher = tokio::spawn(dispatch(
            self.tenant.token.clone(),
            subscription,
            inboxes,
            shutdown.clone(),
        ));

        Workers {
            shutdown,
            dispatcher,
            partitions,
            completions,
        }
    }
}

impl<B, DM, EM> LifecycleComponent for InboundEventsConsumer<B, DM, EM>
where
    B: MessageBus,
    DM: DeviceManagement + 'static,
    EM: DeviceEventManagement + 'static,
{
    fn name(&self) -> &str {
        NAME
    }

    fn initialize<'a>(&'a self, _monitor: &'a dyn ProgressMonitor) -> LifecycleFuture<'a> {
        Box::pin(async move {
            self.settings.validate()?;
            let topic = self
                .topic
                .get_or_init(|| self.naming.resolve_topic(&self.tenant, LogicalChannel::DecodedEvents));
            tracing::info!(
                tenant = %self.tenant.token,
                topic,
                workers = self.settings.workers,
                "consumer initialized"
            );
            Ok(())
        })
    }

    fn start<'a>(&'a self, _monitor: &'a dyn ProgressMonitor) -> LifecycleFuture<'a> {
        Box::pin(async move {
            let topic = self.topic.get().ok_or_else(|| TenantHubError::not_ready(NAME))?;
            let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            if workers.is_none() {
                *workers = Some(self.spawn_workers(topic));
                tracing::info!(tenant = %self.tenant.token, topic, "consumer started");
            }
            Ok(())
        })
    }

    fn stop<'a>(&'a self, _monitor: &'a dyn ProgressMonitor) -> LifecycleFuture<'a> {
        Box::pin(async move {
            let workers = self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            let Some(workers) = workers else {
                return Ok(());
            };

            // The dispatcher exits between two messages and drops the
            // partition senders, so every partition drains what it already
            // holds and then exits. The completion task ends once the last
            // pipeline is gone.
            workers.shutdown.cancel();
            if let Err(error) = workers.dispatcher.await {
                tracing::warn!(tenant = %self.tenant.token, %error, "dispatcher ended abnormally");
            }
            for handle in workers.partitions {
                if let Err(error) = handle.await {
                    tracing::warn!(tenant = %self.tenant.token, %error, "partition worker ended abnormally");
                }
            }
            if let Err(error) = workers.completions.await {
                tracing::warn!(tenant = %self.tenant.token, %error, "completion task ended abnormally");
            }
            tracing::info!(tenant = %self.tenant.token, "consumer stopped");
            Ok(())
        })
    }
}

fn partition_for(key: &str, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let partitions = u64::try_from(partitions).unwrap_or(u64::MAX);
    // the remainder is below `partitions`, which came from a usize
    usize::try_from(hasher.finish() % partitions).unwrap_or_default()
}

/// Route each message to its partition until `shutdown` is cancelled or the
/// topic closes.
///
/// A partition whose worker is gone loses its messages; the others keep
/// being served.
async fn dispatch<S: Subscription>(
    tenant: String,
    mut subscription: S,
    inboxes: Vec<mpsc::Sender<BusMessage>>,
    shutdown: CancellationToken,
) {
    let mut dead = vec![false; inboxes.len()];
    loop {
        let message = tokio::select! {
            () = shutdown.cancelled() => break,
            next = subscription.next() => match next {
                Some(message) => message,
                None => {
                    tracing::debug!(tenant = %tenant, "subscription closed");
                    break;
                }
            },
        };
        let partition = partition_for(&message.key, inboxes.len());
        if let Err(mpsc::error::SendError(message)) = inboxes[partition].send(message).await {
            if dead[partition] {
                tracing::debug!(tenant = %tenant, partition, key = %message.key, "dropped message of dead partition");
            } else {
                dead[partition] = true;
                tracing::error!(
                    tenant = %tenant,
                    partition,
                    key = %message.key,
                    "partition worker is gone, its messages are dropped"
                );
            }
        }
    }
}

async fn run_partition<B, DM, EM>(
    pipeline: Arc<Pipeline<B, DM, EM>>,
    partition: usize,
    mut inbox: mpsc::Receiver<BusMessage>,
) where
    B: MessageBus,
    DM: DeviceManagement,
    EM: DeviceEventManagement,
{
    while let Some(message) = inbox.recv().await {
        if let Err(error) = pipeline.process(&message).await {
            tracing::warn!(
                tenant = %pipeline.tenant.token,
                partition,
                key = %message.key,
                %error,
                "failed to process inbound event"
            );
        }
    }
}
