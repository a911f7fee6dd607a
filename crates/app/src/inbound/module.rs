//! Tenant engine module for inbound processing.

use std::sync::Arc;

use tenanthub_domain::error::TenantHubError;
use tenanthub_domain::tenant::Tenant;

use super::{
    CompletionHandler, ConsumerSettings, EnrichedCommandInvocationsProducer, InboundEventsConsumer,
    LoggingCompletionHandler,
};
use crate::lifecycle::LifecycleComponent;
use crate::ports::{DeviceEventManagement, DeviceManagement, MessageBus, TopicNaming};
use crate::tenant_engine::{TenantComponents, TenantEngineModule};

/// Builds the inbound processing components of each tenant engine.
pub struct InboundProcessingModule<B, DM, EM> {
    bus: Arc<B>,
    naming: Arc<dyn TopicNaming>,
    device_management: Arc<DM>,
    event_management: Arc<EM>,
    completion_handler: Arc<dyn CompletionHandler>,
    settings: ConsumerSettings,
}

impl<B, DM, EM> InboundProcessingModule<B, DM, EM> {
    pub fn new(
        bus: Arc<B>,
        naming: Arc<dyn TopicNaming>,
        device_management: Arc<DM>,
        event_management: Arc<EM>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            bus,
            naming,
            device_management,
            event_management,
            completion_handler: Arc::new(LoggingCompletionHandler),
            settings,
        }
    }

    /// Replace the default [`LoggingCompletionHandler`].
    #[must_use]
    pub fn with_completion_handler(mut self, handler: Arc<dyn CompletionHandler>) -> Self {
        self.completion_handler = handler;
        self
    }
}

/// Components of one tenant's inbound processing.
pub struct InboundProcessingComponents<B: MessageBus, DM, EM> {
    producer: Arc<EnrichedCommandInvocationsProducer<B>>,
    consumer: Arc<InboundEventsConsumer<B, DM, EM>>,
}

impl<B: MessageBus, DM, EM> InboundProcessingComponents<B, DM, EM> {
    #[must_use]
    pub fn producer(&self) -> &Arc<EnrichedCommandInvocationsProducer<B>> {
        &self.producer
    }

    #[must_use]
    pub fn consumer(&self) -> &Arc<InboundEventsConsumer<B, DM, EM>> {
        &self.consumer
    }
}

impl<B, DM, EM> TenantComponents for InboundProcessingComponents<B, DM, EM>
where
    B: MessageBus,
    DM: DeviceManagement + 'static,
    EM: DeviceEventManagement + 'static,
{
    /// The consumer forwards through the producer, so the producer comes first.
    fn lifecycle_components(&self) -> Vec<Arc<dyn LifecycleComponent>> {
        vec![
            Arc::clone(&self.producer) as Arc<dyn LifecycleComponent>,
            Arc::clone(&self.consumer) as Arc<dyn LifecycleComponent>,
        ]
    }
}

impl<B, DM, EM> TenantEngineModule for InboundProcessingModule<B, DM, EM>
where
    B: MessageBus,
    DM: DeviceManagement + 'static,
    EM: DeviceEventManagement + 'static,
{
    type Components = InboundProcessingComponents<B, DM, EM>;

    fn name(&self) -> &'static str {
        "inbound-processing"
    }

    fn create_components(&self, tenant: &Tenant) -> Result<Self::Components, TenantHubError> {
        self.settings.validate()?;
        let producer = Arc::new(EnrichedCommandInvocationsProducer::new(
            tenant.clone(),
            Arc::clone(&self.bus),
            Arc::clone(&self.naming),
        ));
        let consumer = Arc::new(InboundEventsConsumer::new(
            tenant.clone(),
            Arc::clone(&self.bus),
            Arc::clone(&self.naming),
            Arc::clone(&self.device_management),
            Arc::clone(&self.event_management),
            Arc::clone(&producer),
            Arc::clone(&self.completion_handler),
            self.settings.clone(),
        ));
        Ok(InboundProcessingComponents { producer, consumer })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tenanthub_domain::error::ErrorKind;
    use tenanthub_domain::event::{DeviceEventEnvelope, DeviceEventRequest, EventKind};
    use tenanthub_domain::id::AssignmentId;
    use tenanthub_domain::lifecycle::LifecycleState;

    use super::*;
    use crate::inbound::fakes::{
        Behavior, InMemoryDeviceManagement, RecordingEventManagement, command, measurements,
    };
    use crate::lifecycle::LoggingProgressMonitor;
    use crate::message_bus::{DefaultTopicNaming, InProcessMessageBus};
    use crate::ports::{BusMessage, DeliveryOutcome, Subscription};
    use crate::tenant_engine::TenantEngine;

    type Module =
        InboundProcessingModule<InProcessMessageBus, InMemoryDeviceManagement, RecordingEventManagement>;

    fn module(bus: &Arc<InProcessMessageBus>, devices: &Arc<InMemoryDeviceManagement>) -> Module {
        InboundProcessingModule::new(
            Arc::clone(bus),
            Arc::new(DefaultTopicNaming::new("test")),
            Arc::clone(devices),
            Arc::new(RecordingEventManagement::new(Behavior::Succeed)),
            ConsumerSettings::default(),
        )
    }

    #[test]
    fn should_order_producer_before_consumer() {
        let bus = Arc::new(InProcessMessageBus::new(8));
        let devices = Arc::new(InMemoryDeviceManagement::default());
        let components = module(&bus, &devices)
            .create_components(&Tenant::new("acme", "Acme").unwrap())
            .unwrap();

        let names: Vec<String> = components
            .lifecycle_components()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["enriched-command-invocations-producer", "inbound-events-consumer"]
        );
    }

    #[test]
    fn should_reject_invalid_settings_when_creating_components() {
        let bus = Arc::new(InProcessMessageBus::new(8));
        let devices = Arc::new(InMemoryDeviceManagement::default());
        let module = InboundProcessingModule::new(
            bus,
            Arc::new(DefaultTopicNaming::new("test")),
            devices,
            Arc::new(RecordingEventManagement::new(Behavior::Succeed)),
            ConsumerSettings {
                queue_depth: 0,
                ..ConsumerSettings::default()
            },
        );

        assert!(
            module
                .create_components(&Tenant::new("acme", "Acme").unwrap())
                .is_err()
        );
    }

    #[tokio::test]
    async fn should_route_command_invocation_through_started_engine() {
        let bus = Arc::new(InProcessMessageBus::new(32));
        let devices = Arc::new(InMemoryDeviceManagement::default());
        let assignment = devices.add_assignment("truck-1");
        let mut engine = TenantEngine::new(
            Tenant::new("acme", "Acme").unwrap(),
            Arc::new(module(&bus, &devices)),
        );
        let monitor = LoggingProgressMonitor;
        engine.initialize(&monitor).await.unwrap();
        engine.start(&monitor).await.unwrap();
        assert_eq!(engine.state(), LifecycleState::Started);

        let components = engine.components().unwrap();
        let mut forwarded = bus.subscribe(components.producer().target_topic().unwrap());
        let envelope = DeviceEventEnvelope::new(
            "gateway",
            assignment.id,
            DeviceEventRequest::CommandInvocation(command("reboot")),
        );
        bus.publish(
            components.consumer().source_topic().unwrap(),
            BusMessage::new(assignment.id.to_string(), envelope.encode().unwrap()),
        )
        .await
        .unwrap();

        let message = forwarded.next().await.unwrap();
        assert_eq!(message.key, assignment.id.to_string());

        engine.stop(&monitor).await.unwrap();
        assert_eq!(engine.state(), LifecycleState::Stopped);
    }

    #[derive(Default)]
    struct FailureCollector(Mutex<Vec<(AssignmentId, EventKind, ErrorKind)>>);

    impl CompletionHandler for FailureCollector {
        fn handle(&self, outcome: DeliveryOutcome) {
            if let Err(error) = outcome.result {
                self.0
                    .lock()
                    .unwrap()
                    .push((outcome.assignment_id, outcome.kind, error.kind()));
            }
        }
    }

    #[tokio::test]
    async fn should_hand_async_delivery_failures_to_custom_completion_handler() {
        let bus = Arc::new(InProcessMessageBus::new(32));
        let devices = Arc::new(InMemoryDeviceManagement::default());
        let assignment = devices.add_assignment("truck-1");
        let collector = Arc::new(FailureCollector::default());
        let module = InboundProcessingModule::new(
            Arc::clone(&bus),
            Arc::new(DefaultTopicNaming::new("test")),
            Arc::clone(&devices),
            Arc::new(RecordingEventManagement::new(Behavior::Fail)),
            ConsumerSettings::default(),
        )
        .with_completion_handler(Arc::clone(&collector) as Arc<dyn CompletionHandler>);
        let mut engine = TenantEngine::new(Tenant::new("acme", "Acme").unwrap(), Arc::new(module));
        let monitor = LoggingProgressMonitor;
        engine.initialize(&monitor).await.unwrap();
        engine.start(&monitor).await.unwrap();

        let envelope = DeviceEventEnvelope::new(
            "gateway",
            assignment.id,
            DeviceEventRequest::Measurements(measurements("rpm", 1200.0)),
        );
        let topic = engine.components().unwrap().consumer().source_topic().unwrap().to_string();
        bus.publish(
            &topic,
            BusMessage::new(assignment.id.to_string(), envelope.encode().unwrap()),
        )
        .await
        .unwrap();

        let failures = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let failures = collector.0.lock().unwrap().clone();
                if !failures.is_empty() {
                    return failures;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(
            failures,
            vec![(assignment.id, EventKind::Measurements, ErrorKind::Storage)]
        );

        engine.stop(&monitor).await.unwrap();
    }
}
