//! Inbound event processing: consumes decoded device events from the bus,
//! routes each one to the matching delivery operation, and forwards command
//! invocations to the enriched-command-invocations topic.

pub mod blocking;
pub mod completion;
pub mod consumer;
pub mod module;
pub mod producer;
pub mod routing;

pub use blocking::BlockingDeviceEventManagement;
pub use completion::{CompletionHandler, LoggingCompletionHandler};
pub use consumer::{ConsumerSettings, InboundEventsConsumer};
pub use module::{InboundProcessingComponents, InboundProcessingModule};
pub use producer::EnrichedCommandInvocationsProducer;
pub use routing::EventStorageStrategy;

#[cfg(test)]
pub(crate) mod fakes;
