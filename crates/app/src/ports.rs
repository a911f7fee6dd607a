//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod device_management;
pub mod event_management;
pub mod message_bus;
pub mod storage;

pub use device_management::DeviceManagement;
pub use event_management::{Completion, CompletionObserver, DeliveryOutcome, DeviceEventManagement};
pub use message_bus::{BusMessage, LogicalChannel, MessageBus, Subscription, TopicNaming};
pub use storage::DeviceGroupRepository;
