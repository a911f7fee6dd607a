//! # tenanthub-app
//!
//! Application layer — use-cases, lifecycle orchestration and **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceManagement`: assignment and stream lookups
//!   - `DeviceEventManagement`: the event delivery API, one call per event kind
//!   - `DeviceGroupRepository`: group persistence and the atomic index counter
//!   - `MessageBus` / `TopicNaming`: bus endpoints and tenant-scoped topic names
//! - Provide the **lifecycle** primitives: the component capability, progress
//!   reporting and composite steps
//! - Provide the **tenant engine** (one per active tenant) and the manager
//!   that creates and tears engines down
//! - Provide the **inbound processing** module: consumer, producer and the
//!   event routing strategy
//! - Provide **in-process infrastructure** (message bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `tenanthub-domain` only (plus `tokio` for tasks and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod inbound;
pub mod lifecycle;
pub mod message_bus;
pub mod ports;
pub mod services;
pub mod tenant_engine;
pub mod tenant_manager;
