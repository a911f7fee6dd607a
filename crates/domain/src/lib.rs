//! # tenanthub-domain
//!
//! Pure domain model for the tenanthub device-event ingestion core.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, the error taxonomy, timestamps
//! - Define **Tenants** (isolated customer contexts that own a tenant engine)
//! - Define **Device assignments** and the **device streams** attached to them
//! - Define **Device groups** and their indexed elements
//! - Define **Event envelopes** (a closed set of event kinds) and their wire format
//! - Define the **lifecycle** states and operations shared by tenant engines
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod assignment;
pub mod event;
pub mod group;
pub mod lifecycle;
pub mod tenant;
