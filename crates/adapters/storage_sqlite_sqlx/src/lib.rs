//! # tenanthub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the port traits defined in `tenanthub-app::ports`:
//!   `DeviceGroupRepository`, `DeviceManagement` and `DeviceEventManagement`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `tenanthub-app` (for port traits) and `tenanthub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod device_management;
pub mod error;
pub mod event_store;
pub mod group_repo;
pub mod pool;

mod codec;
