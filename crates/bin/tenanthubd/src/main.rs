//! # tenanthubd — tenanthub daemon
//!
//! Composition root that wires all adapters together and runs one tenant
//! engine per configured tenant.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialize tracing
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct the device management and event delivery adapters
//! - Construct the in-process message bus and the inbound processing module
//! - Activate the configured tenants, then stop them all on ctrl-c
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tenanthub_adapter_storage_sqlite_sqlx::device_management::SqliteDeviceManagement;
use tenanthub_adapter_storage_sqlite_sqlx::event_store::SqliteDeviceEventManagement;
use tenanthub_adapter_storage_sqlite_sqlx::pool;
use tenanthub_app::inbound::InboundProcessingModule;
use tenanthub_app::lifecycle::LoggingProgressMonitor;
use tenanthub_app::message_bus::{DefaultTopicNaming, InProcessMessageBus};
use tenanthub_app::tenant_manager::TenantEngineManager;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    // Database
    let db = pool::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to initialize database")?;
    let db_pool = db.pool().clone();

    // Collaborators
    let device_management = Arc::new(SqliteDeviceManagement::new(db_pool.clone()));
    let event_management = Arc::new(SqliteDeviceEventManagement::new(db_pool));

    // Message bus
    let bus = Arc::new(InProcessMessageBus::new(config.bus.capacity));
    let naming = Arc::new(DefaultTopicNaming::new(config.bus.topic_prefix.clone()));

    // Tenant engines
    let module = InboundProcessingModule::new(
        bus,
        naming,
        device_management,
        event_management,
        config.consumer_settings(),
    );
    let manager = TenantEngineManager::new(Arc::new(module), Arc::new(LoggingProgressMonitor));

    let tenants = config.tenants()?;
    if tenants.is_empty() {
        tracing::warn!("no tenants configured, nothing will be consumed");
    }
    for tenant in tenants {
        let token = tenant.token.clone();
        match manager.activate(tenant).await {
            Ok(state) => tracing::info!(tenant = %token, %state, "tenant activated"),
            Err(error) => tracing::error!(tenant = %token, %error, "tenant activation failed"),
        }
    }

    tracing::info!("tenanthubd running, press ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("shutting down");
    manager.shutdown().await;

    Ok(())
}
