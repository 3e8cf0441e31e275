//! VolunteerHub service
//!
//! Main application entry point

use std::sync::Arc;
use anyhow::Context;
use tracing::{info, warn};

use VolunteerHub::{
    config::Settings,
    utils::logging,
    database::{DatabaseService, PoolOptions, create_pool, run_migrations},
    services::{ServiceFactory, StaticIdentityProvider},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("failed to load settings")?;
    settings.validate()?;

    // Initialize logging
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", VolunteerHub::info());

    // Initialize database connection
    info!("Connecting to database...");
    let db_pool = create_pool(&PoolOptions::from(&settings.database)).await?;

    // Run database migrations
    run_migrations(&db_pool).await?;

    // Initialize services
    info!("Initializing services...");
    let store = Arc::new(DatabaseService::new(db_pool));
    let identity = Arc::new(StaticIdentityProvider::new());
    let services = ServiceFactory::new(store, &settings, identity)?;

    let mut reconciler = services.reconciler();
    if settings.reconciler.enabled {
        reconciler.start();
    } else {
        warn!("Status reconciler disabled by configuration");
    }

    info!("VolunteerHub is ready");

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;

    reconciler.stop();
    info!("VolunteerHub has been shut down.");

    Ok(())
}
