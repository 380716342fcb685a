//! Orbital Core service entry point: loads configuration, wires the
//! SQLite adapters, the Schedule Scanner/Dispatcher, the actor hierarchy,
//! and the HTTP API, then runs until terminated.

use std::sync::Arc;

use anyhow::{Context, Result};
use orbital_core::adapters::connectors::{HttpConnector, MockConnector};
use orbital_core::adapters::memory::InMemoryMessageBroker;
use orbital_core::adapters::sqlite::{initialize_database, SqliteControlSignalStore, SqliteReferenceRegistry, SqliteScheduleStore};
use orbital_core::actors::RouterActor;
use orbital_core::domain::ports::{OperationClassifier, RuleBasedClassifier, SingleStepPlanner, TaskPlanner};
use orbital_core::http::{build_router, AppState};
use orbital_core::infrastructure::config::ConfigLoader;
use orbital_core::infrastructure::logging::LoggerImpl;
use orbital_core::services::{
    CapabilityRegistry, CronAlignmentLoop, EventBus, LocalExecutorNotifier, ScheduleDispatcher, ScheduleScanner, SchedulerService,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    let _logger = LoggerImpl::init(&config.logging).context("failed to initialize logger")?;

    info!(tenant_id = %config.tenant_id, node_id = %config.node_id, "starting orbital-core");

    let pool = initialize_database(&config.database.path).await.context("failed to initialize database")?;

    let store: Arc<dyn orbital_core::domain::ports::ScheduleStore> = Arc::new(SqliteScheduleStore::new(pool.clone()));
    let registry: Arc<dyn orbital_core::domain::ports::ReferenceRegistry> = Arc::new(SqliteReferenceRegistry::new(pool.clone()));
    let signals: Arc<dyn orbital_core::domain::ports::ControlSignalStore> = Arc::new(SqliteControlSignalStore::new(pool.clone()));
    let broker: Arc<dyn orbital_core::domain::ports::MessageBroker> = Arc::new(InMemoryMessageBroker::new());

    let mut capabilities = CapabilityRegistry::new();
    capabilities.register("http", Arc::new(HttpConnector::new()));
    capabilities.register("mock", Arc::new(MockConnector));
    let capabilities = Arc::new(capabilities);

    let events = Arc::new(EventBus::new());
    let planner: Arc<dyn TaskPlanner> = Arc::new(SingleStepPlanner);
    let classifier: Arc<dyn OperationClassifier> = Arc::new(RuleBasedClassifier);

    let router = RouterActor::spawn(
        Arc::clone(&registry),
        config.registry.default_ttl_secs,
        planner,
        classifier,
        Arc::clone(&capabilities),
        Arc::clone(&events),
        Arc::clone(&signals),
    );

    let scheduler = Arc::new(SchedulerService::new(Arc::clone(&store)));
    let notifier = Arc::new(LocalExecutorNotifier::new(router, Arc::clone(&store), Arc::clone(&broker), config.node_id.clone()));

    let dispatcher = Arc::new(ScheduleDispatcher::new(
        Arc::clone(&store),
        Arc::clone(&broker),
        Arc::clone(&scheduler),
        notifier,
        Arc::clone(&events),
    ));
    tokio::spawn(Arc::clone(&dispatcher).run_forever());

    let scanner = Arc::new(ScheduleScanner::new(
        Arc::clone(&store),
        Arc::clone(&broker),
        Arc::clone(&events),
        std::time::Duration::from_secs(config.scheduler.scan_interval_secs),
    ));
    tokio::spawn(async move { scanner.run_forever().await });

    let cron_loop = Arc::new(CronAlignmentLoop::new(Arc::clone(&store), Arc::clone(&scheduler), config.scheduler.cron_backfill_window_days));
    tokio::spawn(async move { cron_loop.run_forever().await });

    let state = AppState {
        store,
        scheduler,
        signals,
        tenant_id: config.tenant_id.clone(),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.http.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http.bind_addr))?;
    info!(addr = %config.http.bind_addr, "http api listening");

    axum::serve(listener, app).await.context("http server failed")?;
    Ok(())
}
