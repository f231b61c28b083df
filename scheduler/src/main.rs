// Scheduler binary entry point

use common::config::Settings;
use common::content::HttpContentService;
use common::correlator::{LogWorkflowNotifier, WorkflowCorrelator};
use common::db::DbPool;
use common::executor::TransitionExecutor;
use common::retry::ExponentialBackoff;
use common::scheduler::{Scheduler, SchedulerEngine};
use common::store::{PostgresScheduleStore, ScheduleStore};
use common::telemetry;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({}), using defaults", e);
        Settings::default()
    });
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // Structured logging and metrics
    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;
    telemetry::init_metrics(settings.observability.metrics_port)?;

    info!("Starting publish scheduler");

    // Schedule entry store
    info!("Initializing database connection pool");
    let db_pool = DbPool::new(&settings.database).await.map_err(|e| {
        error!(error = %e, "Failed to initialize database pool");
        anyhow::anyhow!(e)
    })?;

    let store = PostgresScheduleStore::new(db_pool.clone(), settings.store.on_conflict);
    store.migrate().await.map_err(|e| {
        error!(error = %e, "Failed to run store migrations");
        anyhow::anyhow!(e)
    })?;
    let store: Arc<dyn ScheduleStore> = Arc::new(store);
    info!("Schedule entry store initialized");

    // Content store client
    let content = Arc::new(
        HttpContentService::new(&settings.content)
            .map_err(|e| anyhow::anyhow!("Failed to create content service client: {}", e))?,
    );
    info!(base_url = %settings.content.base_url, "Content service client initialized");

    // Workflow correlator with the default log notifier
    let correlator = Arc::new(WorkflowCorrelator::new(
        Arc::clone(&store),
        Arc::new(LogWorkflowNotifier),
    ));

    // Transition executor with bounded backoff for transient failures
    let retry_strategy = Arc::new(ExponentialBackoff::with_config(
        settings.executor.retry_base_delay_ms,
        settings.executor.retry_max_delay_ms,
        settings.executor.max_transient_attempts,
    ));
    let executor = Arc::new(TransitionExecutor::new(
        Arc::clone(&store),
        content,
        correlator,
        retry_strategy,
    ));

    // Scheduler engine
    let engine = Arc::new(SchedulerEngine::new(
        settings.scheduler.clone(),
        store,
        executor,
    ));
    info!("Scheduler engine created");

    // Graceful shutdown on Ctrl+C
    let engine_for_shutdown = Arc::clone(&engine);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C signal, initiating graceful shutdown");
        if let Err(e) = engine_for_shutdown.stop().await {
            error!(error = %e, "Error during scheduler shutdown");
        }
    });

    info!("Starting scheduler polling loop");
    if let Err(e) = engine.start().await {
        error!(error = %e, "Scheduler error");
        return Err(anyhow::anyhow!(e));
    }

    db_pool.close().await;
    telemetry::shutdown_tracer();
    info!("Scheduler stopped");
    Ok(())
}
