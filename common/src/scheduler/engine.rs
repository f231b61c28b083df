// Scheduler engine implementation

use crate::config::SchedulerConfig;
use crate::executor::TransitionExecutor;
use crate::store::ScheduleStore;
use crate::telemetry;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, instrument, warn};

/// Scheduler trait for the polling loop
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Start the scheduler polling loop
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Stop the scheduler gracefully
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Run one scan: claim due entries and execute them on the worker
    /// pool. Returns how many entries were dispatched.
    async fn process_due_entries(&self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;
}

/// Main scheduler engine implementation
///
/// Wakes every `poll_interval_seconds`, scans the store for due entries
/// and fans them out to a bounded worker pool. An entry fires no earlier
/// than its effective time and within one polling interval after it
/// becomes due, execution time aside.
pub struct SchedulerEngine {
    config: SchedulerConfig,
    store: Arc<dyn ScheduleStore>,
    executor: Arc<TransitionExecutor>,
    semaphore: Arc<Semaphore>,
    shutdown_tx: broadcast::Sender<()>,
}

impl SchedulerEngine {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn ScheduleStore>,
        executor: Arc<TransitionExecutor>,
    ) -> Self {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        let semaphore = Arc::new(Semaphore::new(config.worker_concurrency));

        Self {
            config,
            store,
            executor,
            semaphore,
            shutdown_tx,
        }
    }

    /// Get a shutdown signal receiver
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}

#[async_trait]
impl Scheduler for SchedulerEngine {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            poll_interval_seconds = self.config.poll_interval_seconds,
            worker_concurrency = self.config.worker_concurrency,
            "Starting scheduler engine"
        );

        let mut poll_interval = interval(Duration::from_secs(self.config.poll_interval_seconds));
        let mut shutdown_rx = self.shutdown_receiver();

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    debug!("Scanning for due schedule entries");

                    match self.process_due_entries().await {
                        Ok(count) => {
                            if count > 0 {
                                info!(entries_dispatched = count, "Dispatched due entries");
                            } else {
                                debug!("No entries due");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Error processing due entries");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }

        info!("Scheduler engine stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Stopping scheduler engine");

        let _ = self.shutdown_tx.send(());

        // Give in-flight executions a moment to finish
        sleep(Duration::from_secs(2)).await;

        info!("Scheduler engine stopped gracefully");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn process_due_entries(&self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let now = Utc::now();
        let due = self
            .store
            .find_due(now, self.config.max_entries_per_poll)
            .await?;

        telemetry::update_due_entries(due.len() as i64);
        debug!(entry_count = due.len(), "Found due entries");

        let claim_ttl = Duration::from_secs(self.config.claim_ttl_seconds);
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut dispatched = 0;

        // Claim in (effective_at, id) order; completion across the pool
        // may still finish out of order.
        for entry in due {
            let claim = match self.store.claim(entry.id, claim_ttl).await {
                Ok(Some(claim)) => claim,
                Ok(None) => {
                    // In flight elsewhere, or serialized behind a sibling
                    // entry for the same target.
                    debug!(entry_id = %entry.id, "Entry not claimable, skipping");
                    continue;
                }
                Err(e) => {
                    error!(entry_id = %entry.id, error = %e, "Claim attempt failed");
                    continue;
                }
            };

            let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
                warn!("Worker pool closed, stopping dispatch");
                break;
            };

            dispatched += 1;
            let executor = Arc::clone(&self.executor);

            tasks.spawn(async move {
                let _permit = permit;
                let started = Instant::now();
                let kind = entry.kind;

                match executor.execute(&entry, &claim).await {
                    Ok(outcome) => {
                        telemetry::record_transition_success(kind, outcome);
                    }
                    Err(e) => {
                        // One failed entry never aborts the rest of the
                        // batch.
                        warn!(
                            entry_id = %entry.id,
                            target = %entry.target(),
                            error = %e,
                            "Entry execution failed"
                        );
                        telemetry::record_transition_failure(kind, &e);
                    }
                }

                telemetry::record_transition_duration(kind, started.elapsed().as_secs_f64());
            });
        }

        while tasks.join_next().await.is_some() {}

        Ok(dispatched)
    }
}
