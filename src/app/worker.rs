//! Periodic background sync.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::service::AppService;

/// Background sync worker configuration
#[derive(Debug, Clone)]
pub struct SyncWorkerConfig {
    pub enabled: bool,
    /// Time between the start of consecutive cycles
    pub interval: Duration,
}

impl Default for SyncWorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(600),
        }
    }
}

/// Runs a sync cycle and a cache sweep on every tick. The first cycle starts immediately.
pub struct SyncWorker {
    service: Arc<AppService>,
    config: SyncWorkerConfig,
    shutdown_rx: watch::Receiver<bool>,
}

impl SyncWorker {
    #[must_use]
    pub fn new(
        service: Arc<AppService>,
        config: SyncWorkerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            service,
            config,
            shutdown_rx,
        }
    }

    pub async fn run(mut self) {
        info!(interval_secs = self.config.interval.as_secs(), "Sync worker started");
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // Errors end the cycle only; the next one resumes from the stored cursor
                    if let Err(e) = self.service.sync_donations().await {
                        error!(error = %e, "Sync cycle failed");
                    }
                    self.service.purge_expired_cache().await;
                }
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Sync worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Spawn the sync worker. Send `true` on the returned sender to stop it.
pub fn spawn_sync_worker(
    service: Arc<AppService>,
    config: SyncWorkerConfig,
) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = SyncWorker::new(service, config, shutdown_rx);
    let handle = tokio::spawn(worker.run());
    (handle, shutdown_tx)
}
