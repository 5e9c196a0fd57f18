//! Optional background expiry sweeper.
//!
//! Expired keys are always removed lazily when touched, and eagerly whenever a
//! database is enumerated. A key that expires and is never looked at again
//! would still occupy memory, so the server can optionally run this sweeper
//! (`--active-expire`) to reclaim it.
//!
//! The sweep interval adapts: when a large share of keys turns out to be
//! expired the sweeper runs more often, and it backs off while nothing expires.

use super::databases::Databases;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval the sweeper starts with
    pub base_interval: Duration,

    /// Lower bound for the adaptive interval
    pub min_interval: Duration,

    /// Upper bound for the adaptive interval
    pub max_interval: Duration,

    /// Speed up when more than this fraction of keys was expired
    pub speedup_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
        }
    }
}

/// Handle to the running sweeper task. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper on the current tokio runtime.
    pub fn start(databases: Arc<Databases>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(databases, config, shutdown_rx));
        info!("Background expiry sweeper started");

        Self { shutdown_tx }
    }

    pub fn stop(&self) {
        if !*self.shutdown_tx.borrow() {
            let _ = self.shutdown_tx.send(true);
            debug!("Background expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    databases: Arc<Databases>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    return;
                }
            }
        }

        let keys_before = databases.stored_keys();
        let expired = databases.remove_expired();

        if keys_before == 0 || expired == 0 {
            interval = (interval * 2).min(config.max_interval);
            trace!(interval_ms = interval.as_millis(), "Nothing expired, backing off");
            continue;
        }

        let rate = expired as f64 / keys_before as f64;
        if rate > config.speedup_threshold {
            interval = (interval / 2).max(config.min_interval);
        }
        debug!(
            expired,
            interval_ms = interval.as_millis(),
            "Expired keys cleaned up"
        );
    }
}
