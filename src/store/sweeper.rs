//! Periodic TTL eviction task

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::CaptureStore;
use crate::{Result, SinkError};

/// Timer-driven task that evicts expired captures
pub struct Sweeper {
    store: Arc<CaptureStore>,
    interval: Duration,
}

impl Sweeper {
    /// Create a sweeper over `store`
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ConfigError`] if `interval` is zero
    pub fn new(store: Arc<CaptureStore>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(SinkError::ConfigError(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self { store, interval })
    }

    /// Run one sweep now
    pub async fn sweep_once(&self) -> usize {
        self.store.evict_expired(Instant::now()).await
    }

    /// Spawn the sweep loop, stopping when `shutdown` fires
    ///
    /// Returns `None` when the store has no TTL and nothing would ever expire.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> Option<JoinHandle<()>> {
        let ttl = self.store.ttl()?;
        info!(
            "Evicting requests older than {} every {}",
            humantime::format_duration(ttl),
            humantime::format_duration(self.interval)
        );
        Some(tokio::spawn(self.run(shutdown)))
    }

    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.sweep_once().await;
                    debug!("Sweep evicted {}", evicted);
                }
                _ = shutdown.recv() => {
                    debug!("Sweeper shutting down");
                    break;
                }
            }
        }
    }
}
