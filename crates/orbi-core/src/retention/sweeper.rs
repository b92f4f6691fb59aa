//! RetentionSweeper -- periodic deletion of expired message bodies.
//!
//! Two states, Idle and Sweeping. A fixed-interval timer drives
//! Idle -> Sweeping -> Idle; a failed sweep is logged and the timer keeps
//! running. Sweeps never overlap: the timer and manual `sweep_once` calls
//! share one async mutex.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use orbi_types::error::RepositoryError;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::chat::repository::MessageStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    Idle,
    Sweeping,
}

const IDLE: u8 = 0;
const SWEEPING: u8 = 1;

pub struct RetentionSweeper<S> {
    store: Arc<S>,
    retention: Duration,
    interval: Duration,
    lock: Mutex<()>,
    state: AtomicU8,
}

impl<S: MessageStore> RetentionSweeper<S> {
    pub fn new(store: Arc<S>, retention: Duration, interval: Duration) -> Self {
        Self {
            store,
            retention,
            interval,
            lock: Mutex::new(()),
            state: AtomicU8::new(IDLE),
        }
    }

    pub fn state(&self) -> SweeperState {
        match self.state.load(Ordering::Acquire) {
            SWEEPING => SweeperState::Sweeping,
            _ => SweeperState::Idle,
        }
    }

    /// Delete bodies older than the retention window. Returns the count removed.
    pub async fn sweep_once(&self) -> Result<u64, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.state.store(SWEEPING, Ordering::Release);
        let result = self.store.purge_bodies_older_than(self.retention).await;
        self.state.store(IDLE, Ordering::Release);

        if let Ok(removed) = &result {
            tracing::info!(
                removed = *removed,
                retention_days = self.retention.as_secs() / 86_400,
                "swept expired message bodies"
            );
        }
        result
    }

    /// Sweep every `interval` until `cancel` fires. The first sweep runs one
    /// interval after start.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            retention_secs = self.retention.as_secs(),
            "retention sweeper started"
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "retention sweep failed");
                    }
                }
            }
        }

        tracing::info!("retention sweeper stopped");
    }
}
