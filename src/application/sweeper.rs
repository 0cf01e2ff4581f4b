//! Periodic maintenance.
//!
//! A sweep recomputes every stored score against the current influence
//! sources (so decay keeps moving scores between events) and drops rate-limit
//! entries past their retention window. `run_once` is synchronous; with the
//! `async` feature, `start` runs it on a tokio interval until shut down.

use crate::application::limiter::RateLimiter;
use crate::application::orchestrator::{RankingError, RankingOrchestrator, SweepReport};
use crate::application::ports::Storage;
use crate::domain::gate::RateLimitEntry;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "async")]
use tokio::sync::oneshot;
#[cfg(feature = "async")]
use tokio::task::JoinHandle;
#[cfg(feature = "async")]
use tokio::time::interval;
#[cfg(feature = "async")]
use tracing::{debug, warn};

/// Error returned when a sweep configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SweepConfigError {
    /// Sweep interval was zero
    #[error("sweep interval must be greater than 0")]
    ZeroInterval,
    /// Rate-limit retention was zero
    #[error("rate-limit retention must be greater than 0")]
    ZeroRetention,
}

/// How often to sweep and how long idle rate-limit entries are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    /// Time between sweeps
    pub interval: Duration,
    /// Age after which a rate-limit entry is dropped
    pub retention: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            retention: Duration::from_secs(60),
        }
    }
}

impl SweepConfig {
    /// Create a configuration.
    ///
    /// # Errors
    /// Returns an error if either duration is zero.
    pub fn new(interval: Duration, retention: Duration) -> Result<Self, SweepConfigError> {
        if interval.is_zero() {
            return Err(SweepConfigError::ZeroInterval);
        }
        if retention.is_zero() {
            return Err(SweepConfigError::ZeroRetention);
        }
        Ok(Self {
            interval,
            retention,
        })
    }
}

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Score recomputation summary
    pub sweep: SweepReport,
    /// Rate-limit entries dropped
    pub rate_limit_entries_evicted: usize,
}

/// Runs score sweeps and rate-limit cleanup.
pub struct Sweeper<S>
where
    S: Storage<String, RateLimitEntry> + Clone,
{
    orchestrator: Arc<RankingOrchestrator>,
    limiter: Arc<RateLimiter<S>>,
    config: SweepConfig,
}

impl<S> Sweeper<S>
where
    S: Storage<String, RateLimitEntry> + Clone,
{
    /// Create a sweeper.
    pub fn new(
        orchestrator: Arc<RankingOrchestrator>,
        limiter: Arc<RateLimiter<S>>,
        config: SweepConfig,
    ) -> Self {
        Self {
            orchestrator,
            limiter,
            config,
        }
    }

    /// Run one maintenance pass now.
    pub fn run_once(&self) -> Result<MaintenanceReport, RankingError> {
        let rate_limit_entries_evicted = self.limiter.evict_stale(self.config.retention);
        let sweep = self.orchestrator.sweep()?;
        Ok(MaintenanceReport {
            sweep,
            rate_limit_entries_evicted,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Run `run_once` every interval on the tokio runtime until shut down.
    ///
    /// The first pass runs immediately. Failed passes are logged and the loop
    /// keeps going.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    #[cfg(feature = "async")]
    pub fn start(self) -> SweepHandle
    where
        S: Send + Sync + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.config.interval);
            // Set once the handle is dropped without a shutdown signal.
            let mut detached = false;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.run_once() {
                            Ok(report) => debug!(
                                items_updated = report.sweep.items_updated,
                                evicted = report.rate_limit_entries_evicted,
                                "scheduled maintenance finished"
                            ),
                            Err(e) => warn!(error = %e, "scheduled maintenance failed"),
                        }
                    }
                    signal = &mut shutdown_rx, if !detached => {
                        if signal.is_ok() {
                            debug!("sweeper received shutdown signal");
                            break;
                        }
                        detached = true;
                    }
                }
            }
        });

        SweepHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }
}

/// Error returned when stopping the background sweeper.
#[cfg(feature = "async")]
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The task had already exited and could not be signalled
    #[error("sweeper task already stopped")]
    AlreadyStopped,
    /// The task panicked
    #[error("sweeper task panicked")]
    TaskPanicked,
    /// The task was cancelled
    #[error("sweeper task was cancelled")]
    TaskCancelled,
    /// The task did not stop in time
    #[error("sweeper task did not stop within {0:?}")]
    Timeout(Duration),
}

/// Handle to a running background sweeper.
///
/// Dropping the handle leaves the task running; call `shutdown` to stop it.
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct SweepHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

#[cfg(feature = "async")]
impl SweepHandle {
    const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal the task to stop and wait for it to finish.
    pub async fn shutdown(mut self) -> Result<(), ShutdownError> {
        let signalled = self
            .shutdown_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false);

        match tokio::time::timeout(Self::SHUTDOWN_TIMEOUT, &mut self.task).await {
            Ok(Ok(())) if signalled => Ok(()),
            Ok(Ok(())) => Err(ShutdownError::AlreadyStopped),
            Ok(Err(e)) if e.is_panic() => Err(ShutdownError::TaskPanicked),
            Ok(Err(_)) => Err(ShutdownError::TaskCancelled),
            Err(_) => {
                self.task.abort();
                Err(ShutdownError::Timeout(Self::SHUTDOWN_TIMEOUT))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::metrics::Metrics;
    use crate::application::orchestrator::Stores;
    use crate::application::registry::GateRegistry;
    use crate::domain::commitment::ServerSecret;
    use crate::domain::geo::GeoPoint;
    use crate::domain::model::ItemId;
    use crate::infrastructure::mocks::{MockClock, MockVerifier};
    use crate::infrastructure::storage::ShardedStorage;
    use chrono::Utc;

    type TestSweeper = Sweeper<Arc<ShardedStorage<String, RateLimitEntry>>>;

    fn sweeper(config: SweepConfig) -> (TestSweeper, Arc<RankingOrchestrator>, MockClock) {
        let clock = MockClock::new(Utc::now());
        let metrics = Metrics::new();
        let orchestrator = Arc::new(RankingOrchestrator::new(
            Stores::in_memory(),
            Arc::new(MockVerifier::accept_all()),
            Arc::new(clock.clone()),
            ServerSecret::new("s").unwrap(),
            metrics.clone(),
            3,
        ));
        let registry = GateRegistry::new(Arc::new(ShardedStorage::new()), Arc::new(clock.clone()));
        let limiter = Arc::new(RateLimiter::new(registry, metrics));
        (
            Sweeper::new(Arc::clone(&orchestrator), limiter, config),
            orchestrator,
            clock,
        )
    }

    #[test]
    fn test_config_rejects_zero() {
        assert_eq!(
            SweepConfig::new(Duration::ZERO, Duration::from_secs(1)),
            Err(SweepConfigError::ZeroInterval)
        );
        assert_eq!(
            SweepConfig::new(Duration::from_secs(1), Duration::ZERO),
            Err(SweepConfigError::ZeroRetention)
        );
    }

    #[test]
    fn test_default_config() {
        let config = SweepConfig::default();
        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.retention, Duration::from_secs(60));
    }

    #[test]
    fn test_run_once_sweeps_and_evicts() {
        let (sweeper, orchestrator, clock) = sweeper(SweepConfig::default());
        orchestrator
            .create_item(ItemId::from("a"), GeoPoint::new(0.0, 0.0).unwrap(), "0x1", "sig")
            .unwrap();
        sweeper.limiter.allow("10.0.0.1", Duration::from_secs(10));

        clock.advance(Duration::from_secs(61));
        let report = sweeper.run_once().unwrap();

        assert_eq!(report.sweep.items_updated, 1);
        assert_eq!(report.rate_limit_entries_evicted, 1);
        assert!(sweeper.limiter.registry().is_empty());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_start_and_shutdown() {
        let config = SweepConfig::new(Duration::from_millis(20), Duration::from_secs(60)).unwrap();
        let (sweeper, orchestrator, _) = sweeper(config);

        let handle = sweeper.start();
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(handle.is_running());

        handle.shutdown().await.expect("shutdown failed");
        assert!(orchestrator.metrics().sweeps_completed() >= 2);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_dropped_handle_keeps_running() {
        let config = SweepConfig::new(Duration::from_millis(20), Duration::from_secs(60)).unwrap();
        let (sweeper, orchestrator, _) = sweeper(config);

        drop(sweeper.start());
        tokio::time::sleep(Duration::from_millis(70)).await;

        assert!(orchestrator.metrics().sweeps_completed() >= 2);
    }
}
