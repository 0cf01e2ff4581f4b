//! Engine facade and builder.
//!
//! `HypeEngine` wires the orchestrator, the rate limiter and the sweeper
//! together behind one handle. Configure it with [`HypeEngine::builder`].

use crate::application::limiter::RateLimiter;
use crate::application::metrics::Metrics;
use crate::application::orchestrator::{
    NewSource, RankingError, RankingOrchestrator, Stores, SweepReport, VoteOutcome,
};
use crate::application::ports::{Clock, SignatureVerifier};
use crate::application::registry::GateRegistry;
use crate::application::sweeper::{MaintenanceReport, SweepConfig, SweepConfigError, Sweeper};
use crate::domain::commitment::{CommitmentHash, ServerSecret};
use crate::domain::gate::RateLimitEntry;
use crate::domain::geo::GeoPoint;
use crate::domain::influence::{InfluenceSource, SourceId};
use crate::domain::model::{ContentItem, ItemId};
use crate::domain::validation::ValidationError;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::eviction::LruEviction;
use crate::infrastructure::storage::ShardedStorage;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[cfg(feature = "async")]
use crate::application::sweeper::SweepHandle;

/// Environment variable read by [`HypeEngineBuilder::with_server_secret_from_env`].
pub const SERVER_SECRET_ENV: &str = "HYPE_SERVER_SECRET";

/// Rate-limit storage used by the engine.
pub type RateLimitStorage = Arc<ShardedStorage<String, RateLimitEntry>>;

/// Error returned when building an engine with invalid configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// No server secret was configured
    #[error("a server secret is required")]
    MissingServerSecret,
    /// The secret was to be read from an unset environment variable
    #[error("environment variable {0} is not set")]
    SecretEnvUnset(&'static str),
    /// The configured secret is unusable
    #[error("invalid server secret: {0}")]
    InvalidSecret(ValidationError),
    /// No signature verifier was configured
    #[error("a signature verifier is required")]
    MissingVerifier,
    /// Comment window was zero
    #[error("comment window must be greater than 0")]
    ZeroCommentWindow,
    /// Source cap was zero
    #[error("max_tracked_sources must be greater than 0")]
    ZeroMaxTrackedSources,
    /// Retry budget was zero
    #[error("max_update_attempts must be greater than 0")]
    ZeroUpdateAttempts,
    /// Retention was shorter than the comment window
    #[error("rate-limit retention {retention:?} is shorter than the comment window {window:?}")]
    RetentionShorterThanWindow {
        /// Configured retention
        retention: Duration,
        /// Configured comment window
        window: Duration,
    },
    /// Sweep interval or retention was zero
    #[error("sweep configuration error: {0}")]
    Sweep(#[from] SweepConfigError),
}

/// Builder for [`HypeEngine`].
pub struct HypeEngineBuilder {
    secret: Option<String>,
    secret_env_unset: bool,
    verifier: Option<Arc<dyn SignatureVerifier>>,
    clock: Option<Arc<dyn Clock>>,
    stores: Option<Stores>,
    comment_window: Duration,
    rate_limit_retention: Duration,
    max_tracked_sources: usize,
    max_update_attempts: u32,
    sweep_interval: Duration,
}

impl HypeEngineBuilder {
    /// Set the server secret mixed into every vote commitment.
    pub fn with_server_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self.secret_env_unset = false;
        self
    }

    /// Read the server secret from `HYPE_SERVER_SECRET`.
    ///
    /// `build` fails if the variable is unset.
    pub fn with_server_secret_from_env(mut self) -> Self {
        match std::env::var(SERVER_SECRET_ENV) {
            Ok(secret) => {
                self.secret = Some(secret);
                self.secret_env_unset = false;
            }
            Err(_) => {
                self.secret = None;
                self.secret_env_unset = true;
            }
        }
        self
    }

    /// Set the signature oracle used for every signed action.
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Set a custom clock (default: `SystemClock`).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use the given record stores (default: fresh in-memory stores).
    pub fn with_stores(mut self, stores: Stores) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Minimum time between two comments from one source key (default: 10s).
    pub fn with_comment_window(mut self, window: Duration) -> Self {
        self.comment_window = window;
        self
    }

    /// How long an idle rate-limit entry is kept (default: 60s).
    ///
    /// Must be at least the comment window. Entries still inside their own
    /// window are kept regardless.
    pub fn with_rate_limit_retention(mut self, retention: Duration) -> Self {
        self.rate_limit_retention = retention;
        self
    }

    /// Cap on tracked source keys; the least recently seen is evicted first
    /// (default: 100,000).
    pub fn with_max_tracked_sources(mut self, max: usize) -> Self {
        self.max_tracked_sources = max;
        self
    }

    /// Optimistic-write attempts per record update (default: 5).
    pub fn with_max_update_attempts(mut self, attempts: u32) -> Self {
        self.max_update_attempts = attempts;
        self
    }

    /// Time between background sweeps (default: 5 minutes).
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns `BuildError` if the configuration is invalid.
    pub fn build(self) -> Result<HypeEngine, BuildError> {
        let secret = match (self.secret, self.secret_env_unset) {
            (Some(secret), _) => ServerSecret::new(secret).map_err(BuildError::InvalidSecret)?,
            (None, true) => return Err(BuildError::SecretEnvUnset(SERVER_SECRET_ENV)),
            (None, false) => return Err(BuildError::MissingServerSecret),
        };
        let verifier = self.verifier.ok_or(BuildError::MissingVerifier)?;
        if self.comment_window.is_zero() {
            return Err(BuildError::ZeroCommentWindow);
        }
        if self.max_tracked_sources == 0 {
            return Err(BuildError::ZeroMaxTrackedSources);
        }
        if self.max_update_attempts == 0 {
            return Err(BuildError::ZeroUpdateAttempts);
        }
        let sweep_config = SweepConfig::new(self.sweep_interval, self.rate_limit_retention)?;
        if self.rate_limit_retention < self.comment_window {
            return Err(BuildError::RetentionShorterThanWindow {
                retention: self.rate_limit_retention,
                window: self.comment_window,
            });
        }

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()) as Arc<dyn Clock>);
        let stores = self.stores.unwrap_or_else(Stores::in_memory);
        let metrics = Metrics::new();

        let storage: RateLimitStorage = Arc::new(
            ShardedStorage::new()
                .with_eviction(Arc::new(LruEviction::new(
                    self.max_tracked_sources,
                    Arc::clone(&clock),
                )))
                .with_metrics(metrics.clone()),
        );
        let registry = GateRegistry::new(storage, Arc::clone(&clock));
        let limiter = Arc::new(RateLimiter::new(registry, metrics.clone()));

        let orchestrator = Arc::new(RankingOrchestrator::new(
            stores,
            verifier,
            clock,
            secret,
            metrics.clone(),
            self.max_update_attempts,
        ));

        debug!(
            comment_window_ms = self.comment_window.as_millis() as u64,
            max_tracked_sources = self.max_tracked_sources,
            max_update_attempts = self.max_update_attempts,
            "hype engine built"
        );

        Ok(HypeEngine {
            orchestrator,
            limiter,
            metrics,
            comment_window: self.comment_window,
            sweep_config,
        })
    }
}

/// Result of a rate-limited comment submission.
#[derive(Debug, Clone, PartialEq)]
pub enum CommentOutcome {
    /// The comment was stored; carries the updated item
    Recorded(ContentItem),
    /// The source key is cooling down; nothing was stored
    RateLimited,
}

/// Ranking engine: scores, votes, comments, influence sources and rate limits.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct HypeEngine {
    orchestrator: Arc<RankingOrchestrator>,
    limiter: Arc<RateLimiter<RateLimitStorage>>,
    metrics: Metrics,
    comment_window: Duration,
    sweep_config: SweepConfig,
}

impl HypeEngine {
    /// Create a builder for configuring the engine.
    ///
    /// Defaults:
    /// - Clock: `SystemClock`
    /// - Stores: in-memory
    /// - Comment window: 10 seconds
    /// - Rate-limit retention: 60 seconds
    /// - Max tracked sources: 100,000 (with LRU eviction)
    /// - Max update attempts: 5
    /// - Sweep interval: 5 minutes
    ///
    /// A server secret and a signature verifier have no default.
    pub fn builder() -> HypeEngineBuilder {
        HypeEngineBuilder {
            secret: None,
            secret_env_unset: false,
            verifier: None,
            clock: None,
            stores: None,
            comment_window: Duration::from_secs(10),
            rate_limit_retention: Duration::from_secs(60),
            max_tracked_sources: 100_000,
            max_update_attempts: 5,
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }

    /// Commitment for `identity` acting on `subject_id`.
    pub fn commit(&self, identity: &str, subject_id: &str) -> Result<CommitmentHash, ValidationError> {
        self.orchestrator.commitment_for(identity, subject_id)
    }

    /// `true` if a request from `source_key` may proceed under `window`.
    ///
    /// Any window is honored exactly: neither the source cap nor retention
    /// cleanup drops a key before its window has elapsed.
    pub fn allow(&self, source_key: &str, window: Duration) -> bool {
        self.limiter.allow(source_key, window)
    }

    /// Store a new item with its initial score.
    pub fn create_item(
        &self,
        id: ItemId,
        location: GeoPoint,
        identity: &str,
        signature: &str,
    ) -> Result<ContentItem, RankingError> {
        self.orchestrator.create_item(id, location, identity, signature)
    }

    /// Count a signed vote unless the identity already voted on the item.
    pub fn vote(
        &self,
        item_id: &ItemId,
        identity: &str,
        signature: &str,
    ) -> Result<VoteOutcome<ContentItem>, RankingError> {
        self.orchestrator.record_vote(item_id, identity, signature)
    }

    /// Count a vote by precomputed commitment.
    pub fn record_vote_if_new(
        &self,
        item_id: &ItemId,
        commitment: CommitmentHash,
    ) -> Result<VoteOutcome<ContentItem>, RankingError> {
        self.orchestrator.record_vote_if_new(item_id, commitment)
    }

    /// Rate-limit by `source_key`, then store the comment and rescore the item.
    ///
    /// A rejected request writes nothing.
    pub fn submit_comment(
        &self,
        source_key: &str,
        item_id: &ItemId,
        text: &str,
        pseudonym: &str,
    ) -> Result<CommentOutcome, RankingError> {
        if !self.limiter.allow(source_key, self.comment_window) {
            return Ok(CommentOutcome::RateLimited);
        }
        self.orchestrator
            .record_comment(item_id, text, pseudonym)
            .map(CommentOutcome::Recorded)
    }

    /// Register an influence source and rescore all items.
    pub fn register_source(
        &self,
        source: NewSource,
        identity: &str,
        signature: &str,
    ) -> Result<(InfluenceSource, SweepReport), RankingError> {
        self.orchestrator.register_source(source, identity, signature)
    }

    /// Activate or deactivate an influence source and rescore all items.
    pub fn set_source_active(&self, id: &SourceId, active: bool) -> Result<SweepReport, RankingError> {
        self.orchestrator.set_source_active(id, active)
    }

    /// Record a signed verification of an influence source.
    pub fn verify_source(
        &self,
        id: &SourceId,
        identity: &str,
        signature: &str,
    ) -> Result<VoteOutcome<InfluenceSource>, RankingError> {
        self.orchestrator.verify_source(id, identity, signature)
    }

    /// Rescore every item now.
    pub fn sweep(&self) -> Result<SweepReport, RankingError> {
        self.orchestrator.sweep()
    }

    /// Drop rate-limit entries older than the configured retention.
    pub fn evict_stale_sources(&self) -> usize {
        self.limiter.evict_stale(self.sweep_config.retention)
    }

    /// Rescore every item and drop stale rate-limit entries.
    pub fn run_maintenance(&self) -> Result<MaintenanceReport, RankingError> {
        self.sweeper().run_once()
    }

    /// The `limit` highest-scoring items.
    pub fn top(&self, limit: usize) -> Result<Vec<ContentItem>, RankingError> {
        self.orchestrator.top(limit)
    }

    /// Current state of an item.
    pub fn item(&self, id: &ItemId) -> Result<Option<ContentItem>, RankingError> {
        self.orchestrator.item(id)
    }

    /// Current state of an influence source.
    pub fn source(&self, id: &SourceId) -> Result<Option<InfluenceSource>, RankingError> {
        self.orchestrator.source(id)
    }

    /// Number of source keys the rate limiter is tracking.
    pub fn tracked_sources(&self) -> usize {
        self.limiter.registry().len()
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Get the sweep configuration.
    pub fn sweep_config(&self) -> &SweepConfig {
        &self.sweep_config
    }

    /// A sweeper over this engine's state.
    pub fn sweeper(&self) -> Sweeper<RateLimitStorage> {
        Sweeper::new(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.limiter),
            self.sweep_config,
        )
    }

    /// Start periodic maintenance on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    #[cfg(feature = "async")]
    pub fn start_sweeper(&self) -> SweepHandle {
        self.sweeper().start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::{MockClock, MockVerifier};
    use chrono::Utc;

    fn builder() -> HypeEngineBuilder {
        HypeEngine::builder()
            .with_server_secret("test-secret")
            .with_verifier(Arc::new(MockVerifier::accept_all()))
    }

    #[test]
    fn test_builder_defaults() {
        let engine = builder().build().unwrap();
        assert_eq!(engine.comment_window, Duration::from_secs(10));
        assert_eq!(engine.sweep_config().retention, Duration::from_secs(60));
        assert_eq!(engine.sweep_config().interval, Duration::from_secs(300));
    }

    #[test]
    fn test_builder_requires_secret_and_verifier() {
        let result = HypeEngine::builder()
            .with_verifier(Arc::new(MockVerifier::accept_all()))
            .build();
        assert!(matches!(result, Err(BuildError::MissingServerSecret)));

        let result = HypeEngine::builder().with_server_secret("s").build();
        assert!(matches!(result, Err(BuildError::MissingVerifier)));

        let result = builder().with_server_secret("").build();
        assert!(matches!(result, Err(BuildError::InvalidSecret(_))));
    }

    #[test]
    fn test_builder_rejects_zero_values() {
        assert!(matches!(
            builder().with_comment_window(Duration::ZERO).build(),
            Err(BuildError::ZeroCommentWindow)
        ));
        assert!(matches!(
            builder().with_max_tracked_sources(0).build(),
            Err(BuildError::ZeroMaxTrackedSources)
        ));
        assert!(matches!(
            builder().with_max_update_attempts(0).build(),
            Err(BuildError::ZeroUpdateAttempts)
        ));
        assert!(matches!(
            builder().with_sweep_interval(Duration::ZERO).build(),
            Err(BuildError::Sweep(SweepConfigError::ZeroInterval))
        ));
        assert!(matches!(
            builder().with_rate_limit_retention(Duration::ZERO).build(),
            Err(BuildError::Sweep(SweepConfigError::ZeroRetention))
        ));
    }

    #[test]
    fn test_submit_comment_is_rate_limited() {
        let clock = MockClock::new(Utc::now());
        let engine = builder().with_clock(Arc::new(clock.clone())).build().unwrap();
        let id = ItemId::from("drop-1");
        engine
            .create_item(id.clone(), GeoPoint::new(0.0, 0.0).unwrap(), "0x1", "sig")
            .unwrap();

        let first = engine.submit_comment("10.0.0.1", &id, "hello", "ana").unwrap();
        assert!(matches!(first, CommentOutcome::Recorded(ref item) if item.unique_contributors == 1));

        let second = engine.submit_comment("10.0.0.1", &id, "again", "ben").unwrap();
        assert_eq!(second, CommentOutcome::RateLimited);
        assert_eq!(engine.item(&id).unwrap().unwrap().unique_contributors, 1);

        // another source key is unaffected
        let other = engine.submit_comment("10.0.0.2", &id, "hi", "ben").unwrap();
        assert!(matches!(other, CommentOutcome::Recorded(_)));

        clock.advance(Duration::from_secs(10));
        let later = engine.submit_comment("10.0.0.1", &id, "back", "cy").unwrap();
        assert!(matches!(later, CommentOutcome::Recorded(ref item) if item.unique_contributors == 3));
    }

    #[test]
    fn test_source_cap_never_reopens_a_window() {
        let clock = MockClock::new(Utc::now());
        let engine = builder()
            .with_clock(Arc::new(clock.clone()))
            .with_max_tracked_sources(3)
            .build()
            .unwrap();
        let window = Duration::from_secs(10);

        for key in ["a", "b", "c", "d"] {
            assert!(engine.allow(key, window));
        }
        for key in ["a", "b", "c", "d"] {
            assert!(!engine.allow(key, window), "{key} passed twice in one window");
        }
        assert_eq!(engine.tracked_sources(), 4);
        assert_eq!(engine.metrics().entries_evicted(), 0);

        // with the windows elapsed the cap applies again
        clock.advance(window);
        assert!(engine.allow("e", window));
        assert_eq!(engine.tracked_sources(), 4);
        assert_eq!(engine.metrics().entries_evicted(), 1);
    }

    #[test]
    fn test_retention_shorter_than_comment_window_rejected() {
        let result = builder()
            .with_comment_window(Duration::from_secs(120))
            .build();
        assert_eq!(
            result.err(),
            Some(BuildError::RetentionShorterThanWindow {
                retention: Duration::from_secs(60),
                window: Duration::from_secs(120),
            })
        );

        assert!(builder()
            .with_comment_window(Duration::from_secs(120))
            .with_rate_limit_retention(Duration::from_secs(120))
            .build()
            .is_ok());
    }

    #[test]
    fn test_maintenance_keeps_keys_inside_long_windows() {
        let clock = MockClock::new(Utc::now());
        let engine = builder().with_clock(Arc::new(clock.clone())).build().unwrap();
        let window = Duration::from_secs(120);

        assert!(engine.allow("10.0.0.1", window));
        clock.advance(Duration::from_secs(61));
        let report = engine.run_maintenance().unwrap();

        assert_eq!(report.rate_limit_entries_evicted, 0);
        assert!(!engine.allow("10.0.0.1", window));

        clock.advance(Duration::from_secs(59));
        assert!(engine.allow("10.0.0.1", window));
    }

    #[test]
    fn test_commit_matches_orchestrator() {
        let engine = builder().build().unwrap();
        let a = engine.commit("0xABC", "drop-1").unwrap();
        let b = engine.commit("0xabc", "drop-1").unwrap();
        assert_eq!(a, b);
    }
}
