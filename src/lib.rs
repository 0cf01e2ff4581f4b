//! # hype-rank
//!
//! Popularity ranking ("hype score") for location-tagged content.
//!
//! The crate turns community signals into one deterministic score per item:
//! votes, distinct commenters, recency, and the influence of nearby
//! commentary items. It also guarantees that each identity's vote counts at
//! most once per item without ever storing the identity in the clear, and it
//! shields write paths with a strict per-source rate limiter.
//!
//! ## Quick Start
//!
//! ```rust
//! use hype_rank::{GeoPoint, HypeEngine, ItemId, SignatureVerifier, VoteOutcome};
//! use std::sync::Arc;
//!
//! // Plug in real signature verification here.
//! #[derive(Debug)]
//! struct WalletVerifier;
//!
//! impl SignatureVerifier for WalletVerifier {
//!     fn verify(&self, _message: &str, signature: &str, _identity: &str) -> bool {
//!         !signature.is_empty()
//!     }
//! }
//!
//! let engine = HypeEngine::builder()
//!     .with_server_secret("change-me")
//!     .with_verifier(Arc::new(WalletVerifier))
//!     .build()
//!     .unwrap();
//!
//! let id = ItemId::from("drop-1");
//! let here = GeoPoint::new(2.3522, 48.8566).unwrap();
//! let item = engine.create_item(id.clone(), here, "0xA11CE", "sig").unwrap();
//! assert!((item.hype_score - 2.0).abs() < 1e-6);
//!
//! assert!(engine.vote(&id, "0xA11CE", "sig").unwrap().is_accepted());
//! assert_eq!(engine.vote(&id, "0xa11ce", "sig").unwrap(), VoteOutcome::Duplicate);
//! ```
//!
//! ## Scoring
//!
//! ```text
//! base_hype = 1.0 * votes + 0.3 * sqrt(distinct commenters) + 2.0 * 0.5^(age_days / 7)
//! hype      = base_hype * location_impact
//! ```
//!
//! `location_impact` multiplies the proximity-weighted multipliers of every
//! active influence source whose radius covers the item, clamped to
//! `[0.1, 3.0]`. Positive sources boost (x1.2 at the center), negative
//! sources dampen (x0.8), severe sources dampen strongly (x0.5). The effect
//! fades linearly to nothing at the radius (5 km unless the source says
//! otherwise).
//!
//! Scores are written in exactly two situations: right after an event on the
//! item (creation, vote, comment) and during a sweep. Both go through
//! [`recompute_score`], so a sweep never disagrees with an event.
//!
//! ## Vote Commitments
//!
//! A vote is stored as `sha256(lowercase(identity) 0x1F subject 0x1F secret)`.
//! The same identity always produces the same commitment for an item, so a
//! second vote is detected as a duplicate, while the identity itself cannot be
//! recovered from storage without the server secret.
//!
//! ## Rate Limiting
//!
//! [`RateLimiter::allow`] lets exactly one request per source key through per
//! window. Rejections do not extend the window. Per-key state lives in a
//! sharded map owned by the limiter, bounded by LRU eviction and cleaned up
//! by retention:
//!
//! ```rust
//! # use hype_rank::{HypeEngine, SignatureVerifier};
//! # use std::sync::Arc;
//! # use std::time::Duration;
//! # #[derive(Debug)] struct V;
//! # impl SignatureVerifier for V { fn verify(&self, _: &str, _: &str, _: &str) -> bool { true } }
//! let engine = HypeEngine::builder()
//!     .with_server_secret("change-me")
//!     .with_verifier(Arc::new(V))
//!     .with_max_tracked_sources(50_000)
//!     .build()
//!     .unwrap();
//!
//! let window = Duration::from_secs(10);
//! assert!(engine.allow("203.0.113.7", window));
//! assert!(!engine.allow("203.0.113.7", window));
//! assert!(engine.allow("198.51.100.2", window));
//! ```
//!
//! ## Background Maintenance
//!
//! With the `async` feature (on by default), [`HypeEngine::start_sweeper`]
//! rescores every item on an interval, so recency decay keeps moving scores
//! between events, and drops stale rate-limit entries. Stop it with
//! `SweepHandle::shutdown`.
//!
//! ## Observability
//!
//! All events are logged through `tracing`; the crate never installs a
//! subscriber. [`Metrics`] exposes counters for allowed and limited requests,
//! accepted and duplicate votes, recomputed scores, write conflicts and sweeps.
//!
//! ## Concurrency
//!
//! Calculators are pure. Record updates use optimistic compare-and-swap with a
//! bounded retry budget; when it runs out the caller gets
//! [`RankingError::Contention`], which is transient. A vote whose counter
//! update ran out of retries is still stored and is counted by the next sweep.

// Domain layer - pure scoring logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    commitment::{commit, normalize_identity, CommitmentHash, ServerSecret, SignedAction},
    decay::{decay, decay_factor, decay_since, HalfLife},
    gate::{GateDecision, RateLimitEntry},
    geo::{distance_meters, GeoPoint},
    hype::{base_hype, hype_score, ScoreInputs},
    influence::{location_impact, ImpactTag, InfluenceSource, LinkedLocation, SourceId},
    model::{Comment, ContentItem, ItemId, VoteCommitment},
    validation::ValidationError,
};

pub use application::{
    limiter::RateLimiter,
    metrics::{Metrics, MetricsSnapshot},
    orchestrator::{
        recompute_score, NewSource, RankingError, RankingOrchestrator, Stores, SweepReport,
        VoteOutcome,
    },
    ports::{
        Clock, CommentStore, CommitmentStore, ContentStore, EvictionCandidate, EvictionPolicy,
        InfluenceStore, SignatureVerifier, Storage, StoreError, Versioned,
    },
    registry::GateRegistry,
    sweeper::{MaintenanceReport, SweepConfig, SweepConfigError, Sweeper},
};

#[cfg(feature = "async")]
pub use application::sweeper::{ShutdownError, SweepHandle};

pub use infrastructure::{
    clock::SystemClock,
    engine::{BuildError, CommentOutcome, HypeEngine, HypeEngineBuilder, RateLimitStorage},
    eviction::LruEviction,
    memory::{MemoryCommentStore, MemoryCommitmentStore, MemoryContentStore, MemoryInfluenceStore},
    storage::ShardedStorage,
};
