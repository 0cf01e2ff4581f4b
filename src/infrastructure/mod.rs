//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time vs mock)
//! - Storage implementations (sharded maps with LRU eviction)
//! - In-memory record stores
//! - The engine facade and its builder

pub mod clock;
pub mod engine;
pub mod eviction;
pub mod memory;
pub mod storage;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides a controllable clock and a signature
/// verifier with a fixed verdict.
///
/// To use these mocks from another crate's tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// hype-rank = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
