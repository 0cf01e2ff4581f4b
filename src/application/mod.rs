//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Gate registry (storage of per-source rate-limit entries)
//! - Rate limiter (allow/reject decisions)
//! - Ranking orchestrator (the only place records are written)
//! - Sweeper (periodic rescoring and cleanup)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod limiter;
pub mod metrics;
pub mod orchestrator;
pub mod ports;
pub mod registry;
pub mod sweeper;
