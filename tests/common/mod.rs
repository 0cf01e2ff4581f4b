//! Shared helpers for integration tests.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use hype_rank::infrastructure::mocks::MockClock;
use hype_rank::{HypeEngine, HypeEngineBuilder, SignatureVerifier};
use std::sync::Arc;
use std::time::Duration;

/// Route crate logs to the test output; set `RUST_LOG=hype_rank=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mock clock parked at 2024-06-01 12:00 UTC.
pub fn start_clock() -> MockClock {
    MockClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
}

pub fn days(n: u64) -> Duration {
    Duration::from_secs(n * 24 * 60 * 60)
}

/// Accepts a signature only if it equals `signed:<message>:<identity>`.
#[derive(Debug, Default)]
pub struct EchoVerifier;

impl EchoVerifier {
    pub fn sign(message: &str, identity: &str) -> String {
        format!("signed:{message}:{identity}")
    }
}

impl SignatureVerifier for EchoVerifier {
    fn verify(&self, message: &str, signature: &str, claimed_identity: &str) -> bool {
        signature == Self::sign(message, claimed_identity)
    }
}

pub fn create_sig(identity: &str) -> String {
    EchoVerifier::sign("create:culturedrop", identity)
}

pub fn vote_sig(subject: &str, identity: &str) -> String {
    EchoVerifier::sign(&format!("vote:{subject}"), identity)
}

pub fn builder(clock: &MockClock) -> HypeEngineBuilder {
    HypeEngine::builder()
        .with_server_secret("integration-secret")
        .with_verifier(Arc::new(EchoVerifier))
        .with_clock(Arc::new(clock.clone()))
}

pub fn engine(clock: &MockClock) -> HypeEngine {
    init_tracing();
    builder(clock).build().unwrap()
}
