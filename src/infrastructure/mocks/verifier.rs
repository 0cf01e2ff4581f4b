//! Mock signature verifier for testing.

use crate::application::ports::SignatureVerifier;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum Mode {
    AcceptAll,
    RejectAll,
    Only(HashSet<String>),
}

/// Signature verifier with a fixed verdict.
///
/// Records every message it is asked to verify so tests can assert on the
/// exact signed text.
#[derive(Debug, Clone)]
pub struct MockVerifier {
    mode: Mode,
    seen: Arc<Mutex<Vec<String>>>,
}

impl MockVerifier {
    /// Accept every signature.
    pub fn accept_all() -> Self {
        Self::with_mode(Mode::AcceptAll)
    }

    /// Reject every signature.
    pub fn reject_all() -> Self {
        Self::with_mode(Mode::RejectAll)
    }

    /// Accept signatures only from the listed identities (compared lowercase).
    pub fn only<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = identities
            .into_iter()
            .map(|s| s.as_ref().to_lowercase())
            .collect();
        Self::with_mode(Mode::Only(set))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Messages passed to `verify`, in call order.
    pub fn messages(&self) -> Vec<String> {
        self.seen
            .lock()
            .expect("MockVerifier mutex poisoned - a test thread panicked while holding the lock")
            .clone()
    }
}

impl SignatureVerifier for MockVerifier {
    fn verify(&self, message: &str, _signature: &str, claimed_identity: &str) -> bool {
        self.seen
            .lock()
            .expect("MockVerifier mutex poisoned - a test thread panicked while holding the lock")
            .push(message.to_string());

        match &self.mode {
            Mode::AcceptAll => true,
            Mode::RejectAll => false,
            Mode::Only(allowed) => allowed.contains(&claimed_identity.to_lowercase()),
        }
    }
}
