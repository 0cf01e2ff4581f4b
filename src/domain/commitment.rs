//! Vote commitments.
//!
//! A commitment stands in for an `(identity, subject)` pair so that duplicate
//! votes can be detected without ever storing the identity. It is computed as
//!
//! ```text
//! sha256( lowercase(identity) ␟ subject_id ␟ server_secret )
//! ```
//!
//! where `␟` is the ASCII unit separator (`0x1F`), and encoded as 64 lowercase
//! hex characters. Without the server secret an outside party cannot predict
//! the commitment of an arbitrary identity.

use crate::domain::validation::ValidationError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Separator between commitment fields. Rejected inside identity and subject.
const FIELD_SEPARATOR: char = '\u{1f}';

/// Server-wide secret salting every commitment.
///
/// The value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerSecret(String);

impl ServerSecret {
    /// Wrap a secret value.
    ///
    /// # Errors
    /// Returns `ValidationError::EmptyField` if the secret is empty.
    pub fn new(secret: impl Into<String>) -> Result<Self, ValidationError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ValidationError::EmptyField("server secret"));
        }
        Ok(Self(secret))
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServerSecret(<redacted>)")
    }
}

/// Hex-encoded commitment hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitmentHash(String);

impl CommitmentHash {
    /// The hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Case-fold an identity so equivalent spellings commit identically.
pub fn normalize_identity(identity: &str) -> String {
    identity.to_lowercase()
}

/// Derive the commitment for `identity` voting on `subject_id`.
///
/// # Errors
/// Returns a `ValidationError` if the identity or subject is empty or contains
/// the reserved separator.
///
/// # Example
/// ```
/// use hype_rank::domain::commitment::{commit, ServerSecret};
///
/// let secret = ServerSecret::new("s3cret").unwrap();
/// let a = commit("0xABCD", "item-1", &secret).unwrap();
/// let b = commit("0xabcd", "item-1", &secret).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 64);
/// ```
pub fn commit(
    identity: &str,
    subject_id: &str,
    secret: &ServerSecret,
) -> Result<CommitmentHash, ValidationError> {
    check_field("identity", identity)?;
    check_field("subject id", subject_id)?;

    let mut hasher = Sha256::new();
    hasher.update(normalize_identity(identity).as_bytes());
    hasher.update([FIELD_SEPARATOR as u8]);
    hasher.update(subject_id.as_bytes());
    hasher.update([FIELD_SEPARATOR as u8]);
    hasher.update(secret.expose().as_bytes());

    Ok(CommitmentHash(hex::encode(hasher.finalize())))
}

fn check_field(name: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField(name));
    }
    if value.contains(FIELD_SEPARATOR) {
        return Err(ValidationError::ReservedSeparator(name));
    }
    Ok(())
}

/// Action a client signs before the server accepts a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedAction<'a> {
    /// Create a content item or influence source
    Create,
    /// Vote on (or verify) the given subject
    Vote(&'a str),
}

impl SignedAction<'_> {
    /// Canonical message the client signs for this action.
    pub fn message(&self) -> String {
        match self {
            SignedAction::Create => "create:culturedrop".to_string(),
            SignedAction::Vote(subject) => format!("vote:{subject}"),
        }
    }
}
