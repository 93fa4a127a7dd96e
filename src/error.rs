use crate::{
    codec::CompactParseError, crypto::CryptoError, decryption::DecryptionError, encryption::EncryptionError,
    key::SecurityKey, signature::KeyNotFound, signature::SignatureError, validator::ClaimValidationError,
};
use itertools::Itertools;
use std::fmt;

/// An error when creating, reading, or validating a token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] CompactParseError),

    #[error("required argument missing: {0}")]
    MissingArgument(&'static str),

    #[error("algorithm '{algorithm}' is not supported for {key}")]
    UnsupportedAlgorithm { algorithm: String, key: String },

    #[error("invalid signature: {0}")]
    SignatureInvalid(#[from] SignatureError),

    #[error("signing key not found: {0}")]
    SigningKeyNotFound(#[from] KeyNotFound),

    #[error("decryption failed: {0}")]
    DecryptionFailed(#[from] DecryptionError),

    #[error("encryption failed: {0}")]
    EncryptionFailed(#[from] EncryptionError),

    #[error("signing failed: {0}")]
    SigningFailed(#[source] CryptoError),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid JSON in {0}: {1}")]
    Encoding(&'static str, serde_json::Error),

    #[error(transparent)]
    ClaimValidation(#[from] ClaimValidationError),

    #[error("actor chain is deeper than {0} levels")]
    ActorChainTooDeep(usize),
}

/// A single key tried while verifying a signature or decrypting a token.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyAttempt {
    /// A description of the key. This never contains key material.
    pub key: String,

    /// The error raised while using this key, if any.
    pub diagnostic: Option<String>,
}

impl fmt::Display for KeyAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.diagnostic {
            Some(diagnostic) => write!(f, "{}: {diagnostic}", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}

/// The ordered list of keys tried during a multi key operation.
///
/// This is only consumed to build the final error once every candidate has been exhausted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttemptLog(Vec<KeyAttempt>);

impl AttemptLog {
    /// Record an attempt.
    pub fn record(&mut self, key: &SecurityKey, diagnostic: Option<String>) {
        self.0.push(KeyAttempt { key: key.to_string(), diagnostic });
    }

    /// The attempts, in the order they were made.
    pub fn attempts(&self) -> &[KeyAttempt] {
        &self.0
    }

    /// The number of attempts.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no keys were attempted.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AttemptLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "keys tried: [{}]", self.0.iter().format("; "))
    }
}
