//! Memoization of encoded JWS headers.

use crate::{codec::to_base64_json, key::SigningCredentials, token::JwtHeader};
use dashmap::DashMap;
use tracing::debug;

/// The parts of a set of signing credentials that determine the header they produce.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HeaderFingerprint {
    /// The signing algorithm.
    pub algorithm: String,

    /// The signing key identifier.
    pub key_id: Option<String>,
}

impl From<&SigningCredentials> for HeaderFingerprint {
    fn from(credentials: &SigningCredentials) -> Self {
        Self { algorithm: credentials.algorithm.clone(), key_id: credentials.key.key_id().map(ToString::to_string) }
    }
}

/// A concurrent cache of base64url encoded JWS headers, keyed by the credentials that produced them.
///
/// Entries are never evicted: the cache grows with the number of distinct signing credentials used with it. Callers
/// that rotate keys often should periodically replace it.
#[derive(Debug, Default)]
pub struct HeaderCache {
    headers: DashMap<HeaderFingerprint, String>,
}

impl HeaderCache {
    /// Get the encoded header for the given credentials, encoding and caching it if needed.
    pub fn get_or_encode(&self, credentials: &SigningCredentials) -> Result<String, serde_json::Error> {
        let fingerprint = HeaderFingerprint::from(credentials);
        if let Some(header) = self.headers.get(&fingerprint) {
            return Ok(header.clone());
        }

        debug!("encoding header for algorithm {} and key id {:?}", fingerprint.algorithm, fingerprint.key_id);
        let header = JwtHeader::signed(&fingerprint.algorithm, fingerprint.key_id.as_deref());
        let header = to_base64_json(&header)?;
        // Concurrent misses for the same fingerprint insert identical values.
        self.headers.insert(fingerprint, header.clone());
        Ok(header)
    }

    /// The number of cached headers.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}
