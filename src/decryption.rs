use crate::{
    codec::from_base64,
    crypto::ScopedProvider,
    error::AttemptLog,
    resolver::content_encryption_keys,
    token::JsonWebToken,
    validator::ValidationParameters,
};
use tracing::debug;

/// Decrypt a JWE, returning its plaintext.
///
/// Every candidate key is tried in order and the plaintext produced by the first one that decrypts and authenticates
/// the token is returned.
pub(crate) fn decrypt_token(
    token: &JsonWebToken,
    parameters: &ValidationParameters,
) -> Result<String, DecryptionError> {
    let encryption = token
        .encryption_algorithm()
        .filter(|encryption| !encryption.is_empty())
        .ok_or(DecryptionError::MissingEncryptionAlgorithm)?;
    let segment = |name: &'static str, segment: Option<&str>| {
        from_base64(segment.unwrap_or_default()).map_err(|e| DecryptionError::Malformed(name, e))
    };
    let iv = segment("initialization vector", token.initialization_vector())?;
    let ciphertext = segment("ciphertext", token.ciphertext())?;
    let tag = segment("authentication tag", token.authentication_tag())?;
    let associated_data = token.encoded_header().as_bytes();

    let mut attempts = AttemptLog::default();
    for key in content_encryption_keys(token, parameters)? {
        let Some(factory) = parameters.crypto_provider_factory.as_ref().or(key.crypto_provider_factory()) else {
            debug!("no crypto provider factory for {key}, skipping it");
            continue;
        };
        if !factory.is_supported_algorithm(encryption, &key) {
            debug!("content encryption algorithm {encryption} is not supported for {key}, skipping it");
            continue;
        }

        let plaintext = ScopedProvider::authenticated_encryption(&**factory, &key, encryption)
            .and_then(|provider| provider.decrypt(&ciphertext, associated_data, &iv, &tag))
            .map_err(|e| e.to_string())
            .and_then(|plaintext| String::from_utf8(plaintext).map_err(|e| format!("plaintext is not UTF-8: {e}")));
        match plaintext {
            Ok(plaintext) => {
                debug!("token decrypted using {key}");
                return Ok(plaintext);
            }
            Err(diagnostic) => attempts.record(&key, Some(diagnostic)),
        }
    }

    if attempts.is_empty() {
        Err(DecryptionError::NoSuitableKey)
    } else {
        Err(DecryptionError::AllKeysFailed(attempts))
    }
}

/// An error when decrypting a token.
#[derive(Debug, thiserror::Error)]
pub enum DecryptionError {
    #[error("token has no content encryption algorithm")]
    MissingEncryptionAlgorithm,

    #[error("malformed {0}: {1}")]
    Malformed(&'static str, base64::DecodeError),

    #[error("no key decrypted the token, {0}")]
    AllKeysFailed(AttemptLog),

    #[error("no suitable key to decrypt the token with")]
    NoSuitableKey,
}
