use crate::{
    codec::{from_base64, CompactDecoder, CompactParseError, TokenKind},
    crypto::ScopedProvider,
    error::{AttemptLog, TokenError},
    key::SecurityKey,
    resolver::signing_keys,
    token::JsonWebToken,
    validator::ValidationParameters,
};
use tracing::{debug, info};

/// Validate the signature of a JWS.
///
/// On success the returned token carries the key that verified it, unless it's an unsigned token and the parameters
/// allow those.
pub(crate) fn validate_signature(
    raw: &str,
    decoder: &CompactDecoder,
    parameters: &ValidationParameters,
) -> Result<JsonWebToken, TokenError> {
    if let Some(validator) = &parameters.signature_validator {
        let token = validator(raw, parameters).ok_or(SignatureError::ValidatorReturnedNone)?;
        return match token.kind() {
            TokenKind::Jws => Ok(token),
            kind => Err(SignatureError::ValidatorWrongKind(kind).into()),
        };
    }

    let mut token = match &parameters.token_reader {
        Some(reader) => {
            let token = reader(raw, parameters).ok_or(SignatureError::ReaderReturnedNone)?;
            if token.kind() != TokenKind::Jws {
                return Err(SignatureError::ReaderWrongKind(token.kind()).into());
            }
            token
        }
        None => {
            let token = decoder.decode(raw)?;
            if token.kind() != TokenKind::Jws {
                return Err(CompactParseError::UnexpectedKind { expected: TokenKind::Jws, found: token.kind() }.into());
            }
            token
        }
    };

    let encoded_signature = token.encoded_signature().unwrap_or_default();
    if encoded_signature.is_empty() {
        if parameters.require_signed_tokens {
            return Err(SignatureError::Missing.into());
        }
        debug!("accepting unsigned token");
        return Ok(token);
    }
    let signature = from_base64(encoded_signature).map_err(SignatureError::Malformed)?;

    let key = verify(raw, &token, &signature, parameters)?;
    token.set_signing_key(key);
    Ok(token)
}

// Try every candidate key in order, stopping at the first one that verifies the signature.
fn verify(
    raw: &str,
    token: &JsonWebToken,
    signature: &[u8],
    parameters: &ValidationParameters,
) -> Result<SecurityKey, TokenError> {
    let algorithm = token.algorithm();
    let signing_input = token.signing_input().unwrap_or_default().as_bytes();
    let key_id = token.key_id().filter(|key_id| !key_id.is_empty());
    let resolved = signing_keys(raw, token, parameters);

    let mut kid_matched = resolved.matched_hint;
    let mut attempts = AttemptLog::default();
    for key in resolved.keys {
        let Some(factory) = parameters.crypto_provider_factory.as_ref().or(key.crypto_provider_factory()) else {
            debug!("no crypto provider factory for {key}, skipping it");
            continue;
        };
        if !factory.is_supported_algorithm(algorithm, &key) {
            info!("algorithm {algorithm} is not supported for {key}, skipping it");
            continue;
        }

        let outcome = ScopedProvider::verifying(&**factory, &key, algorithm)
            .map_err(|e| format!("cannot create {algorithm} signature provider: {e}"))
            .and_then(|provider| provider.verify(signing_input, signature).map_err(|e| e.to_string()));
        match outcome {
            Ok(true) => {
                info!("signature validated using {key}");
                return Ok(key);
            }
            Ok(false) => attempts.record(&key, None),
            Err(diagnostic) => attempts.record(&key, Some(diagnostic)),
        }
        if let Some(key_id) = key_id {
            kid_matched |= key.matches_key_id(key_id);
        }
    }

    match (key_id, kid_matched) {
        (Some(key_id), true) => Err(SignatureError::NoKeyVerified { key_id: Some(key_id.into()), attempts }.into()),
        (Some(key_id), false) => Err(KeyNotFound::KeyId(key_id.to_string()).into()),
        (None, _) if !attempts.is_empty() => Err(SignatureError::NoKeyVerified { key_id: None, attempts }.into()),
        (None, _) => Err(KeyNotFound::NoCandidates.into()),
    }
}

/// An error when validating a token signature.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("token has no signature and signed tokens are required")]
    Missing,

    #[error("malformed signature: {0}")]
    Malformed(base64::DecodeError),

    #[error("signature validator returned no token")]
    ValidatorReturnedNone,

    #[error("signature validator returned a {0} rather than a JWS")]
    ValidatorWrongKind(TokenKind),

    #[error("token reader returned no token")]
    ReaderReturnedNone,

    #[error("token reader returned a {0} rather than a JWS")]
    ReaderWrongKind(TokenKind),

    #[error("no key verified the signature (kid: {}), {attempts}", .key_id.as_deref().unwrap_or("none"))]
    NoKeyVerified { key_id: Option<String>, attempts: AttemptLog },
}

/// An error when no key that could have signed a token is available.
#[derive(Debug, thiserror::Error)]
pub enum KeyNotFound {
    #[error("no key matches kid '{0}'")]
    KeyId(String),

    #[error("no keys to validate the signature with")]
    NoCandidates,
}
