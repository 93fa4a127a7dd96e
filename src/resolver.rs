//! Narrowing of the configured keys down to the candidates worth trying for a token.

use crate::{
    algorithms::DIRECT,
    codec::from_base64,
    crypto::ScopedProvider,
    decryption::DecryptionError,
    key::SecurityKey,
    token::JsonWebToken,
    validator::{KeyResolver, ValidationParameters},
};
use tracing::debug;

/// The candidate keys for a token, in the order they should be tried.
#[derive(Debug, Default)]
pub(crate) struct ResolvedKeys {
    pub(crate) keys: Vec<SecurityKey>,

    /// Whether the keys were narrowed down by matching the token's `kid` or `x5t` headers.
    pub(crate) matched_hint: bool,
}

/// Resolve the keys that may have signed the given token.
pub(crate) fn signing_keys(raw: &str, token: &JsonWebToken, parameters: &ValidationParameters) -> ResolvedKeys {
    resolve(
        raw,
        token,
        parameters,
        parameters.issuer_signing_key_resolver.as_ref(),
        parameters.issuer_signing_key.as_ref(),
        &parameters.issuer_signing_keys,
    )
}

/// Resolve the keys that may decrypt the given JWE.
///
/// Unless the token uses direct encryption, every resolved key is used to unwrap the token's content encryption key
/// and the unwrapped keys are returned instead. Keys that can't unwrap it are skipped.
pub(crate) fn content_encryption_keys(
    token: &JsonWebToken,
    parameters: &ValidationParameters,
) -> Result<Vec<SecurityKey>, DecryptionError> {
    let resolved = resolve(
        token.encoded_token(),
        token,
        parameters,
        parameters.token_decryption_key_resolver.as_ref(),
        parameters.token_decryption_key.as_ref(),
        &parameters.token_decryption_keys,
    );
    let algorithm = token.algorithm();
    if algorithm == DIRECT {
        return Ok(resolved.keys);
    }

    let wrapped_key = from_base64(token.encrypted_key().unwrap_or_default())
        .map_err(|e| DecryptionError::Malformed("encrypted key", e))?;
    let mut unwrapped_keys = Vec::new();
    for key in resolved.keys {
        let Some(factory) = parameters.crypto_provider_factory.as_ref().or(key.crypto_provider_factory()) else {
            debug!("no crypto provider factory for {key}, skipping it");
            continue;
        };
        if !factory.is_supported_algorithm(algorithm, &key) {
            debug!("key wrap algorithm {algorithm} is not supported for {key}, skipping it");
            continue;
        }
        let unwrapped = ScopedProvider::key_unwrap(&**factory, &key, algorithm)
            .and_then(|provider| provider.unwrap_key(&wrapped_key));
        match unwrapped {
            Ok(unwrapped) => unwrapped_keys.push(SecurityKey::symmetric(unwrapped)),
            Err(e) => debug!("could not unwrap content encryption key using {key}: {e}"),
        }
    }
    Ok(unwrapped_keys)
}

fn resolve(
    raw: &str,
    token: &JsonWebToken,
    parameters: &ValidationParameters,
    resolver: Option<&KeyResolver>,
    key: Option<&SecurityKey>,
    keys: &[SecurityKey],
) -> ResolvedKeys {
    match resolver {
        Some(resolver) => {
            if let Some(keys) = resolver(raw, token, token.key_id(), parameters) {
                return ResolvedKeys { keys, matched_hint: false };
            }
        }
        None => {
            if let Some(key) = match_key(token, key, keys) {
                return ResolvedKeys { keys: vec![key.clone()], matched_hint: true };
            }
        }
    };

    debug!("no key matched the token's key hints, trying every configured key");
    ResolvedKeys { keys: key.into_iter().chain(keys).cloned().collect(), matched_hint: false }
}

/// Find the key identified by the token's `kid` header or, failing that, its `x5t` header.
///
/// The single key is always looked at before the list, and the first match wins.
pub(crate) fn match_key<'a>(
    token: &JsonWebToken,
    key: Option<&'a SecurityKey>,
    keys: &'a [SecurityKey],
) -> Option<&'a SecurityKey> {
    let candidates = || key.into_iter().chain(keys);
    if let Some(key_id) = token.key_id().filter(|key_id| !key_id.is_empty()) {
        if let Some(key) = candidates().find(|candidate| candidate.matches_key_id(key_id)) {
            return Some(key);
        }
    }
    let thumbprint = token.x509_thumbprint().filter(|thumbprint| !thumbprint.is_empty())?;
    candidates().find(|candidate| candidate.matches_thumbprint(thumbprint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        algorithms::{AES128_CBC_HMAC_SHA256, AES128_KEY_WRAP, HMAC_SHA256},
        codec::to_base64_json,
        encryption::encrypt_token,
        key::EncryptingCredentials,
        token::JwtHeader,
    };
    use rstest::rstest;

    fn token(key_id: Option<&str>, thumbprint: Option<&str>) -> JsonWebToken {
        let header = JwtHeader {
            algorithm: HMAC_SHA256.into(),
            key_id: key_id.map(Into::into),
            x509_thumbprint: thumbprint.map(Into::into),
            ..Default::default()
        };
        let raw = format!("{}.e30.c2ln", to_base64_json(&header).unwrap());
        JsonWebToken::decode(&raw).unwrap()
    }

    fn key(key_id: &str) -> SecurityKey {
        SecurityKey::symmetric([0; 32]).with_key_id(key_id)
    }

    fn x509_key(key_id: &str, thumbprint: &str) -> SecurityKey {
        key(key_id).with_x509_thumbprint(thumbprint)
    }

    fn resolved_ids(keys: &[SecurityKey]) -> Vec<&str> {
        keys.iter().map(|key| key.key_id().unwrap_or_default()).collect()
    }

    #[rstest]
    #[case::single_before_list(Some("a"), None, Some(key("a")), vec![key("b"), key("a")], Some(("a", true)))]
    #[case::list_order(Some("a"), None, None, vec![key("b"), x509_key("A", "t1"), key("a")], Some(("A", false)))]
    #[case::standard_case_sensitive(Some("a"), None, None, vec![key("A")], None)]
    #[case::x509_case_insensitive(Some("abc"), None, None, vec![x509_key("ABC", "t")], Some(("ABC", false)))]
    #[case::kid_before_thumbprint(Some("b"), Some("t1"), None, vec![x509_key("a", "t1"), key("b")], Some(("b", false)))]
    #[case::thumbprint_to_key_id(None, Some("t1"), None, vec![key("x"), key("t1")], Some(("t1", false)))]
    #[case::thumbprint_to_thumbprint(None, Some("T1"), Some(x509_key("x", "t1")), vec![], Some(("x", true)))]
    #[case::unmatched_kid_falls_to_thumbprint(Some("z"), Some("t1"), None, vec![x509_key("x", "t1")], Some(("x", false)))]
    #[case::no_hints(None, None, Some(key("a")), vec![key("b")], None)]
    fn matching(
        #[case] key_id: Option<&str>,
        #[case] thumbprint: Option<&str>,
        #[case] single: Option<SecurityKey>,
        #[case] list: Vec<SecurityKey>,
        #[case] expected: Option<(&str, bool)>,
    ) {
        let token = token(key_id, thumbprint);
        let found = match_key(&token, single.as_ref(), &list);
        match expected {
            Some((expected_id, from_single)) => {
                let found = found.expect("no key found");
                assert_eq!(found.key_id(), Some(expected_id));
                assert_eq!(single.as_ref().is_some_and(|single| std::ptr::eq(single, found)), from_single);
            }
            None => assert!(found.is_none()),
        }
    }

    #[test]
    fn fall_back_to_all_keys() {
        let parameters = ValidationParameters {
            issuer_signing_key: Some(key("a")),
            issuer_signing_keys: vec![key("b"), key("c")],
            ..Default::default()
        };
        let token = token(Some("z"), None);
        let resolved = signing_keys(token.encoded_token(), &token, &parameters);
        assert!(!resolved.matched_hint);
        assert_eq!(resolved_ids(&resolved.keys), ["a", "b", "c"]);
    }

    #[test]
    fn matched_hint() {
        let parameters = ValidationParameters { issuer_signing_keys: vec![key("b"), key("c")], ..Default::default() };
        let token = token(Some("c"), None);
        let resolved = signing_keys(token.encoded_token(), &token, &parameters);
        assert!(resolved.matched_hint);
        assert_eq!(resolved_ids(&resolved.keys), ["c"]);
    }

    #[test]
    fn resolver_result_used_verbatim() {
        let parameters = ValidationParameters { issuer_signing_keys: vec![key("a")], ..Default::default() }
            .with_issuer_signing_key_resolver(|_, _, _, _| Some(Vec::new()));
        let token = token(Some("a"), None);
        let resolved = signing_keys(token.encoded_token(), &token, &parameters);
        assert!(resolved.keys.is_empty());
    }

    #[test]
    fn resolver_receives_hints() {
        let parameters = ValidationParameters::default().with_issuer_signing_key_resolver(|raw, token, key_id, _| {
            assert_eq!(raw, token.encoded_token());
            assert_eq!(key_id, Some("a"));
            None
        });
        let token = token(Some("a"), None);
        let parameters = ValidationParameters { issuer_signing_keys: vec![key("x")], ..parameters };
        let resolved = signing_keys(token.encoded_token(), &token, &parameters);
        assert_eq!(resolved_ids(&resolved.keys), ["x"]);
    }

    #[test]
    fn direct_keys_used_as_is() {
        let key = SecurityKey::symmetric([1; 32]).with_key_id("enc");
        let credentials = EncryptingCredentials::new(key.clone(), DIRECT, AES128_CBC_HMAC_SHA256);
        let token = JsonWebToken::decode(&encrypt_token("a.b.c", &credentials).unwrap()).unwrap();
        let parameters = ValidationParameters { token_decryption_keys: vec![key], ..Default::default() };
        let keys = content_encryption_keys(&token, &parameters).unwrap();
        assert_eq!(resolved_ids(&keys), ["enc"]);
    }

    #[test]
    fn wrapped_keys_unwrapped() {
        let good = SecurityKey::symmetric([1; 16]);
        let other = SecurityKey::symmetric([2; 16]);
        let unsupported = SecurityKey::symmetric([3; 32]);
        let credentials = EncryptingCredentials::new(good.clone(), AES128_KEY_WRAP, AES128_CBC_HMAC_SHA256);
        let token = JsonWebToken::decode(&encrypt_token("a.b.c", &credentials).unwrap()).unwrap();
        let parameters =
            ValidationParameters { token_decryption_keys: vec![unsupported, other, good], ..Default::default() };

        // Only the right key can unwrap, the others are skipped.
        let keys = content_encryption_keys(&token, &parameters).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key_size_bits(), 256);
    }
}
