use crate::{
    algorithms::{content_encryption_key_bits, CONTENT_ENCRYPTION_ALGORITHMS, DIRECT},
    codec::{to_base64, to_base64_json},
    crypto::{AuthenticatedEncryptionResult, CryptoError, CryptoProviderFactory, ScopedProvider},
    key::{EncryptingCredentials, SecurityKey},
    token::JwtHeader,
};
use rand::RngCore;

/// Encrypt an already signed token into a JWE.
///
/// In direct mode the token is encrypted under the credentials' key. Otherwise a random content encryption key is
/// generated, wrapped under the credentials' key, and used to encrypt the token.
pub fn encrypt_token(inner_token: &str, credentials: &EncryptingCredentials) -> Result<String, EncryptionError> {
    let key = &credentials.key;
    let factory = credentials
        .effective_crypto_provider_factory()
        .ok_or_else(|| EncryptionError::NoCryptoProvider(key.to_string()))?;
    let factory: &dyn CryptoProviderFactory = &**factory;

    let header = JwtHeader::encrypted(&credentials.algorithm, &credentials.encryption, key.key_id());
    let header = to_base64_json(&header).map_err(EncryptionError::Header)?;

    if credentials.algorithm == DIRECT {
        if !factory.is_supported_algorithm(&credentials.encryption, key) {
            return Err(EncryptionError::unsupported(&credentials.encryption, key));
        }
        let sealed = seal(factory, key, &credentials.encryption, inner_token, &header)?;
        return Ok(format_jwe(&header, "", &sealed));
    }

    if !factory.is_supported_algorithm(&credentials.algorithm, key) {
        return Err(EncryptionError::unsupported(&credentials.algorithm, key));
    }
    let key_bits = content_encryption_key_bits(&credentials.encryption)
        .ok_or_else(|| EncryptionError::UnsupportedContentEncryption(credentials.encryption.clone()))?;
    let mut content_key = vec![0; key_bits / 8];
    rand::thread_rng().fill_bytes(&mut content_key);

    let wrapped_key = ScopedProvider::key_wrap(factory, key, &credentials.algorithm)
        .and_then(|provider| provider.wrap_key(&content_key))
        .map_err(|e| EncryptionError::primitive(&credentials.algorithm, key, e))?;
    let content_key = SecurityKey::symmetric(content_key);
    let sealed = seal(factory, &content_key, &credentials.encryption, inner_token, &header)?;
    Ok(format_jwe(&header, &to_base64(wrapped_key), &sealed))
}

fn seal(
    factory: &dyn CryptoProviderFactory,
    key: &SecurityKey,
    algorithm: &str,
    plaintext: &str,
    header: &str,
) -> Result<AuthenticatedEncryptionResult, EncryptionError> {
    ScopedProvider::authenticated_encryption(factory, key, algorithm)
        .and_then(|provider| provider.encrypt(plaintext.as_bytes(), header.as_bytes()))
        .map_err(|e| EncryptionError::primitive(algorithm, key, e))
}

fn format_jwe(header: &str, wrapped_key: &str, sealed: &AuthenticatedEncryptionResult) -> String {
    let iv = to_base64(&sealed.iv);
    let ciphertext = to_base64(&sealed.ciphertext);
    let tag = to_base64(&sealed.authentication_tag);
    format!("{header}.{wrapped_key}.{iv}.{ciphertext}.{tag}")
}

/// An error when encrypting a token.
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("no crypto provider factory available for {0}")]
    NoCryptoProvider(String),

    #[error("algorithm '{algorithm}' is not supported for {key}")]
    UnsupportedAlgorithm { algorithm: String, key: String },

    #[error("content encryption algorithm '{0}' is not supported, expected one of: {supported}",
        supported = CONTENT_ENCRYPTION_ALGORITHMS.join(", "))]
    UnsupportedContentEncryption(String),

    #[error("{algorithm} using {key}: {source}")]
    Primitive {
        algorithm: String,
        key: String,
        #[source]
        source: CryptoError,
    },

    #[error("encoding header: {0}")]
    Header(serde_json::Error),
}

impl EncryptionError {
    fn unsupported(algorithm: &str, key: &SecurityKey) -> Self {
        Self::UnsupportedAlgorithm { algorithm: algorithm.to_string(), key: key.to_string() }
    }

    fn primitive(algorithm: &str, key: &SecurityKey, source: CryptoError) -> Self {
        Self::Primitive { algorithm: algorithm.to_string(), key: key.to_string(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        algorithms::{AES128_CBC_HMAC_SHA256, AES128_KEY_WRAP, AES256_CBC_HMAC_SHA512, AES256_KEY_WRAP},
        codec::from_base64,
        crypto::DefaultCryptoProviderFactory,
        token::JsonWebToken,
    };
    use rstest::rstest;
    use std::error::Error;

    const INNER: &str = "eyJhbGciOiJIUzI1NiJ9.eyJpc3MiOiJpc3N1ZXIifQ.c2ln";

    fn open(token: &JsonWebToken, key: &SecurityKey) -> Vec<u8> {
        let decode = |segment: Option<&str>| from_base64(segment.unwrap()).unwrap();
        let provider = DefaultCryptoProviderFactory
            .create_authenticated_encryption_provider(key, token.encryption_algorithm().unwrap())
            .unwrap();
        provider
            .decrypt(
                &decode(token.ciphertext()),
                token.encoded_header().as_bytes(),
                &decode(token.initialization_vector()),
                &decode(token.authentication_tag()),
            )
            .expect("decryption failed")
    }

    #[test]
    fn direct() {
        let key = SecurityKey::symmetric([5; 64]).with_key_id("enc");
        let credentials = EncryptingCredentials::new(key.clone(), DIRECT, AES256_CBC_HMAC_SHA512);
        let jwe = encrypt_token(INNER, &credentials).expect("encryption failed");

        let token = JsonWebToken::decode(&jwe).expect("decode failed");
        assert_eq!(token.algorithm(), DIRECT);
        assert_eq!(token.encryption_algorithm(), Some(AES256_CBC_HMAC_SHA512));
        assert_eq!(token.key_id(), Some("enc"));
        assert_eq!(token.encrypted_key(), Some(""));
        assert_eq!(open(&token, &key), INNER.as_bytes());
    }

    #[rstest]
    #[case::a128(AES128_KEY_WRAP, 16, AES128_CBC_HMAC_SHA256)]
    #[case::a256(AES256_KEY_WRAP, 32, AES256_CBC_HMAC_SHA512)]
    fn key_wrap(#[case] algorithm: &str, #[case] key_length: usize, #[case] encryption: &str) {
        let key = SecurityKey::symmetric(vec![5; key_length]);
        let credentials = EncryptingCredentials::new(key.clone(), algorithm, encryption);
        let jwe = encrypt_token(INNER, &credentials).expect("encryption failed");

        let token = JsonWebToken::decode(&jwe).expect("decode failed");
        assert_eq!(token.key_id(), None);
        let wrapped = from_base64(token.encrypted_key().unwrap()).unwrap();
        let content_key = DefaultCryptoProviderFactory
            .create_key_wrap_provider(&key, algorithm)
            .unwrap()
            .unwrap_key(&wrapped)
            .expect("unwrap failed");
        assert_eq!(content_key.len() * 8, content_encryption_key_bits(encryption).unwrap());
        assert_eq!(open(&token, &SecurityKey::symmetric(content_key)), INNER.as_bytes());
    }

    #[test]
    fn fresh_content_key_per_token() {
        let credentials =
            EncryptingCredentials::new(SecurityKey::symmetric([5; 16]), AES128_KEY_WRAP, AES128_CBC_HMAC_SHA256);
        let first = encrypt_token(INNER, &credentials).unwrap();
        let second = encrypt_token(INNER, &credentials).unwrap();
        assert_ne!(first.split('.').nth(1), second.split('.').nth(1));
    }

    #[test]
    fn unsupported_content_encryption() {
        let credentials = EncryptingCredentials::new(SecurityKey::symmetric([5; 16]), AES128_KEY_WRAP, "A128GCM");
        let err = encrypt_token(INNER, &credentials).expect_err("encryption succeeded");
        assert!(matches!(err, EncryptionError::UnsupportedContentEncryption(_)));
        let message = err.to_string();
        for algorithm in CONTENT_ENCRYPTION_ALGORITHMS {
            assert!(message.contains(algorithm), "{message}");
        }
    }

    #[rstest]
    #[case::direct_wrong_key_size(DIRECT, AES256_CBC_HMAC_SHA512, 32)]
    #[case::key_wrap_wrong_key_size(AES256_KEY_WRAP, AES128_CBC_HMAC_SHA256, 16)]
    fn unsupported_algorithm(#[case] algorithm: &str, #[case] encryption: &str, #[case] key_length: usize) {
        let key = SecurityKey::symmetric(vec![5; key_length]);
        let credentials = EncryptingCredentials::new(key, algorithm, encryption);
        let err = encrypt_token(INNER, &credentials).expect_err("encryption succeeded");
        assert!(matches!(err, EncryptionError::UnsupportedAlgorithm { .. }));
    }

    #[test]
    fn no_crypto_provider() {
        let key = SecurityKey::symmetric([5; 32]).with_crypto_provider_factory(None);
        let credentials = EncryptingCredentials::new(key, DIRECT, AES128_CBC_HMAC_SHA256);
        let err = encrypt_token(INNER, &credentials).expect_err("encryption succeeded");
        assert!(matches!(err, EncryptionError::NoCryptoProvider(_)));
    }

    #[test]
    fn primitive_failure_keeps_cause() {
        #[derive(Debug)]
        struct FailingWrap;

        impl CryptoProviderFactory for FailingWrap {
            fn is_supported_algorithm(&self, _algorithm: &str, _key: &SecurityKey) -> bool {
                true
            }

            fn create_for_signing(
                &self,
                key: &SecurityKey,
                algorithm: &str,
            ) -> Result<Box<dyn crate::crypto::SignatureProvider>, CryptoError> {
                DefaultCryptoProviderFactory.create_for_signing(key, algorithm)
            }

            fn create_for_verifying(
                &self,
                key: &SecurityKey,
                algorithm: &str,
            ) -> Result<Box<dyn crate::crypto::SignatureProvider>, CryptoError> {
                DefaultCryptoProviderFactory.create_for_verifying(key, algorithm)
            }

            fn create_authenticated_encryption_provider(
                &self,
                key: &SecurityKey,
                algorithm: &str,
            ) -> Result<Box<dyn crate::crypto::AuthenticatedEncryptionProvider>, CryptoError> {
                DefaultCryptoProviderFactory.create_authenticated_encryption_provider(key, algorithm)
            }

            fn create_key_wrap_provider(
                &self,
                _key: &SecurityKey,
                _algorithm: &str,
            ) -> Result<Box<dyn crate::crypto::KeyWrapProvider>, CryptoError> {
                Err(CryptoError::KeyWrap("hardware module unavailable".into()))
            }
        }

        let credentials =
            EncryptingCredentials::new(SecurityKey::symmetric([5; 16]), AES128_KEY_WRAP, AES128_CBC_HMAC_SHA256)
                .with_crypto_provider_factory(std::sync::Arc::new(FailingWrap));
        let err = encrypt_token(INNER, &credentials).expect_err("encryption succeeded");
        assert!(matches!(err, EncryptionError::Primitive { .. }));
        let source = err.source().expect("no source");
        assert_eq!(source.to_string(), "key wrap failed: hardware module unavailable");
    }
}
