use super::{
    aes_cbc_hmac::AesCbcHmacProvider,
    ecdsa::Secp256k1SignatureProvider,
    hmac::{HmacAlgorithm, HmacSignatureProvider},
    key_wrap::{key_wrap_key_length, AesKeyWrapProvider},
    AuthenticatedEncryptionProvider, CryptoError, CryptoProviderFactory, KeyWrapProvider, SignatureProvider,
};
use crate::{
    algorithms::{content_encryption_key_bits, ECDSA_SECP256K1_SHA256},
    key::{KeyMaterial, SecurityKey},
};

/// The crypto provider factory every key uses unless told otherwise.
///
/// Supports:
/// * `HS256`, `HS384` and `HS512` over symmetric keys.
/// * `ES256K` over secp256k1 keys. Public keys can only verify.
/// * `A128CBC-HS256`, `A192CBC-HS384` and `A256CBC-HS512` over symmetric keys of the size each one requires.
/// * `A128KW`, `A192KW` and `A256KW` over symmetric keys of the size each one requires.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCryptoProviderFactory;

impl DefaultCryptoProviderFactory {
    fn unsupported(algorithm: &str, key: &SecurityKey) -> CryptoError {
        CryptoError::UnsupportedAlgorithm { algorithm: algorithm.to_string(), key: key.to_string() }
    }

    fn symmetric<'a>(algorithm: &str, key: &'a SecurityKey) -> Result<&'a [u8], CryptoError> {
        match key.material() {
            KeyMaterial::Symmetric(bytes) => Ok(bytes.as_slice()),
            _ => Err(Self::unsupported(algorithm, key)),
        }
    }

    fn signature_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
        signing: bool,
    ) -> Result<Box<dyn SignatureProvider>, CryptoError> {
        if let Some(hmac) = HmacAlgorithm::from_name(algorithm) {
            let bytes = Self::symmetric(algorithm, key)?;
            return Ok(Box::new(HmacSignatureProvider::new(hmac, bytes)?));
        }
        if algorithm != ECDSA_SECP256K1_SHA256 {
            return Err(Self::unsupported(algorithm, key));
        }
        match key.material() {
            KeyMaterial::Secp256k1(key) => Ok(Box::new(Secp256k1SignatureProvider::signing(key.clone()))),
            KeyMaterial::Secp256k1Public(key) if !signing => {
                Ok(Box::new(Secp256k1SignatureProvider::verifying(key.clone())))
            }
            _ => Err(Self::unsupported(algorithm, key)),
        }
    }
}

impl CryptoProviderFactory for DefaultCryptoProviderFactory {
    fn is_supported_algorithm(&self, algorithm: &str, key: &SecurityKey) -> bool {
        match key.material() {
            KeyMaterial::Symmetric(bytes) => {
                if HmacAlgorithm::from_name(algorithm).is_some() {
                    !bytes.is_empty()
                } else if let Some(bits) = content_encryption_key_bits(algorithm) {
                    bytes.len() * 8 == bits
                } else if let Some(length) = key_wrap_key_length(algorithm) {
                    bytes.len() == length
                } else {
                    false
                }
            }
            KeyMaterial::Secp256k1(_) | KeyMaterial::Secp256k1Public(_) => algorithm == ECDSA_SECP256K1_SHA256,
        }
    }

    fn create_for_signing(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn SignatureProvider>, CryptoError> {
        self.signature_provider(key, algorithm, true)
    }

    fn create_for_verifying(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn SignatureProvider>, CryptoError> {
        self.signature_provider(key, algorithm, false)
    }

    fn create_authenticated_encryption_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn AuthenticatedEncryptionProvider>, CryptoError> {
        if content_encryption_key_bits(algorithm).is_none() {
            return Err(Self::unsupported(algorithm, key));
        }
        let bytes = Self::symmetric(algorithm, key)?;
        Ok(Box::new(AesCbcHmacProvider::new(algorithm, bytes)?))
    }

    fn create_key_wrap_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn KeyWrapProvider>, CryptoError> {
        if key_wrap_key_length(algorithm).is_none() {
            return Err(Self::unsupported(algorithm, key));
        }
        let bytes = Self::symmetric(algorithm, key)?;
        Ok(Box::new(AesKeyWrapProvider::new(algorithm, bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{
        AES128_CBC_HMAC_SHA256, AES128_KEY_WRAP, AES256_CBC_HMAC_SHA512, AES256_KEY_WRAP, HMAC_SHA256, HMAC_SHA512,
    };
    use k256::{ecdsa::SigningKey, SecretKey};
    use rstest::rstest;

    fn secp256k1() -> SigningKey {
        SecretKey::random(&mut rand::thread_rng()).into()
    }

    #[rstest]
    #[case::hmac(HMAC_SHA256, SecurityKey::symmetric([0; 16]), true)]
    #[case::hmac_any_size(HMAC_SHA512, SecurityKey::symmetric([0; 8]), true)]
    #[case::hmac_empty(HMAC_SHA256, SecurityKey::symmetric(Vec::<u8>::new()), false)]
    #[case::hmac_wrong_kind(HMAC_SHA256, SecurityKey::secp256k1(secp256k1()), false)]
    #[case::es256k(ECDSA_SECP256K1_SHA256, SecurityKey::secp256k1(secp256k1()), true)]
    #[case::es256k_public(ECDSA_SECP256K1_SHA256, SecurityKey::secp256k1_public(secp256k1().verifying_key().clone()), true)]
    #[case::es256k_symmetric(ECDSA_SECP256K1_SHA256, SecurityKey::symmetric([0; 32]), false)]
    #[case::cbc(AES128_CBC_HMAC_SHA256, SecurityKey::symmetric([0; 32]), true)]
    #[case::cbc_wrong_size(AES256_CBC_HMAC_SHA512, SecurityKey::symmetric([0; 32]), false)]
    #[case::key_wrap(AES128_KEY_WRAP, SecurityKey::symmetric([0; 16]), true)]
    #[case::key_wrap_wrong_size(AES256_KEY_WRAP, SecurityKey::symmetric([0; 16]), false)]
    #[case::unknown("RS256", SecurityKey::symmetric([0; 32]), false)]
    fn supported_algorithms(#[case] algorithm: &str, #[case] key: SecurityKey, #[case] expected: bool) {
        assert_eq!(DefaultCryptoProviderFactory.is_supported_algorithm(algorithm, &key), expected);
    }

    #[test]
    fn public_key_cannot_sign() {
        let key = SecurityKey::secp256k1_public(secp256k1().verifying_key().clone());
        let factory = DefaultCryptoProviderFactory;
        assert!(matches!(
            factory.create_for_signing(&key, ECDSA_SECP256K1_SHA256),
            Err(CryptoError::UnsupportedAlgorithm { .. })
        ));
        assert!(factory.create_for_verifying(&key, ECDSA_SECP256K1_SHA256).is_ok());
    }

    #[test]
    fn es256k_sign_verify() {
        let signing_key = secp256k1();
        let public = SecurityKey::secp256k1_public(signing_key.verifying_key().clone());
        let private = SecurityKey::secp256k1(signing_key);
        let factory = DefaultCryptoProviderFactory;

        let signature = factory.create_for_signing(&private, ECDSA_SECP256K1_SHA256).unwrap().sign(b"input").unwrap();
        let verifier = factory.create_for_verifying(&public, ECDSA_SECP256K1_SHA256).unwrap();
        assert!(verifier.verify(b"input", &signature).unwrap());
    }

    #[test]
    fn unsupported_error_does_not_leak_key() {
        let key = SecurityKey::symmetric(b"0123456789abcdef".to_vec());
        let err = DefaultCryptoProviderFactory.create_for_signing(&key, "RS256").err().expect("no error");
        assert_eq!(err.to_string(), "algorithm 'RS256' is not supported for symmetric key (128 bits)");
    }
}
