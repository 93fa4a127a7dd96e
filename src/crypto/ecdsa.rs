use super::{CryptoError, SignatureProvider};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use signature::{Signer as _, Verifier as _};

/// An `ES256K` signature provider.
///
/// Providers built from a public key can only verify.
pub(super) struct Secp256k1SignatureProvider {
    signing_key: Option<SigningKey>,
    verifying_key: VerifyingKey,
}

impl Secp256k1SignatureProvider {
    pub(super) fn signing(key: SigningKey) -> Self {
        let verifying_key = key.verifying_key().clone();
        Self { signing_key: Some(key), verifying_key }
    }

    pub(super) fn verifying(key: VerifyingKey) -> Self {
        Self { signing_key: None, verifying_key: key }
    }
}

impl SignatureProvider for Secp256k1SignatureProvider {
    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = self.signing_key.as_ref().ok_or_else(|| CryptoError::Signing("no private key".into()))?;
        let signature: Signature = key.try_sign(input).map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }

    fn verify(&self, input: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        let signature = Signature::try_from(signature).map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
        Ok(self.verifying_key.verify(input, &signature).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::SecretKey;

    fn signing_key() -> SigningKey {
        SecretKey::random(&mut rand::thread_rng()).into()
    }

    #[test]
    fn sign_verify() {
        let key = signing_key();
        let provider = Secp256k1SignatureProvider::signing(key.clone());
        let signature = provider.sign(b"message").expect("signing failed");
        assert_eq!(signature.len(), 64);
        assert!(provider.verify(b"message", &signature).unwrap());
        assert!(!provider.verify(b"tampered", &signature).unwrap());

        let provider = Secp256k1SignatureProvider::verifying(key.verifying_key().clone());
        assert!(provider.verify(b"message", &signature).unwrap());
    }

    #[test]
    fn public_key_cannot_sign() {
        let provider = Secp256k1SignatureProvider::verifying(signing_key().verifying_key().clone());
        assert!(matches!(provider.sign(b"message"), Err(CryptoError::Signing(_))));
    }

    #[test]
    fn malformed_signature() {
        let provider = Secp256k1SignatureProvider::signing(signing_key());
        assert!(matches!(provider.verify(b"message", b"short"), Err(CryptoError::MalformedSignature(_))));
    }

    #[test]
    fn other_key_does_not_verify() {
        let signature = Secp256k1SignatureProvider::signing(signing_key()).sign(b"message").unwrap();
        let provider = Secp256k1SignatureProvider::signing(signing_key());
        assert!(!provider.verify(b"message", &signature).unwrap());
    }
}
