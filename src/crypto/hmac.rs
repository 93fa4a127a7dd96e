use super::{CryptoError, SignatureProvider};
use crate::algorithms::{HMAC_SHA256, HMAC_SHA384, HMAC_SHA512};
use hmac::{digest::KeyInit, Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) enum HmacAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HmacAlgorithm {
    pub(super) fn from_name(name: &str) -> Option<Self> {
        match name {
            HMAC_SHA256 => Some(Self::Sha256),
            HMAC_SHA384 => Some(Self::Sha384),
            HMAC_SHA512 => Some(Self::Sha512),
            _ => None,
        }
    }

    pub(super) fn compute(self, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, CryptoError> {
        match self {
            Self::Sha256 => compute::<Hmac<Sha256>>(key, parts),
            Self::Sha384 => compute::<Hmac<Sha384>>(key, parts),
            Self::Sha512 => compute::<Hmac<Sha512>>(key, parts),
        }
    }

    fn verify(self, key: &[u8], input: &[u8], tag: &[u8]) -> Result<bool, CryptoError> {
        match self {
            Self::Sha256 => verify::<Hmac<Sha256>>(key, input, tag),
            Self::Sha384 => verify::<Hmac<Sha384>>(key, input, tag),
            Self::Sha512 => verify::<Hmac<Sha512>>(key, input, tag),
        }
    }
}

fn compute<M: Mac + KeyInit>(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, CryptoError> {
    let mut mac = <M as KeyInit>::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

fn verify<M: Mac + KeyInit>(key: &[u8], input: &[u8], tag: &[u8]) -> Result<bool, CryptoError> {
    let mut mac = <M as KeyInit>::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(input);
    // Constant time comparison.
    Ok(mac.verify_slice(tag).is_ok())
}

/// A signature provider for the HMAC family.
pub(super) struct HmacSignatureProvider {
    algorithm: HmacAlgorithm,
    key: Vec<u8>,
}

impl HmacSignatureProvider {
    pub(super) fn new(algorithm: HmacAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        if key.is_empty() {
            return Err(CryptoError::InvalidKey("empty HMAC key".into()));
        }
        Ok(Self { algorithm, key: key.to_vec() })
    }
}

impl SignatureProvider for HmacSignatureProvider {
    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.algorithm.compute(&self.key, &[input])
    }

    fn verify(&self, input: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        self.algorithm.verify(&self.key, input, signature)
    }
}
