use super::{CryptoError, KeyWrapProvider};
use crate::algorithms::{AES128_KEY_WRAP, AES192_KEY_WRAP, AES256_KEY_WRAP};
use aes::{cipher::generic_array::GenericArray, Aes128, Aes192, Aes256};
use aes_kw::Kek;

// RFC 3394 adds a single 64 bit block to the wrapped key.
const SEMIBLOCK_SIZE: usize = 8;

/// The key size, in bytes, required by a key wrap algorithm.
pub(super) fn key_wrap_key_length(algorithm: &str) -> Option<usize> {
    match algorithm {
        AES128_KEY_WRAP => Some(16),
        AES192_KEY_WRAP => Some(24),
        AES256_KEY_WRAP => Some(32),
        _ => None,
    }
}

enum AnyKek {
    Aes128(Kek<Aes128>),
    Aes192(Kek<Aes192>),
    Aes256(Kek<Aes256>),
}

/// An `A*KW` key wrap provider.
pub(super) struct AesKeyWrapProvider {
    kek: AnyKek,
}

impl AesKeyWrapProvider {
    pub(super) fn new(algorithm: &str, key: &[u8]) -> Result<Self, CryptoError> {
        let expected = key_wrap_key_length(algorithm)
            .ok_or_else(|| CryptoError::KeyWrap(format!("unknown algorithm '{algorithm}'")))?;
        if key.len() != expected {
            return Err(CryptoError::InvalidKey(format!(
                "{algorithm} requires a {} bit key, got {}",
                expected * 8,
                key.len() * 8
            )));
        }
        let kek = match expected {
            16 => AnyKek::Aes128(Kek::new(GenericArray::from_slice(key))),
            24 => AnyKek::Aes192(Kek::new(GenericArray::from_slice(key))),
            _ => AnyKek::Aes256(Kek::new(GenericArray::from_slice(key))),
        };
        Ok(Self { kek })
    }
}

impl KeyWrapProvider for AesKeyWrapProvider {
    fn wrap_key(&self, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if key.len() < 2 * SEMIBLOCK_SIZE || key.len() % SEMIBLOCK_SIZE != 0 {
            return Err(CryptoError::KeyWrap(format!("cannot wrap a {} byte key", key.len())));
        }
        let mut output = vec![0; key.len() + SEMIBLOCK_SIZE];
        let result = match &self.kek {
            AnyKek::Aes128(kek) => kek.wrap(key, &mut output),
            AnyKek::Aes192(kek) => kek.wrap(key, &mut output),
            AnyKek::Aes256(kek) => kek.wrap(key, &mut output),
        };
        result.map_err(|e| CryptoError::KeyWrap(e.to_string()))?;
        Ok(output)
    }

    fn unwrap_key(&self, wrapped_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if wrapped_key.len() < 3 * SEMIBLOCK_SIZE || wrapped_key.len() % SEMIBLOCK_SIZE != 0 {
            return Err(CryptoError::KeyWrap(format!("cannot unwrap a {} byte key", wrapped_key.len())));
        }
        let mut output = vec![0; wrapped_key.len() - SEMIBLOCK_SIZE];
        let result = match &self.kek {
            AnyKek::Aes128(kek) => kek.unwrap(wrapped_key, &mut output),
            AnyKek::Aes192(kek) => kek.unwrap(wrapped_key, &mut output),
            AnyKek::Aes256(kek) => kek.unwrap(wrapped_key, &mut output),
        };
        result.map_err(|e| CryptoError::KeyWrap(e.to_string()))?;
        Ok(output)
    }
}
