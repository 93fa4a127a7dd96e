//! `AES_CBC_HMAC_SHA2` authenticated encryption, as defined in RFC 7518 section 5.2.

use super::{hmac::HmacAlgorithm, AuthenticatedEncryptionProvider, AuthenticatedEncryptionResult, CryptoError};
use crate::algorithms::{AES128_CBC_HMAC_SHA256, AES192_CBC_HMAC_SHA384, AES256_CBC_HMAC_SHA512};
use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use subtle::ConstantTimeEq;

const IV_LENGTH: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
enum AesVariant {
    Aes128,
    Aes192,
    Aes256,
}

/// An authenticated encryption provider for the `A*CBC-HS*` family.
pub(super) struct AesCbcHmacProvider {
    aes: AesVariant,
    mac: HmacAlgorithm,
    mac_key: Vec<u8>,
    encryption_key: Vec<u8>,
}

impl AesCbcHmacProvider {
    pub(super) fn new(algorithm: &str, key: &[u8]) -> Result<Self, CryptoError> {
        let (aes, mac, key_length) = match algorithm {
            AES128_CBC_HMAC_SHA256 => (AesVariant::Aes128, HmacAlgorithm::Sha256, 32),
            AES192_CBC_HMAC_SHA384 => (AesVariant::Aes192, HmacAlgorithm::Sha384, 48),
            AES256_CBC_HMAC_SHA512 => (AesVariant::Aes256, HmacAlgorithm::Sha512, 64),
            _ => return Err(CryptoError::Encryption(format!("unknown algorithm '{algorithm}'"))),
        };
        if key.len() != key_length {
            return Err(CryptoError::InvalidKey(format!(
                "{algorithm} requires a {} bit key, got {}",
                key_length * 8,
                key.len() * 8
            )));
        }
        let (mac_key, encryption_key) = key.split_at(key_length / 2);
        Ok(Self { aes, mac, mac_key: mac_key.to_vec(), encryption_key: encryption_key.to_vec() })
    }

    fn compute_tag(&self, associated_data: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let associated_data_bits = (associated_data.len() as u64 * 8).to_be_bytes();
        let mut tag = self.mac.compute(&self.mac_key, &[associated_data, iv, ciphertext, &associated_data_bits])?;
        tag.truncate(self.mac_key.len());
        Ok(tag)
    }

    fn cbc_encrypt(&self, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = &self.encryption_key;
        let invalid = |e: aes::cipher::InvalidLength| CryptoError::InvalidKey(e.to_string());
        let ciphertext = match self.aes {
            AesVariant::Aes128 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
                .map_err(invalid)?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            AesVariant::Aes192 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
                .map_err(invalid)?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            AesVariant::Aes256 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
                .map_err(invalid)?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        };
        Ok(ciphertext)
    }

    fn cbc_decrypt(&self, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = &self.encryption_key;
        let invalid = |e: aes::cipher::InvalidLength| CryptoError::Decryption(e.to_string());
        let plaintext = match self.aes {
            AesVariant::Aes128 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
                .map_err(invalid)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            AesVariant::Aes192 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
                .map_err(invalid)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            AesVariant::Aes256 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
                .map_err(invalid)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        };
        plaintext.map_err(|_| CryptoError::Decryption("invalid padding".into()))
    }
}

impl AuthenticatedEncryptionProvider for AesCbcHmacProvider {
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<AuthenticatedEncryptionResult, CryptoError> {
        let mut iv = vec![0; IV_LENGTH];
        rand::thread_rng().fill_bytes(&mut iv);
        let ciphertext = self.cbc_encrypt(&iv, plaintext)?;
        let authentication_tag = self.compute_tag(associated_data, &iv, &ciphertext)?;
        Ok(AuthenticatedEncryptionResult { iv, ciphertext, authentication_tag })
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
        iv: &[u8],
        authentication_tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let expected_tag = self.compute_tag(associated_data, iv, ciphertext)?;
        if !bool::from(expected_tag.ct_eq(authentication_tag)) {
            return Err(CryptoError::AuthenticationTagMismatch);
        }
        self.cbc_decrypt(iv, ciphertext)
    }
}
