//! The cryptographic capability the handler delegates every primitive to.
//!
//! A [`CryptoProviderFactory`] answers which (algorithm, key) pairs it supports and hands out short lived
//! providers. Providers are always acquired through a [`ScopedProvider`], which gives them back to their
//! factory when it goes out of scope.

mod aes_cbc_hmac;
mod default;
mod ecdsa;
mod hmac;
mod key_wrap;

pub use default::DefaultCryptoProviderFactory;

use crate::key::SecurityKey;
use std::{fmt, ops::Deref};

/// The output of an authenticated encryption.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthenticatedEncryptionResult {
    /// The initialization vector used.
    pub iv: Vec<u8>,

    /// The ciphertext.
    pub ciphertext: Vec<u8>,

    /// The tag binding the ciphertext, the initialization vector, and the associated data together.
    pub authentication_tag: Vec<u8>,
}

/// Signs and verifies signatures using a single key and algorithm.
pub trait SignatureProvider: Send {
    /// Sign the given input.
    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verify a signature over the given input.
    fn verify(&self, input: &[u8], signature: &[u8]) -> Result<bool, CryptoError>;
}

/// Performs authenticated encryption using a single key and algorithm.
pub trait AuthenticatedEncryptionProvider: Send {
    /// Encrypt a plaintext binding it to the given associated data.
    fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<AuthenticatedEncryptionResult, CryptoError>;

    /// Decrypt a ciphertext, checking its authentication tag.
    fn decrypt(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
        iv: &[u8],
        authentication_tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;
}

/// Wraps and unwraps content encryption keys using a single key and algorithm.
pub trait KeyWrapProvider: Send {
    /// Wrap a key.
    fn wrap_key(&self, key: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Unwrap a wrapped key.
    fn unwrap_key(&self, wrapped_key: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// A factory of crypto providers.
pub trait CryptoProviderFactory: fmt::Debug + Send + Sync {
    /// Check whether the given algorithm can be used with the given key.
    fn is_supported_algorithm(&self, algorithm: &str, key: &SecurityKey) -> bool;

    /// Create a provider that can sign using the given key.
    fn create_for_signing(&self, key: &SecurityKey, algorithm: &str) -> Result<Box<dyn SignatureProvider>, CryptoError>;

    /// Create a provider that can verify signatures using the given key.
    fn create_for_verifying(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn SignatureProvider>, CryptoError>;

    /// Create an authenticated encryption provider.
    fn create_authenticated_encryption_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn AuthenticatedEncryptionProvider>, CryptoError>;

    /// Create a provider that can wrap keys.
    fn create_key_wrap_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn KeyWrapProvider>, CryptoError>;

    /// Create a provider that can unwrap keys.
    fn create_key_wrap_provider_for_unwrap(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn KeyWrapProvider>, CryptoError> {
        self.create_key_wrap_provider(key, algorithm)
    }

    /// Called when a signature provider is no longer in use.
    fn release_signature_provider(&self, _provider: &dyn SignatureProvider) {}

    /// Called when an authenticated encryption provider is no longer in use.
    fn release_authenticated_encryption_provider(&self, _provider: &dyn AuthenticatedEncryptionProvider) {}

    /// Called when a key wrap provider is no longer in use.
    fn release_key_wrap_provider(&self, _provider: &dyn KeyWrapProvider) {}
}

/// A provider that is released back to the factory that created it when dropped.
///
/// This is the only way the handler acquires providers, so every exit path releases them.
pub struct ScopedProvider<'a, P: ?Sized> {
    factory: &'a dyn CryptoProviderFactory,
    provider: Box<P>,
    release: fn(&dyn CryptoProviderFactory, &P),
}

impl<'a> ScopedProvider<'a, dyn SignatureProvider> {
    /// Acquire a signing provider.
    pub fn signing(
        factory: &'a dyn CryptoProviderFactory,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Self, CryptoError> {
        let provider = factory.create_for_signing(key, algorithm)?;
        Ok(Self { factory, provider, release: |factory, provider| factory.release_signature_provider(provider) })
    }

    /// Acquire a verification provider.
    pub fn verifying(
        factory: &'a dyn CryptoProviderFactory,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Self, CryptoError> {
        let provider = factory.create_for_verifying(key, algorithm)?;
        Ok(Self { factory, provider, release: |factory, provider| factory.release_signature_provider(provider) })
    }
}

impl<'a> ScopedProvider<'a, dyn AuthenticatedEncryptionProvider> {
    /// Acquire an authenticated encryption provider.
    pub fn authenticated_encryption(
        factory: &'a dyn CryptoProviderFactory,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Self, CryptoError> {
        let provider = factory.create_authenticated_encryption_provider(key, algorithm)?;
        Ok(Self {
            factory,
            provider,
            release: |factory, provider| factory.release_authenticated_encryption_provider(provider),
        })
    }
}

impl<'a> ScopedProvider<'a, dyn KeyWrapProvider> {
    /// Acquire a provider to wrap keys.
    pub fn key_wrap(
        factory: &'a dyn CryptoProviderFactory,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Self, CryptoError> {
        let provider = factory.create_key_wrap_provider(key, algorithm)?;
        Ok(Self { factory, provider, release: |factory, provider| factory.release_key_wrap_provider(provider) })
    }

    /// Acquire a provider to unwrap keys.
    pub fn key_unwrap(
        factory: &'a dyn CryptoProviderFactory,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Self, CryptoError> {
        let provider = factory.create_key_wrap_provider_for_unwrap(key, algorithm)?;
        Ok(Self { factory, provider, release: |factory, provider| factory.release_key_wrap_provider(provider) })
    }
}

impl<P: ?Sized> Deref for ScopedProvider<'_, P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.provider
    }
}

impl<P: ?Sized> Drop for ScopedProvider<'_, P> {
    fn drop(&mut self) {
        (self.release)(self.factory, &self.provider);
    }
}

/// An error raised by a crypto provider.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("algorithm '{algorithm}' is not supported for {key}")]
    UnsupportedAlgorithm { algorithm: String, key: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("authentication tag mismatch")]
    AuthenticationTagMismatch,

    #[error("key wrap failed: {0}")]
    KeyWrap(String),
}
