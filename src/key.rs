use crate::crypto::{CryptoProviderFactory, DefaultCryptoProviderFactory};
use k256::ecdsa::{SigningKey, VerifyingKey};
use std::{fmt, sync::Arc};

/// The kind of a key, which determines how its identifiers are compared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyKind {
    /// A plain key. Identifiers are compared ordinally.
    Standard,

    /// A key backed by an X.509 certificate. Identifiers are compared ignoring case.
    X509 {
        /// The certificate thumbprint.
        thumbprint: String,
    },
}

impl KeyKind {
    /// Compare two key identifiers according to this kind's comparison policy.
    pub fn identifiers_match(&self, left: &str, right: &str) -> bool {
        match self {
            Self::Standard => left == right,
            Self::X509 { .. } => left.eq_ignore_ascii_case(right),
        }
    }
}

/// The material backing a key.
#[derive(Clone)]
pub enum KeyMaterial {
    /// Raw symmetric key bytes.
    Symmetric(Vec<u8>),

    /// A secp256k1 private key, which can both sign and verify.
    Secp256k1(SigningKey),

    /// A secp256k1 public key, which can only verify.
    Secp256k1Public(VerifyingKey),
}

/// A key used to sign, verify, encrypt, decrypt, or wrap other keys.
#[derive(Clone)]
pub struct SecurityKey {
    key_id: Option<String>,
    kind: KeyKind,
    material: KeyMaterial,
    crypto_provider_factory: Option<Arc<dyn CryptoProviderFactory>>,
}

impl SecurityKey {
    /// Construct a key using the default crypto provider factory.
    pub fn new(material: KeyMaterial) -> Self {
        Self {
            key_id: None,
            kind: KeyKind::Standard,
            material,
            crypto_provider_factory: Some(Arc::new(DefaultCryptoProviderFactory)),
        }
    }

    /// Construct a symmetric key.
    pub fn symmetric<T: Into<Vec<u8>>>(bytes: T) -> Self {
        Self::new(KeyMaterial::Symmetric(bytes.into()))
    }

    /// Construct a secp256k1 private key.
    pub fn secp256k1(key: SigningKey) -> Self {
        Self::new(KeyMaterial::Secp256k1(key))
    }

    /// Construct a secp256k1 public key.
    pub fn secp256k1_public(key: VerifyingKey) -> Self {
        Self::new(KeyMaterial::Secp256k1Public(key))
    }

    /// Set the key identifier.
    pub fn with_key_id<T: Into<String>>(mut self, key_id: T) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Mark this key as backed by an X.509 certificate with the given thumbprint.
    pub fn with_x509_thumbprint<T: Into<String>>(mut self, thumbprint: T) -> Self {
        self.kind = KeyKind::X509 { thumbprint: thumbprint.into() };
        self
    }

    /// Set the crypto provider factory for this key. `None` leaves the key without any crypto capability.
    pub fn with_crypto_provider_factory(mut self, factory: Option<Arc<dyn CryptoProviderFactory>>) -> Self {
        self.crypto_provider_factory = factory;
        self
    }

    /// The key identifier.
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// The kind of this key.
    pub fn kind(&self) -> &KeyKind {
        &self.kind
    }

    /// The certificate thumbprint, if this is an X.509 key.
    pub fn x509_thumbprint(&self) -> Option<&str> {
        match &self.kind {
            KeyKind::X509 { thumbprint } => Some(thumbprint),
            KeyKind::Standard => None,
        }
    }

    /// The key material.
    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// The crypto provider factory for this key.
    pub fn crypto_provider_factory(&self) -> Option<&Arc<dyn CryptoProviderFactory>> {
        self.crypto_provider_factory.as_ref()
    }

    /// The size of this key, in bits.
    pub fn key_size_bits(&self) -> usize {
        match &self.material {
            KeyMaterial::Symmetric(bytes) => bytes.len() * 8,
            KeyMaterial::Secp256k1(_) | KeyMaterial::Secp256k1Public(_) => 256,
        }
    }

    /// Check whether this key's identifier matches the given one.
    pub fn matches_key_id(&self, key_id: &str) -> bool {
        self.key_id.as_deref().is_some_and(|own| self.kind.identifiers_match(own, key_id))
    }

    /// Check whether this key is the one identified by the given certificate thumbprint.
    ///
    /// The thumbprint is matched against the key identifier and, for X.509 keys, against the certificate
    /// thumbprint ignoring case.
    pub fn matches_thumbprint(&self, thumbprint: &str) -> bool {
        if self.matches_key_id(thumbprint) {
            return true;
        }
        self.x509_thumbprint().is_some_and(|own| own.eq_ignore_ascii_case(thumbprint))
    }
}

// Key material is never displayed, only public key bytes are.
impl fmt::Display for SecurityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.material {
            KeyMaterial::Symmetric(bytes) => write!(f, "symmetric key ({} bits)", bytes.len() * 8)?,
            KeyMaterial::Secp256k1(key) => {
                write!(f, "secp256k1 private key ({})", hex::encode(key.verifying_key().to_sec1_bytes()))?
            }
            KeyMaterial::Secp256k1Public(key) => {
                write!(f, "secp256k1 public key ({})", hex::encode(key.to_sec1_bytes()))?
            }
        };
        if let KeyKind::X509 { thumbprint } = &self.kind {
            write!(f, ", x5t: {thumbprint}")?;
        }
        match &self.key_id {
            Some(key_id) => write!(f, ", kid: {key_id}"),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for SecurityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityKey")
            .field("key_id", &self.key_id)
            .field("kind", &self.kind)
            .field("key", &self.to_string())
            .field("crypto_provider_factory", &self.crypto_provider_factory)
            .finish()
    }
}

/// The key and algorithm used to sign a token.
#[derive(Clone, Debug)]
pub struct SigningCredentials {
    /// The key to sign with.
    pub key: SecurityKey,

    /// The signing algorithm.
    pub algorithm: String,

    /// A factory that takes precedence over the key's own one.
    pub crypto_provider_factory: Option<Arc<dyn CryptoProviderFactory>>,
}

impl SigningCredentials {
    /// Construct new signing credentials.
    pub fn new<T: Into<String>>(key: SecurityKey, algorithm: T) -> Self {
        Self { key, algorithm: algorithm.into(), crypto_provider_factory: None }
    }

    /// Set the crypto provider factory to use instead of the key's own one.
    pub fn with_crypto_provider_factory(mut self, factory: Arc<dyn CryptoProviderFactory>) -> Self {
        self.crypto_provider_factory = Some(factory);
        self
    }

    pub(crate) fn effective_crypto_provider_factory(&self) -> Option<&Arc<dyn CryptoProviderFactory>> {
        self.crypto_provider_factory.as_ref().or(self.key.crypto_provider_factory())
    }
}

/// The key and algorithms used to encrypt a token.
#[derive(Clone, Debug)]
pub struct EncryptingCredentials {
    /// The key to encrypt with, either directly or by wrapping a generated content encryption key.
    pub key: SecurityKey,

    /// The key management algorithm (`alg`).
    pub algorithm: String,

    /// The content encryption algorithm (`enc`).
    pub encryption: String,

    /// A factory that takes precedence over the key's own one.
    pub crypto_provider_factory: Option<Arc<dyn CryptoProviderFactory>>,
}

impl EncryptingCredentials {
    /// Construct new encrypting credentials.
    pub fn new<A, E>(key: SecurityKey, algorithm: A, encryption: E) -> Self
    where
        A: Into<String>,
        E: Into<String>,
    {
        Self { key, algorithm: algorithm.into(), encryption: encryption.into(), crypto_provider_factory: None }
    }

    /// Set the crypto provider factory to use instead of the key's own one.
    pub fn with_crypto_provider_factory(mut self, factory: Arc<dyn CryptoProviderFactory>) -> Self {
        self.crypto_provider_factory = Some(factory);
        self
    }

    pub(crate) fn effective_crypto_provider_factory(&self) -> Option<&Arc<dyn CryptoProviderFactory>> {
        self.crypto_provider_factory.as_ref().or(self.key.crypto_provider_factory())
    }
}
