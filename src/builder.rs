use crate::{
    algorithms::NONE,
    codec::{to_base64, to_base64_json},
    crypto::ScopedProvider,
    encryption::encrypt_token,
    error::TokenError,
    header_cache::HeaderCache,
    key::{EncryptingCredentials, SigningCredentials},
    token::{JsonObject, JwtHeader},
};

// Turns a builder field that was never set into an error.
macro_rules! try_get {
    ($option:ident) => {
        $option.ok_or(TokenError::MissingArgument(stringify!($option)))
    };
}

/// A compact token builder.
///
/// The token is signed and, if encrypting credentials are set, the signed token is then encrypted.
#[derive(Clone, Debug)]
pub struct TokenBuilder {
    payload: JsonObject,
    signing_credentials: Option<SigningCredentials>,
    encrypting_credentials: Option<EncryptingCredentials>,
}

impl TokenBuilder {
    /// Construct a new builder for the given claims.
    pub fn new(payload: JsonObject) -> Self {
        Self { payload, signing_credentials: Default::default(), encrypting_credentials: Default::default() }
    }

    /// Set the credentials used to sign the token.
    pub fn signing_credentials(mut self, credentials: SigningCredentials) -> Self {
        self.signing_credentials = Some(credentials);
        self
    }

    /// Set the credentials used to encrypt the signed token.
    pub fn encrypting_credentials(mut self, credentials: EncryptingCredentials) -> Self {
        self.encrypting_credentials = Some(credentials);
        self
    }

    /// Build the token, taking the encoded header out of the given cache.
    pub fn build(self, header_cache: &HeaderCache) -> Result<String, TokenError> {
        let Self { payload, signing_credentials, encrypting_credentials } = self;
        let signing_credentials = try_get!(signing_credentials)?;

        let header = header_cache.get_or_encode(&signing_credentials).map_err(|e| TokenError::Encoding("header", e))?;
        let message = format!("{header}.{}", encode_payload(&payload)?);
        let signature = sign(&message, &signing_credentials)?;
        encrypt(format!("{message}.{signature}"), encrypting_credentials)
    }

    /// Build an unsigned token, ignoring any signing credentials.
    ///
    /// The token is still encrypted if encrypting credentials are set.
    pub fn build_unsigned(self) -> Result<String, TokenError> {
        let Self { payload, encrypting_credentials, .. } = self;
        let header = to_base64_json(&JwtHeader::signed(NONE, None)).map_err(|e| TokenError::Encoding("header", e))?;
        encrypt(format!("{header}.{}.", encode_payload(&payload)?), encrypting_credentials)
    }
}

fn encode_payload(payload: &JsonObject) -> Result<String, TokenError> {
    to_base64_json(payload).map_err(|e| TokenError::Encoding("payload", e))
}

fn encrypt(token: String, credentials: Option<EncryptingCredentials>) -> Result<String, TokenError> {
    match credentials {
        Some(credentials) => Ok(encrypt_token(&token, &credentials)?),
        None => Ok(token),
    }
}

/// Sign a `header.payload` message, returning the base64url encoded signature.
pub(crate) fn sign(message: &str, credentials: &SigningCredentials) -> Result<String, TokenError> {
    let key = &credentials.key;
    let algorithm = &credentials.algorithm;
    let factory = credentials
        .effective_crypto_provider_factory()
        .ok_or_else(|| TokenError::InvalidOperation(format!("no crypto provider factory available for {key}")))?;
    if !factory.is_supported_algorithm(algorithm, key) {
        return Err(TokenError::UnsupportedAlgorithm { algorithm: algorithm.clone(), key: key.to_string() });
    }
    let provider = ScopedProvider::signing(&**factory, key, algorithm)
        .map_err(|e| TokenError::InvalidOperation(format!("cannot create {algorithm} signature provider: {e}")))?;
    let signature = provider.sign(message.as_bytes()).map_err(TokenError::SigningFailed)?;
    Ok(to_base64(signature))
}
