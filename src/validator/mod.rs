mod claims;
pub mod error;
mod replay;
mod temporal;


use crate::{
    codec::{CompactDecoder, TokenKind},
    crypto::CryptoProviderFactory,
    decryption::decrypt_token,
    error::TokenError,
    key::SecurityKey,
    signature::validate_signature,
    token::{InvalidNumericDate, JsonWebToken},
};
use chrono::TimeDelta;
use std::{fmt, sync::Arc};
use tracing::debug;

pub use claims::{ClaimValidators, DefaultClaimValidators, SystemClockTimeProvider, TimeProvider};
pub use error::{ClaimValidationError, ClaimValidationKind};
pub use replay::{InMemoryTokenReplayCache, TokenReplayCache};

const DEFAULT_CLOCK_SKEW_SECONDS: i64 = 300;
const DEFAULT_MINIMUM_SYMMETRIC_KEY_SIZE_BITS: usize = 128;

/// Resolves the keys to try for a token.
///
/// This is invoked with the raw token, the decoded token, its `kid` header, and the parameters in use. Returning `None`
/// makes validation fall back to every configured key.
pub type KeyResolver =
    Arc<dyn Fn(&str, &JsonWebToken, Option<&str>, &ValidationParameters) -> Option<Vec<SecurityKey>> + Send + Sync>;

/// Replaces signature validation altogether. Must return the validated JWS.
pub type SignatureValidator = Arc<dyn Fn(&str, &ValidationParameters) -> Option<JsonWebToken> + Send + Sync>;

/// Replaces decoding of the token before its signature is validated. Must return a JWS.
pub type TokenReader = Arc<dyn Fn(&str, &ValidationParameters) -> Option<JsonWebToken> + Send + Sync>;

/// Parameters to be used during validation.
#[derive(Clone)]
pub struct ValidationParameters {
    /// The key that signs tokens.
    pub issuer_signing_key: Option<SecurityKey>,

    /// More keys that sign tokens. These are looked at after `issuer_signing_key`.
    pub issuer_signing_keys: Vec<SecurityKey>,

    /// The key that encrypts tokens.
    pub token_decryption_key: Option<SecurityKey>,

    /// More keys that encrypt tokens. These are looked at after `token_decryption_key`.
    pub token_decryption_keys: Vec<SecurityKey>,

    /// Overrides how signing keys are looked up.
    pub issuer_signing_key_resolver: Option<KeyResolver>,

    /// Overrides how decryption keys are looked up.
    pub token_decryption_key_resolver: Option<KeyResolver>,

    pub signature_validator: Option<SignatureValidator>,

    pub token_reader: Option<TokenReader>,

    /// The crypto provider factory to use instead of each key's own.
    pub crypto_provider_factory: Option<Arc<dyn CryptoProviderFactory>>,

    /// Whether unsigned tokens are rejected.
    pub require_signed_tokens: bool,

    /// Whether the token in the `actort` claim is validated as well.
    pub validate_actor: bool,

    /// The parameters the actor token is validated with. These default to the parameters themselves.
    pub actor_validation_parameters: Option<Box<ValidationParameters>>,

    pub validate_lifetime: bool,

    pub require_expiration_time: bool,

    /// The tolerance applied when checking `nbf` and `exp`.
    pub clock_skew: TimeDelta,

    pub validate_audience: bool,

    pub valid_audiences: Vec<String>,

    pub validate_issuer: bool,

    pub valid_issuers: Vec<String>,

    /// The cache used to detect replays. Replays aren't checked if this is not set.
    pub token_replay_cache: Option<Arc<dyn TokenReplayCache>>,

    /// Whether the key that verified the signature is checked.
    pub validate_issuer_signing_key: bool,

    /// The minimum size of a symmetric signing key, checked when `validate_issuer_signing_key` is set.
    pub minimum_symmetric_key_size_bits: usize,
}

impl Default for ValidationParameters {
    fn default() -> Self {
        Self {
            issuer_signing_key: None,
            issuer_signing_keys: Vec::new(),
            token_decryption_key: None,
            token_decryption_keys: Vec::new(),
            issuer_signing_key_resolver: None,
            token_decryption_key_resolver: None,
            signature_validator: None,
            token_reader: None,
            crypto_provider_factory: None,
            require_signed_tokens: true,
            validate_actor: false,
            actor_validation_parameters: None,
            validate_lifetime: true,
            require_expiration_time: false,
            clock_skew: TimeDelta::seconds(DEFAULT_CLOCK_SKEW_SECONDS),
            validate_audience: true,
            valid_audiences: Vec::new(),
            validate_issuer: true,
            valid_issuers: Vec::new(),
            token_replay_cache: None,
            validate_issuer_signing_key: false,
            minimum_symmetric_key_size_bits: DEFAULT_MINIMUM_SYMMETRIC_KEY_SIZE_BITS,
        }
    }
}

impl ValidationParameters {
    /// Set the key that signs tokens.
    pub fn with_issuer_signing_key(mut self, key: SecurityKey) -> Self {
        self.issuer_signing_key = Some(key);
        self
    }

    /// Set the list of keys that sign tokens.
    pub fn with_issuer_signing_keys<I: IntoIterator<Item = SecurityKey>>(mut self, keys: I) -> Self {
        self.issuer_signing_keys = keys.into_iter().collect();
        self
    }

    /// Set the key that encrypts tokens.
    pub fn with_token_decryption_key(mut self, key: SecurityKey) -> Self {
        self.token_decryption_key = Some(key);
        self
    }

    /// Set the list of keys that encrypt tokens.
    pub fn with_token_decryption_keys<I: IntoIterator<Item = SecurityKey>>(mut self, keys: I) -> Self {
        self.token_decryption_keys = keys.into_iter().collect();
        self
    }

    pub fn with_issuer_signing_key_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str, &JsonWebToken, Option<&str>, &ValidationParameters) -> Option<Vec<SecurityKey>>
            + Send
            + Sync
            + 'static,
    {
        self.issuer_signing_key_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_token_decryption_key_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str, &JsonWebToken, Option<&str>, &ValidationParameters) -> Option<Vec<SecurityKey>>
            + Send
            + Sync
            + 'static,
    {
        self.token_decryption_key_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_signature_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str, &ValidationParameters) -> Option<JsonWebToken> + Send + Sync + 'static,
    {
        self.signature_validator = Some(Arc::new(validator));
        self
    }

    pub fn with_token_reader<F>(mut self, reader: F) -> Self
    where
        F: Fn(&str, &ValidationParameters) -> Option<JsonWebToken> + Send + Sync + 'static,
    {
        self.token_reader = Some(Arc::new(reader));
        self
    }

    /// Validate actor tokens using the given parameters.
    pub fn with_actor_validation_parameters(mut self, parameters: ValidationParameters) -> Self {
        self.validate_actor = true;
        self.actor_validation_parameters = Some(Box::new(parameters));
        self
    }

    /// Set the audiences a token can be issued for.
    pub fn with_valid_audiences<I, T>(mut self, audiences: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.valid_audiences = audiences.into_iter().map(Into::into).collect();
        self
    }

    /// Set the issuers tokens are trusted from.
    pub fn with_valid_issuers<I, T>(mut self, issuers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.valid_issuers = issuers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_token_replay_cache(mut self, cache: Arc<dyn TokenReplayCache>) -> Self {
        self.token_replay_cache = Some(cache);
        self
    }
}

impl fmt::Debug for ValidationParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationParameters")
            .field("issuer_signing_key", &self.issuer_signing_key)
            .field("issuer_signing_keys", &self.issuer_signing_keys)
            .field("token_decryption_key", &self.token_decryption_key)
            .field("token_decryption_keys", &self.token_decryption_keys)
            .field("issuer_signing_key_resolver", &self.issuer_signing_key_resolver.is_some())
            .field("token_decryption_key_resolver", &self.token_decryption_key_resolver.is_some())
            .field("signature_validator", &self.signature_validator.is_some())
            .field("token_reader", &self.token_reader.is_some())
            .field("crypto_provider_factory", &self.crypto_provider_factory)
            .field("require_signed_tokens", &self.require_signed_tokens)
            .field("validate_actor", &self.validate_actor)
            .field("actor_validation_parameters", &self.actor_validation_parameters)
            .field("validate_lifetime", &self.validate_lifetime)
            .field("require_expiration_time", &self.require_expiration_time)
            .field("clock_skew", &self.clock_skew)
            .field("validate_audience", &self.validate_audience)
            .field("valid_audiences", &self.valid_audiences)
            .field("validate_issuer", &self.validate_issuer)
            .field("valid_issuers", &self.valid_issuers)
            .field("token_replay_cache", &self.token_replay_cache.is_some())
            .field("validate_issuer_signing_key", &self.validate_issuer_signing_key)
            .field("minimum_symmetric_key_size_bits", &self.minimum_symmetric_key_size_bits)
            .finish()
    }
}

/// A validated token.
#[derive(Clone, Debug)]
pub struct TokenValidationResult {
    /// The token. For a JWE this is the encrypted token, with the decrypted token attached to it.
    pub token: JsonWebToken,

    /// The issuer reported by the issuer validation.
    pub issuer: Option<String>,
}

/// Runs the full validation of a token: decryption, signature and claims.
pub(crate) struct TokenValidator<'a> {
    pub(crate) decoder: &'a CompactDecoder,
    pub(crate) validators: &'a dyn ClaimValidators,
    pub(crate) max_actor_depth: usize,
}

impl TokenValidator<'_> {
    /// Validate a token.
    pub(crate) fn validate(
        &self,
        raw: &str,
        parameters: &ValidationParameters,
    ) -> Result<TokenValidationResult, TokenError> {
        self.validate_at_depth(raw, parameters, 0)
    }

    fn validate_at_depth(
        &self,
        raw: &str,
        parameters: &ValidationParameters,
        depth: usize,
    ) -> Result<TokenValidationResult, TokenError> {
        // The token is framed before doing any crypto work so malformed inputs are rejected upfront.
        match self.decoder.classify(raw)? {
            TokenKind::Jwe => {
                let mut token = self.decoder.decode(raw)?;
                let plaintext = decrypt_token(&token, parameters)?;
                let inner = validate_signature(&plaintext, self.decoder, parameters)?;
                let issuer = self.validate_claims(&inner, parameters, depth)?;
                token.set_inner_token(inner);
                Ok(TokenValidationResult { token, issuer })
            }
            TokenKind::Jws => {
                let token = validate_signature(raw, self.decoder, parameters)?;
                let issuer = self.validate_claims(&token, parameters, depth)?;
                Ok(TokenValidationResult { token, issuer })
            }
        }
    }

    fn validate_claims(
        &self,
        token: &JsonWebToken,
        parameters: &ValidationParameters,
        depth: usize,
    ) -> Result<Option<String>, TokenError> {
        let not_before = token.valid_from().map_err(malformed_lifetime)?;
        let expires = token.valid_to().map_err(malformed_lifetime)?;
        self.validators.validate_lifetime(not_before, expires, token, parameters)?;
        self.validators.validate_audience(&token.audiences(), token, parameters)?;
        let issuer = self.validators.validate_issuer(token.issuer(), token, parameters)?;
        self.validators.validate_token_replay(expires, token.encoded_token(), parameters)?;

        if let Some(actor) = token.actor().filter(|actor| parameters.validate_actor && !actor.trim().is_empty()) {
            if depth >= self.max_actor_depth {
                return Err(TokenError::ActorChainTooDeep(self.max_actor_depth));
            }
            debug!("validating actor token at depth {}", depth + 1);
            let actor_parameters = parameters.actor_validation_parameters.as_deref().unwrap_or(parameters);
            self.validate_at_depth(actor, actor_parameters, depth + 1)?;
        }

        self.validators.validate_issuer_signing_key(token.signing_key(), token, parameters)?;
        Ok(issuer)
    }
}

fn malformed_lifetime(e: InvalidNumericDate) -> ClaimValidationError {
    debug!("rejecting token: {e}");
    ClaimValidationKind::MalformedLifetime.into()
}
