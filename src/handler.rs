use crate::{
    builder::TokenBuilder,
    codec::CompactDecoder,
    error::TokenError,
    header_cache::HeaderCache,
    key::{EncryptingCredentials, SigningCredentials},
    token::{JsonObject, JsonWebToken},
    validator::{ClaimValidators, DefaultClaimValidators, TokenValidationResult, TokenValidator, ValidationParameters},
};
use std::{num::NonZeroUsize, sync::Arc};

/// The default maximum number of nested actor tokens validated.
pub const DEFAULT_MAX_ACTOR_DEPTH: usize = 5;

/// Creates, reads, and validates JSON web tokens in compact serialization format.
#[derive(Clone, Debug)]
pub struct JsonWebTokenHandler {
    decoder: CompactDecoder,
    header_cache: Arc<HeaderCache>,
    claim_validators: Arc<dyn ClaimValidators>,
    max_actor_depth: usize,
}

impl Default for JsonWebTokenHandler {
    fn default() -> Self {
        Self {
            decoder: CompactDecoder::default(),
            header_cache: Default::default(),
            claim_validators: Arc::new(DefaultClaimValidators::default()),
            max_actor_depth: DEFAULT_MAX_ACTOR_DEPTH,
        }
    }
}

impl JsonWebTokenHandler {
    /// Construct a new handler using the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum size of the tokens this handler reads, in bytes.
    pub fn with_maximum_token_size(mut self, size: NonZeroUsize) -> Self {
        self.decoder.max_token_size = size.get();
        self
    }

    /// Use the given header cache, which can be shared with other handlers.
    pub fn with_header_cache(mut self, cache: Arc<HeaderCache>) -> Self {
        self.header_cache = cache;
        self
    }

    /// Use the given claim validators.
    pub fn with_claim_validators(mut self, validators: Arc<dyn ClaimValidators>) -> Self {
        self.claim_validators = validators;
        self
    }

    /// Set the maximum number of nested actor tokens validated.
    pub fn with_max_actor_depth(mut self, depth: usize) -> Self {
        self.max_actor_depth = depth;
        self
    }

    /// The maximum size of the tokens this handler reads, in bytes.
    pub fn maximum_token_size_in_bytes(&self) -> usize {
        self.decoder.max_token_size
    }

    /// The header cache used when creating tokens.
    pub fn header_cache(&self) -> &Arc<HeaderCache> {
        &self.header_cache
    }

    /// Check whether the given token is a well formed JWS or JWE.
    pub fn can_read(&self, token: &str) -> bool {
        self.decoder.can_read(token)
    }

    /// Create a signed token.
    pub fn create_token(
        &self,
        payload: JsonObject,
        signing_credentials: SigningCredentials,
    ) -> Result<String, TokenError> {
        TokenBuilder::new(payload).signing_credentials(signing_credentials).build(&self.header_cache)
    }

    /// Create a signed token and encrypt it.
    pub fn create_encrypted_token(
        &self,
        payload: JsonObject,
        signing_credentials: SigningCredentials,
        encrypting_credentials: EncryptingCredentials,
    ) -> Result<String, TokenError> {
        TokenBuilder::new(payload)
            .signing_credentials(signing_credentials)
            .encrypting_credentials(encrypting_credentials)
            .build(&self.header_cache)
    }

    /// Read a token without validating it.
    ///
    /// Only the header of an encrypted token is available.
    pub fn read_token(&self, token: &str) -> Result<JsonWebToken, TokenError> {
        Ok(self.decoder.decode(token)?)
    }

    /// Validate a token.
    pub fn validate_token(
        &self,
        token: &str,
        parameters: &ValidationParameters,
    ) -> Result<TokenValidationResult, TokenError> {
        let validator = TokenValidator {
            decoder: &self.decoder,
            validators: self.claim_validators.as_ref(),
            max_actor_depth: self.max_actor_depth,
        };
        validator.validate(token, parameters)
    }
}
