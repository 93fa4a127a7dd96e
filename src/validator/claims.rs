use super::{
    error::{ClaimValidationError, ClaimValidationKind},
    temporal, ValidationParameters,
};
use crate::{
    key::{KeyMaterial, SecurityKey},
    token::JsonWebToken,
};
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::debug;

/// The claim level validations run on a token once its signature has been validated.
///
/// These are invoked in declaration order, and any error they return is surfaced to the caller as is.
pub trait ClaimValidators: fmt::Debug + Send + Sync {
    /// Validate the token's `nbf` and `exp` claims.
    fn validate_lifetime(
        &self,
        not_before: Option<DateTime<Utc>>,
        expires: Option<DateTime<Utc>>,
        token: &JsonWebToken,
        parameters: &ValidationParameters,
    ) -> Result<(), ClaimValidationError>;

    /// Validate the token's `aud` claim.
    fn validate_audience(
        &self,
        audiences: &[&str],
        token: &JsonWebToken,
        parameters: &ValidationParameters,
    ) -> Result<(), ClaimValidationError>;

    /// Validate the token's `iss` claim, returning the issuer to report.
    fn validate_issuer(
        &self,
        issuer: Option<&str>,
        token: &JsonWebToken,
        parameters: &ValidationParameters,
    ) -> Result<Option<String>, ClaimValidationError>;

    /// Make sure the token isn't being replayed.
    fn validate_token_replay(
        &self,
        expires: Option<DateTime<Utc>>,
        raw: &str,
        parameters: &ValidationParameters,
    ) -> Result<(), ClaimValidationError>;

    /// Validate the key that verified the token's signature.
    fn validate_issuer_signing_key(
        &self,
        key: Option<&SecurityKey>,
        token: &JsonWebToken,
        parameters: &ValidationParameters,
    ) -> Result<(), ClaimValidationError>;
}

/// A source of the current time.
pub trait TimeProvider: fmt::Debug + Send + Sync + 'static {
    fn current_time(&self) -> DateTime<Utc>;
}

/// A time provider backed by the system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClockTimeProvider;

impl TimeProvider for SystemClockTimeProvider {
    fn current_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The claim validators used unless told otherwise.
#[derive(Debug)]
pub struct DefaultClaimValidators {
    time_provider: Box<dyn TimeProvider>,
}

impl DefaultClaimValidators {
    /// Construct validators that use the given time provider.
    pub fn new(time_provider: Box<dyn TimeProvider>) -> Self {
        Self { time_provider }
    }
}

impl Default for DefaultClaimValidators {
    fn default() -> Self {
        Self::new(Box::new(SystemClockTimeProvider))
    }
}

impl ClaimValidators for DefaultClaimValidators {
    fn validate_lifetime(
        &self,
        not_before: Option<DateTime<Utc>>,
        expires: Option<DateTime<Utc>>,
        _token: &JsonWebToken,
        parameters: &ValidationParameters,
    ) -> Result<(), ClaimValidationError> {
        temporal::validate_lifetime(not_before, expires, self.time_provider.current_time(), parameters)
    }

    fn validate_audience(
        &self,
        audiences: &[&str],
        _token: &JsonWebToken,
        parameters: &ValidationParameters,
    ) -> Result<(), ClaimValidationError> {
        if !parameters.validate_audience {
            return Ok(());
        }
        validate_condition(!parameters.valid_audiences.is_empty(), ClaimValidationKind::NoValidAudiences)?;
        validate_condition(!audiences.is_empty(), ClaimValidationKind::MissingAudience)?;
        let valid = audiences.iter().any(|audience| parameters.valid_audiences.iter().any(|valid| valid == audience));
        validate_condition(valid, ClaimValidationKind::InvalidAudience)
    }

    fn validate_issuer(
        &self,
        issuer: Option<&str>,
        _token: &JsonWebToken,
        parameters: &ValidationParameters,
    ) -> Result<Option<String>, ClaimValidationError> {
        if !parameters.validate_issuer {
            return Ok(issuer.map(ToString::to_string));
        }
        let issuer = issuer.filter(|issuer| !issuer.is_empty()).ok_or(ClaimValidationKind::MissingIssuer)?;
        validate_condition(!parameters.valid_issuers.is_empty(), ClaimValidationKind::NoValidIssuers)?;
        let valid = parameters.valid_issuers.iter().any(|valid| valid == issuer);
        validate_condition(valid, ClaimValidationKind::InvalidIssuer)?;
        Ok(Some(issuer.to_string()))
    }

    fn validate_token_replay(
        &self,
        expires: Option<DateTime<Utc>>,
        raw: &str,
        parameters: &ValidationParameters,
    ) -> Result<(), ClaimValidationError> {
        let Some(cache) = &parameters.token_replay_cache else {
            return Ok(());
        };
        let expires = expires.ok_or(ClaimValidationKind::NoExpiration)?;
        if cache.try_find(raw) {
            debug!("token replay detected");
            return Err(ClaimValidationKind::ReplayDetected.into());
        }
        validate_condition(cache.try_add(raw, expires), ClaimValidationKind::ReplayCacheAddFailed)
    }

    fn validate_issuer_signing_key(
        &self,
        key: Option<&SecurityKey>,
        _token: &JsonWebToken,
        parameters: &ValidationParameters,
    ) -> Result<(), ClaimValidationError> {
        if !parameters.validate_issuer_signing_key {
            return Ok(());
        }
        let key = key.ok_or(ClaimValidationKind::MissingSigningKey)?;
        if let KeyMaterial::Symmetric(_) = key.material() {
            validate_condition(
                key.key_size_bits() >= parameters.minimum_symmetric_key_size_bits,
                ClaimValidationKind::SigningKeyTooSmall,
            )?;
        }
        Ok(())
    }
}

pub(super) fn validate_condition(condition: bool, kind: ClaimValidationKind) -> Result<(), ClaimValidationError> {
    match condition {
        true => Ok(()),
        false => Err(kind.into()),
    }
}
