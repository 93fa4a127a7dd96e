use std::fmt;

/// An error raised by a claim validator.
#[derive(Debug, thiserror::Error)]
pub enum ClaimValidationError {
    #[error("claim validation failed: {0}")]
    Validation(ClaimValidationKind),

    #[error("claim validation failed: {0}")]
    Other(String),
}

impl From<ClaimValidationKind> for ClaimValidationError {
    fn from(kind: ClaimValidationKind) -> Self {
        Self::Validation(kind)
    }
}

/// A kind of claim validation that was violated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClaimValidationKind {
    Expired,
    InvalidAudience,
    InvalidIssuer,
    InvalidLifetime,
    MalformedLifetime,
    MissingAudience,
    MissingIssuer,
    MissingSigningKey,
    NoExpiration,
    NoValidAudiences,
    NoValidIssuers,
    NotYetValid,
    ReplayCacheAddFailed,
    ReplayDetected,
    SigningKeyTooSmall,
}

impl fmt::Display for ClaimValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ClaimValidationKind::*;
        let text = match self {
            Expired => "token is expired",
            InvalidAudience => "no audience in the token is valid",
            InvalidIssuer => "issuer is not valid",
            InvalidLifetime => "`nbf` is after `exp`",
            MalformedLifetime => "`nbf` or `exp` is not a numeric date",
            MissingAudience => "token has no audience",
            MissingIssuer => "token has no issuer",
            MissingSigningKey => "token was not validated with a signing key",
            NoExpiration => "token has no `exp` claim",
            NoValidAudiences => "no valid audiences configured",
            NoValidIssuers => "no valid issuers configured",
            NotYetValid => "`nbf` date not met",
            ReplayCacheAddFailed => "token could not be added to the replay cache",
            ReplayDetected => "token was already seen",
            SigningKeyTooSmall => "signing key is too small",
        };
        write!(f, "{text}")
    }
}
