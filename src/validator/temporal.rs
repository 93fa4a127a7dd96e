use super::{
    claims::validate_condition,
    error::{ClaimValidationError, ClaimValidationKind},
    ValidationParameters,
};
use chrono::{DateTime, Utc};

pub(super) fn validate_lifetime(
    not_before: Option<DateTime<Utc>>,
    expires: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    parameters: &ValidationParameters,
) -> Result<(), ClaimValidationError> {
    if !parameters.validate_lifetime {
        return Ok(());
    }
    validate_condition(expires.is_some() || !parameters.require_expiration_time, ClaimValidationKind::NoExpiration)?;
    if let Some((not_before, expires)) = not_before.zip(expires) {
        validate_condition(not_before <= expires, ClaimValidationKind::InvalidLifetime)?;
    }

    let skew = parameters.clock_skew;
    let latest = now.checked_add_signed(skew).unwrap_or(DateTime::<Utc>::MAX_UTC);
    let earliest = now.checked_sub_signed(skew).unwrap_or(DateTime::<Utc>::MIN_UTC);
    validate_condition(not_before.map(|t| t <= latest).unwrap_or(true), ClaimValidationKind::NotYetValid)?;
    validate_condition(expires.map(|t| t > earliest).unwrap_or(true), ClaimValidationKind::Expired)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use rstest::rstest;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    fn parameters(skew: i64) -> ValidationParameters {
        ValidationParameters { clock_skew: TimeDelta::seconds(skew), ..Default::default() }
    }

    #[rstest]
    #[case::within(Some(5), Some(20), 10, 0)]
    #[case::no_claims(None, None, 10, 0)]
    #[case::not_before_within_skew(Some(15), None, 10, 5)]
    #[case::expired_within_skew(None, Some(8), 10, 5)]
    #[case::not_before_is_now(Some(10), None, 10, 0)]
    fn valid(#[case] not_before: Option<i64>, #[case] expires: Option<i64>, #[case] now: i64, #[case] skew: i64) {
        validate_lifetime(not_before.map(at), expires.map(at), at(now), &parameters(skew)).expect("validation failed");
    }

    #[rstest]
    #[case::expired(None, Some(5), 10, 0, ClaimValidationKind::Expired)]
    #[case::expires_now(None, Some(10), 10, 0, ClaimValidationKind::Expired)]
    #[case::expired_beyond_skew(None, Some(4), 10, 5, ClaimValidationKind::Expired)]
    #[case::not_yet_valid(Some(11), None, 10, 0, ClaimValidationKind::NotYetValid)]
    #[case::not_yet_valid_beyond_skew(Some(16), None, 10, 5, ClaimValidationKind::NotYetValid)]
    #[case::backwards(Some(20), Some(15), 10, 0, ClaimValidationKind::InvalidLifetime)]
    fn invalid(
        #[case] not_before: Option<i64>,
        #[case] expires: Option<i64>,
        #[case] now: i64,
        #[case] skew: i64,
        #[case] expected: ClaimValidationKind,
    ) {
        let err = validate_lifetime(not_before.map(at), expires.map(at), at(now), &parameters(skew))
            .expect_err("validation succeeded");
        assert!(matches!(err, ClaimValidationError::Validation(kind) if kind == expected), "{err}");
    }

    #[test]
    fn expiration_required() {
        let parameters = ValidationParameters { require_expiration_time: true, ..Default::default() };
        let err = validate_lifetime(None, None, at(10), &parameters).expect_err("validation succeeded");
        assert!(matches!(err, ClaimValidationError::Validation(ClaimValidationKind::NoExpiration)));
    }

    #[test]
    fn disabled() {
        let parameters = ValidationParameters { validate_lifetime: false, ..Default::default() };
        validate_lifetime(None, Some(at(1)), at(10_000), &parameters).expect("validation failed");
    }
}
