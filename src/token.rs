use crate::{
    codec::{from_base64, CompactDecoder, CompactParseError, Segments, TokenKind},
    key::SecurityKey,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A JSON object.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// The value of the `typ` header in every token created by this crate.
pub const HEADER_TYPE: &str = "JWT";

const ISSUER_CLAIM: &str = "iss";
const AUDIENCE_CLAIM: &str = "aud";
const NOT_BEFORE_CLAIM: &str = "nbf";
const EXPIRES_CLAIM: &str = "exp";
const ACTOR_CLAIM: &str = "actort";

/// A time claim that is present but is not a number.
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
#[error("claim '{0}' is not a numeric date")]
pub struct InvalidNumericDate(pub &'static str);

/// A JOSE header.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtHeader {
    /// The signing or key management algorithm.
    #[serde(rename = "alg", default)]
    pub algorithm: String,

    /// The content encryption algorithm.
    #[serde(rename = "enc", default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<String>,

    /// The identifier of the key used.
    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    /// The thumbprint of the certificate that holds the key used.
    #[serde(rename = "x5t", default, skip_serializing_if = "Option::is_none")]
    pub x509_thumbprint: Option<String>,

    /// The token type.
    #[serde(rename = "typ", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// The content type.
    #[serde(rename = "cty", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl JwtHeader {
    /// Construct the header of a signed token.
    pub fn signed(algorithm: &str, key_id: Option<&str>) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            key_id: key_id.filter(|id| !id.is_empty()).map(ToString::to_string),
            token_type: Some(HEADER_TYPE.to_string()),
            ..Default::default()
        }
    }

    /// Construct the header of an encrypted token.
    pub fn encrypted(algorithm: &str, encryption: &str, key_id: Option<&str>) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            encryption: Some(encryption.to_string()),
            key_id: key_id.filter(|id| !id.is_empty()).map(ToString::to_string),
            token_type: Some(HEADER_TYPE.to_string()),
            ..Default::default()
        }
    }
}

/// A JSON web token in compact serialization format.
///
/// This is an immutable view over the raw token along with its segment boundaries. Signed tokens have their
/// header and payload decoded, encrypted tokens only have their header decoded until an inner token is attached
/// after decryption.
#[derive(Clone, Debug)]
pub struct JsonWebToken {
    raw: String,
    segments: Segments,
    header: JwtHeader,
    payload: Option<JsonObject>,
    inner_token: Option<Box<JsonWebToken>>,
    signing_key: Option<SecurityKey>,
}

impl JsonWebToken {
    /// Decode a token using the default size limit.
    ///
    /// This performs no cryptographic checks.
    pub fn decode(s: &str) -> Result<Self, CompactParseError> {
        CompactDecoder::default().decode(s)
    }

    pub(crate) fn from_segments(raw: &str, segments: Segments) -> Result<Self, CompactParseError> {
        let (header_range, payload_range) = match &segments {
            Segments::Jws([header, payload, _]) => (header.clone(), Some(payload.clone())),
            Segments::Jwe([header, ..]) => (header.clone(), None),
        };
        let header = from_base64(&raw[header_range]).map_err(|e| CompactParseError::Base64("header", e))?;
        let header: JwtHeader = serde_json::from_slice(&header).map_err(|e| CompactParseError::Json("header", e))?;
        let payload = match payload_range {
            Some(range) => {
                let payload = from_base64(&raw[range]).map_err(|e| CompactParseError::Base64("payload", e))?;
                let payload: JsonObject =
                    serde_json::from_slice(&payload).map_err(|e| CompactParseError::Json("payload", e))?;
                Some(payload)
            }
            None => None,
        };
        Ok(Self { raw: raw.to_string(), segments, header, payload, inner_token: None, signing_key: None })
    }

    /// The kind of this token.
    pub fn kind(&self) -> TokenKind {
        self.segments.kind()
    }

    /// The raw token this was decoded from.
    pub fn encoded_token(&self) -> &str {
        &self.raw
    }

    /// The decoded header.
    pub fn header(&self) -> &JwtHeader {
        &self.header
    }

    /// The base64url encoded header.
    pub fn encoded_header(&self) -> &str {
        match &self.segments {
            Segments::Jws([header, ..]) | Segments::Jwe([header, ..]) => &self.raw[header.clone()],
        }
    }

    /// The base64url encoded payload, if this is a JWS.
    pub fn encoded_payload(&self) -> Option<&str> {
        self.jws_segment(1)
    }

    /// The base64url encoded signature, if this is a JWS. This is empty for unsigned tokens.
    pub fn encoded_signature(&self) -> Option<&str> {
        self.jws_segment(2)
    }

    /// The `header.payload` input the signature was computed over, if this is a JWS.
    pub fn signing_input(&self) -> Option<&str> {
        match &self.segments {
            Segments::Jws([header, payload, _]) => Some(&self.raw[header.start..payload.end]),
            Segments::Jwe(_) => None,
        }
    }

    /// The base64url encoded wrapped content encryption key, if this is a JWE. This is empty in direct mode.
    pub fn encrypted_key(&self) -> Option<&str> {
        self.jwe_segment(1)
    }

    /// The base64url encoded initialization vector, if this is a JWE.
    pub fn initialization_vector(&self) -> Option<&str> {
        self.jwe_segment(2)
    }

    /// The base64url encoded ciphertext, if this is a JWE.
    pub fn ciphertext(&self) -> Option<&str> {
        self.jwe_segment(3)
    }

    /// The base64url encoded authentication tag, if this is a JWE.
    pub fn authentication_tag(&self) -> Option<&str> {
        self.jwe_segment(4)
    }

    /// The `alg` header.
    pub fn algorithm(&self) -> &str {
        &self.header.algorithm
    }

    /// The `enc` header.
    pub fn encryption_algorithm(&self) -> Option<&str> {
        self.header.encryption.as_deref()
    }

    /// The `kid` header.
    pub fn key_id(&self) -> Option<&str> {
        self.header.key_id.as_deref()
    }

    /// The `x5t` header.
    pub fn x509_thumbprint(&self) -> Option<&str> {
        self.header.x509_thumbprint.as_deref()
    }

    /// The claims in this token.
    ///
    /// For an encrypted token these are the claims of the decrypted inner token, if any.
    pub fn payload(&self) -> Option<&JsonObject> {
        match &self.inner_token {
            Some(inner) => inner.payload(),
            None => self.payload.as_ref(),
        }
    }

    /// The `iss` claim.
    pub fn issuer(&self) -> Option<&str> {
        self.claim(ISSUER_CLAIM)?.as_str()
    }

    /// The `aud` claim, which can either be a single string or an array of them.
    pub fn audiences(&self) -> Vec<&str> {
        match self.claim(AUDIENCE_CLAIM) {
            Some(serde_json::Value::String(audience)) => vec![audience.as_str()],
            Some(serde_json::Value::Array(audiences)) => audiences.iter().filter_map(|a| a.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// The `nbf` claim.
    ///
    /// Dates outside of the representable range saturate to the earliest or latest one.
    pub fn valid_from(&self) -> Result<Option<DateTime<Utc>>, InvalidNumericDate> {
        self.numeric_date(NOT_BEFORE_CLAIM)
    }

    /// The `exp` claim.
    ///
    /// Dates outside of the representable range saturate to the earliest or latest one.
    pub fn valid_to(&self) -> Result<Option<DateTime<Utc>>, InvalidNumericDate> {
        self.numeric_date(EXPIRES_CLAIM)
    }

    /// The actor token carried in the `actort` claim.
    pub fn actor(&self) -> Option<&str> {
        self.claim(ACTOR_CLAIM)?.as_str()
    }

    /// The decrypted token, if this is a JWE that went through validation.
    pub fn inner_token(&self) -> Option<&JsonWebToken> {
        self.inner_token.as_deref()
    }

    /// The key that verified this token's signature.
    ///
    /// For an encrypted token this is the key that verified the decrypted inner token, if any.
    pub fn signing_key(&self) -> Option<&SecurityKey> {
        match &self.inner_token {
            Some(inner) => inner.signing_key(),
            None => self.signing_key.as_ref(),
        }
    }

    pub(crate) fn set_inner_token(&mut self, token: JsonWebToken) {
        self.inner_token = Some(Box::new(token));
    }

    pub(crate) fn set_signing_key(&mut self, key: SecurityKey) {
        self.signing_key = Some(key);
    }

    fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.payload()?.get(name)
    }

    fn numeric_date(&self, name: &'static str) -> Result<Option<DateTime<Utc>>, InvalidNumericDate> {
        let Some(value) = self.claim(name) else {
            return Ok(None);
        };
        // Fractional parts are truncated, and `as` saturates floats beyond the i64 range.
        let seconds = match value.as_i64() {
            Some(seconds) => seconds,
            None => value.as_f64().ok_or(InvalidNumericDate(name))? as i64,
        };
        let date = DateTime::from_timestamp(seconds, 0).unwrap_or(match seconds < 0 {
            true => DateTime::<Utc>::MIN_UTC,
            false => DateTime::<Utc>::MAX_UTC,
        });
        Ok(Some(date))
    }

    fn jws_segment(&self, index: usize) -> Option<&str> {
        match &self.segments {
            Segments::Jws(ranges) => Some(&self.raw[ranges[index].clone()]),
            Segments::Jwe(_) => None,
        }
    }

    fn jwe_segment(&self, index: usize) -> Option<&str> {
        match &self.segments {
            Segments::Jwe(ranges) => Some(&self.raw[ranges[index].clone()]),
            Segments::Jws(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{to_base64, to_base64_json};
    use rstest::rstest;
    use serde_json::json;

    fn jws(header: serde_json::Value, payload: serde_json::Value) -> String {
        let header = to_base64_json(&header).unwrap();
        let payload = to_base64_json(&payload).unwrap();
        format!("{header}.{payload}.{}", to_base64(b"signature"))
    }

    #[test]
    fn decode_jws() {
        let raw = jws(
            json!({"alg": "HS256", "kid": "key-1", "typ": "JWT"}),
            json!({"iss": "issuer", "aud": "audience", "nbf": 1740494955, "exp": 1740495955.5, "actort": "actor"}),
        );
        let token = JsonWebToken::decode(&raw).expect("decode failed");
        assert_eq!(token.kind(), TokenKind::Jws);
        assert_eq!(token.algorithm(), "HS256");
        assert_eq!(token.key_id(), Some("key-1"));
        assert_eq!(token.issuer(), Some("issuer"));
        assert_eq!(token.audiences(), ["audience"]);
        assert_eq!(token.valid_from(), Ok(DateTime::from_timestamp(1740494955, 0)));
        assert_eq!(token.valid_to(), Ok(DateTime::from_timestamp(1740495955, 0)));
        assert_eq!(token.actor(), Some("actor"));
        assert_eq!(token.encoded_signature(), Some(to_base64(b"signature").as_str()));
        assert!(token.encrypted_key().is_none());

        let (signing_input, _) = raw.rsplit_once('.').unwrap();
        assert_eq!(token.signing_input(), Some(signing_input));
    }

    #[test]
    fn decode_jwe_header_only() {
        let header = to_base64_json(&JwtHeader::encrypted("dir", "A128CBC-HS256", Some("enc-key"))).unwrap();
        let raw = format!("{header}..aXY.Y2lwaGVy.dGFn");
        let token = JsonWebToken::decode(&raw).expect("decode failed");
        assert_eq!(token.kind(), TokenKind::Jwe);
        assert_eq!(token.encryption_algorithm(), Some("A128CBC-HS256"));
        assert_eq!(token.encrypted_key(), Some(""));
        assert_eq!(token.initialization_vector(), Some("aXY"));
        assert_eq!(token.ciphertext(), Some("Y2lwaGVy"));
        assert_eq!(token.authentication_tag(), Some("dGFn"));
        assert!(token.payload().is_none());
        assert!(token.signing_input().is_none());
    }

    #[rstest]
    #[case::array(json!({"aud": ["a", "b", 3]}), vec!["a", "b"])]
    #[case::single(json!({"aud": "a"}), vec!["a"])]
    #[case::missing(json!({}), vec![])]
    #[case::number(json!({"aud": 42}), vec![])]
    fn audiences(#[case] payload: serde_json::Value, #[case] expected: Vec<&str>) {
        let raw = jws(json!({"alg": "HS256"}), payload);
        let token = JsonWebToken::decode(&raw).expect("decode failed");
        assert_eq!(token.audiences(), expected);
    }

    #[rstest]
    #[case::malformed_header("e30x.e30.")]
    #[case::header_not_json("Zm9v.e30.")]
    #[case::payload_not_object("e30.WzFd.")]
    fn invalid_contents(#[case] raw: &str) {
        JsonWebToken::decode(raw).expect_err("decode succeeded");
    }

    #[test]
    fn signed_header_serialization() {
        let header = JwtHeader::signed("HS256", Some("key-1"));
        let serialized = serde_json::to_string(&header).unwrap();
        assert_eq!(serialized, r#"{"alg":"HS256","kid":"key-1","typ":"JWT"}"#);
    }

    #[rstest]
    #[case::some(Some("key-1"), r#"{"alg":"HS256","kid":"key-1","typ":"JWT"}"#)]
    #[case::empty(Some(""), r#"{"alg":"HS256","typ":"JWT"}"#)]
    #[case::none(None, r#"{"alg":"HS256","typ":"JWT"}"#)]
    fn signed_header_key_id(#[case] key_id: Option<&str>, #[case] expected: &str) {
        let serialized = serde_json::to_string(&JwtHeader::signed("HS256", key_id)).unwrap();
        assert_eq!(serialized, expected);
    }

    #[rstest]
    #[case::integer(json!(1740494955), DateTime::from_timestamp(1740494955, 0).unwrap())]
    #[case::fraction(json!(1740494955.9), DateTime::from_timestamp(1740494955, 0).unwrap())]
    #[case::beyond_range(json!(9e15), DateTime::<Utc>::MAX_UTC)]
    #[case::huge(json!(1e300), DateTime::<Utc>::MAX_UTC)]
    #[case::beyond_u64(json!(u64::MAX), DateTime::<Utc>::MAX_UTC)]
    #[case::huge_negative(json!(-1e20), DateTime::<Utc>::MIN_UTC)]
    #[case::i64_min(json!(i64::MIN), DateTime::<Utc>::MIN_UTC)]
    fn numeric_dates(#[case] value: serde_json::Value, #[case] expected: DateTime<Utc>) {
        let token = JsonWebToken::decode(&jws(json!({"alg": "HS256"}), json!({"nbf": value, "exp": value}))).unwrap();
        assert_eq!(token.valid_from(), Ok(Some(expected)));
        assert_eq!(token.valid_to(), Ok(Some(expected)));
    }

    #[rstest]
    #[case::string(json!("1"))]
    #[case::numeric_string(json!("99999999999"))]
    #[case::boolean(json!(true))]
    #[case::null(json!(null))]
    #[case::object(json!({"seconds": 1}))]
    fn non_numeric_dates(#[case] value: serde_json::Value) {
        let token = JsonWebToken::decode(&jws(json!({"alg": "HS256"}), json!({"nbf": value, "exp": value}))).unwrap();
        assert_eq!(token.valid_from(), Err(InvalidNumericDate(NOT_BEFORE_CLAIM)));
        assert_eq!(token.valid_to(), Err(InvalidNumericDate(EXPIRES_CLAIM)));
    }

    #[test]
    fn missing_dates() {
        let token = JsonWebToken::decode(&jws(json!({"alg": "HS256"}), json!({}))).unwrap();
        assert_eq!(token.valid_from(), Ok(None));
        assert_eq!(token.valid_to(), Ok(None));
    }

    #[test]
    fn encrypted_header_serialization() {
        let header = JwtHeader::encrypted("A128KW", "A128CBC-HS256", None);
        let serialized = serde_json::to_string(&header).unwrap();
        assert_eq!(serialized, r#"{"alg":"A128KW","enc":"A128CBC-HS256","typ":"JWT"}"#);
    }
}
