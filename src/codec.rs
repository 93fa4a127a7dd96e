use crate::token::JsonWebToken;
use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use serde::Serialize;
use std::{fmt, ops::Range};
use tracing::{debug, info};

/// The default maximum size of a token that will be processed, in bytes.
pub const DEFAULT_MAXIMUM_TOKEN_SIZE_IN_BYTES: usize = 1024 * 250;

pub(crate) const JWS_SEGMENT_COUNT: usize = 3;
pub(crate) const JWE_SEGMENT_COUNT: usize = 5;
const MAX_SEGMENT_COUNT: usize = JWE_SEGMENT_COUNT;

/// The kind of a compact serialized token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// A signed token made of 3 segments.
    Jws,

    /// An encrypted token made of 5 segments.
    Jwe,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jws => write!(f, "JWS"),
            Self::Jwe => write!(f, "JWE"),
        }
    }
}

/// The boundaries of every segment in a compact serialized token.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Segments {
    Jws([Range<usize>; JWS_SEGMENT_COUNT]),
    Jwe([Range<usize>; JWE_SEGMENT_COUNT]),
}

impl Segments {
    pub(crate) fn kind(&self) -> TokenKind {
        match self {
            Self::Jws(_) => TokenKind::Jws,
            Self::Jwe(_) => TokenKind::Jwe,
        }
    }
}

/// A decoder for tokens in compact serialization format.
///
/// Decoding only frames the token and decodes its header and payload; it never decrypts or verifies anything.
#[derive(Clone, Debug)]
pub struct CompactDecoder {
    /// The maximum token size, in bytes.
    pub max_token_size: usize,
}

impl Default for CompactDecoder {
    fn default() -> Self {
        Self { max_token_size: DEFAULT_MAXIMUM_TOKEN_SIZE_IN_BYTES }
    }
}

impl CompactDecoder {
    /// Check whether the given input is a well formed JWS or JWE.
    pub fn can_read(&self, s: &str) -> bool {
        match self.classify(s) {
            Ok(_) => true,
            Err(e @ CompactParseError::TooLarge { .. }) => {
                info!("cannot read token: {e}");
                false
            }
            Err(e) => {
                debug!("cannot read token: {e}");
                false
            }
        }
    }

    /// Determine the kind of the given token by looking at its segments.
    pub fn classify(&self, s: &str) -> Result<TokenKind, CompactParseError> {
        self.segments(s).map(|segments| segments.kind())
    }

    /// Decode a token.
    pub fn decode(&self, s: &str) -> Result<JsonWebToken, CompactParseError> {
        let segments = self.segments(s)?;
        JsonWebToken::from_segments(s, segments)
    }

    pub(crate) fn check_size(&self, s: &str) -> Result<(), CompactParseError> {
        if s.trim().is_empty() {
            return Err(CompactParseError::NoInput);
        }
        if s.len() > self.max_token_size {
            return Err(CompactParseError::TooLarge { size: s.len(), max: self.max_token_size });
        }
        Ok(())
    }

    pub(crate) fn segments(&self, s: &str) -> Result<Segments, CompactParseError> {
        self.check_size(s)?;

        // Split into at most one more piece than allowed so that trailing dots are reported as too many segments
        // rather than being absorbed into the last one.
        let mut ranges = Vec::with_capacity(MAX_SEGMENT_COUNT + 1);
        let mut start = 0;
        for piece in s.splitn(MAX_SEGMENT_COUNT + 1, '.') {
            ranges.push(start..start + piece.len());
            start += piece.len() + 1;
        }
        match ranges.len() {
            JWS_SEGMENT_COUNT => {
                let ranges: [Range<usize>; JWS_SEGMENT_COUNT] =
                    ranges.try_into().map_err(|_| CompactParseError::SegmentCount(JWS_SEGMENT_COUNT))?;
                check_shape(s, &ranges, &JWS_SHAPE)?;
                Ok(Segments::Jws(ranges))
            }
            JWE_SEGMENT_COUNT => {
                let ranges: [Range<usize>; JWE_SEGMENT_COUNT] =
                    ranges.try_into().map_err(|_| CompactParseError::SegmentCount(JWE_SEGMENT_COUNT))?;
                check_shape(s, &ranges, &JWE_SHAPE)?;
                Ok(Segments::Jwe(ranges))
            }
            count => Err(CompactParseError::SegmentCount(count)),
        }
    }
}

// The name of each segment and whether it can be empty.
const JWS_SHAPE: [(&str, bool); JWS_SEGMENT_COUNT] = [("header", false), ("payload", false), ("signature", true)];
const JWE_SHAPE: [(&str, bool); JWE_SEGMENT_COUNT] = [
    ("header", false),
    ("encrypted key", true),
    ("initialization vector", false),
    ("ciphertext", false),
    ("authentication tag", false),
];

fn check_shape(s: &str, ranges: &[Range<usize>], shape: &[(&'static str, bool)]) -> Result<(), CompactParseError> {
    for (range, (name, allow_empty)) in ranges.iter().zip(shape) {
        let segment = &s[range.clone()];
        if segment.is_empty() && !allow_empty {
            return Err(CompactParseError::EmptySegment(name));
        }
        if !segment.bytes().all(is_base64_url_char) {
            return Err(CompactParseError::MalformedSegment(name));
        }
    }
    Ok(())
}

fn is_base64_url_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_'
}

/// An error when parsing a token in compact serialization format.
#[derive(Debug, thiserror::Error)]
pub enum CompactParseError {
    #[error("empty input")]
    NoInput,

    #[error("token is larger than max allowed: {size} > {max} bytes")]
    TooLarge { size: usize, max: usize },

    /// The number of segments is neither 3 nor 5. Any count above 5 is reported as 6.
    #[error("expected 3 (JWS) or 5 (JWE) segments, found {0}")]
    SegmentCount(usize),

    #[error("{0} segment is empty")]
    EmptySegment(&'static str),

    #[error("{0} segment contains characters outside the base64url alphabet")]
    MalformedSegment(&'static str),

    #[error("expected a {expected} but found a {found}")]
    UnexpectedKind { expected: TokenKind, found: TokenKind },

    #[error("invalid base64 found on {0}: {1}")]
    Base64(&'static str, base64::DecodeError),

    #[error("invalid JSON on {0}: {1}")]
    Json(&'static str, serde_json::Error),
}

pub(crate) fn to_base64<T: AsRef<[u8]>>(input: T) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(input)
}

pub(crate) fn to_base64_json<T: Serialize>(input: &T) -> Result<String, serde_json::Error> {
    let input = serde_json::to_vec(input)?;
    Ok(to_base64(&input))
}

pub(crate) fn from_base64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_URL_SAFE_NO_PAD.decode(input)
}
