//! Algorithm identifiers understood by the handler and the default crypto provider factory.

/// HMAC using SHA-256.
pub const HMAC_SHA256: &str = "HS256";

/// HMAC using SHA-384.
pub const HMAC_SHA384: &str = "HS384";

/// HMAC using SHA-512.
pub const HMAC_SHA512: &str = "HS512";

/// ECDSA using secp256k1 and SHA-256.
pub const ECDSA_SECP256K1_SHA256: &str = "ES256K";

/// The algorithm used by unsigned tokens.
pub const NONE: &str = "none";

/// Content is encrypted directly under the long lived key.
pub const DIRECT: &str = "dir";

/// AES key wrap using a 128 bit key.
pub const AES128_KEY_WRAP: &str = "A128KW";

/// AES key wrap using a 192 bit key.
pub const AES192_KEY_WRAP: &str = "A192KW";

/// AES key wrap using a 256 bit key.
pub const AES256_KEY_WRAP: &str = "A256KW";

/// AES-128-CBC with HMAC-SHA-256.
pub const AES128_CBC_HMAC_SHA256: &str = "A128CBC-HS256";

/// AES-192-CBC with HMAC-SHA-384.
pub const AES192_CBC_HMAC_SHA384: &str = "A192CBC-HS384";

/// AES-256-CBC with HMAC-SHA-512.
pub const AES256_CBC_HMAC_SHA512: &str = "A256CBC-HS512";

/// The content encryption algorithms an ephemeral content encryption key can be generated for.
pub const CONTENT_ENCRYPTION_ALGORITHMS: [&str; 3] =
    [AES128_CBC_HMAC_SHA256, AES192_CBC_HMAC_SHA384, AES256_CBC_HMAC_SHA512];

/// The size in bits of the content encryption key used by the given content encryption algorithm.
///
/// The key carries both the MAC and the encryption halves, so it is twice as long as the AES key.
pub fn content_encryption_key_bits(algorithm: &str) -> Option<usize> {
    match algorithm {
        AES128_CBC_HMAC_SHA256 => Some(256),
        AES192_CBC_HMAC_SHA384 => Some(384),
        AES256_CBC_HMAC_SHA512 => Some(512),
        _ => None,
    }
}
