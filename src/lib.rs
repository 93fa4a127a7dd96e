pub mod algorithms;
pub mod builder;
pub mod codec;
pub mod crypto;
pub mod decryption;
pub mod encryption;
pub mod error;
pub mod handler;
pub mod header_cache;
pub mod key;
mod resolver;
pub mod signature;
pub mod token;
pub mod validator;

pub use error::TokenError;
pub use handler::JsonWebTokenHandler;
pub use k256;
pub use key::{EncryptingCredentials, SecurityKey, SigningCredentials};
pub use token::{JsonObject, JsonWebToken};
pub use validator::{TokenValidationResult, ValidationParameters};
