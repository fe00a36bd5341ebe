//! Credential handling and request signing.

pub mod credentials;
pub mod hmac;

pub use credentials::{CloudflareCredentials, SecretString};
pub use self::hmac::{extract_signature, parse_timestamp, RequestSigner, SignatureError};
