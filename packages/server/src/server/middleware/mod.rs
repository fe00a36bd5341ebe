// HTTP middleware
pub mod hmac_auth;

pub use hmac_auth::*;
