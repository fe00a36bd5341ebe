//! Secrets for the metrics provider, Cloudflare and the cron signer.
//!
//! Wrapped in `secrecy` boxes so they never reach logs or `Debug` output.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

const REDACTED: &str = "[REDACTED]";

/// An API key or signing secret, exposed only where it is sent or used.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    /// Surrounding whitespace is dropped; keys pasted into env files often
    /// carry a trailing newline.
    pub fn new(value: impl Into<String>) -> Self {
        let value: String = value.into();
        Self(SecretBox::new(Box::from(value.trim())))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    /// Last four characters, enough to tell configured keys apart in logs.
    /// Short secrets get no hint at all.
    pub fn hint(&self) -> String {
        let chars: Vec<char> = self.expose().chars().collect();
        if chars.len() < 12 {
            return REDACTED.to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("...{tail}")
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Cloudflare account credentials shared by the renderer and R2 storage.
#[derive(Clone)]
pub struct CloudflareCredentials {
    pub account_id: String,
    pub api_token: SecretString,
}

impl CloudflareCredentials {
    pub fn new(account_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            api_token: SecretString::new(api_token),
        }
    }
}

impl fmt::Debug for CloudflareCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareCredentials")
            .field("account_id", &self.account_id)
            .field("api_token", &self.api_token)
            .finish()
    }
}
