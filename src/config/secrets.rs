//! Secret handling utilities.
//!
//! Re-exports secrecy types and builds auth header values from secrets
//! without leaving copies in logs.

use reqwest::header::{HeaderValue, InvalidHeaderValue};

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

/// `Authorization` header value for a bearer token, marked sensitive so
/// it never appears in `Debug` output.
pub fn bearer(token: &SecretString) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
    value.set_sensitive(true);
    Ok(value)
}
