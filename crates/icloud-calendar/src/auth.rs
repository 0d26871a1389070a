//! HTTP Basic authentication (RFC 7617).

use base64::Engine;

use crate::config::Credentials;

/// Builds the `Authorization` header value for the credentials.
pub fn basic_auth(credentials: &Credentials) -> String {
    let pair = format!("{}:{}", credentials.username(), credentials.app_password());
    let encoded = base64::engine::general_purpose::STANDARD.encode(pair);
    format!("Basic {}", encoded)
}
