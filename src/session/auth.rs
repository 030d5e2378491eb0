use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

const ACCESS_TOKEN_KEY: &str = "access_token";
const EXPIRES_IN_KEY: &str = "expires_in";
const ERROR_DESCRIPTION_KEY: &str = "error_description";
const ERROR_KEY: &str = "error";

/// Opaque bearer token handed out by the authorization redirect.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_in: None,
        }
    }

    pub fn with_expiry(mut self, expires_in: u64) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Lifetime in seconds as announced by the redirect, if any.
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationCallback {
    Token(AccessToken),
    Error(String),
}

/// Pulls the token (or the error description) out of a redirect URL.
///
/// Parameters may travel in the query string or in the fragment; a token
/// wins over an error when both are present.
pub fn parse_callback(url: &Url) -> AuthorizationCallback {
    let mut params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if let Some(fragment) = url.fragment() {
        let mut as_query = url.clone();
        as_query.set_fragment(None);
        as_query.set_query(Some(fragment));
        params.extend(as_query.query_pairs().into_owned());
    }

    let lookup = |key: &str| {
        params
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.clone())
    };

    if let Some(secret) = lookup(ACCESS_TOKEN_KEY) {
        let token = AccessToken::new(secret);
        return match lookup(EXPIRES_IN_KEY).and_then(|v| v.parse().ok()) {
            Some(secs) => AuthorizationCallback::Token(token.with_expiry(secs)),
            None => AuthorizationCallback::Token(token),
        };
    }

    match lookup(ERROR_DESCRIPTION_KEY).or_else(|| lookup(ERROR_KEY)) {
        Some(description) => AuthorizationCallback::Error(description),
        None => AuthorizationCallback::Error("callback carried no access token".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> AuthorizationCallback {
        parse_callback(&Url::parse(raw).unwrap())
    }

    #[test]
    fn test_token_in_fragment() {
        let cb = parse("nowplaying://callback#access_token=abc123&token_type=Bearer&expires_in=3600");
        assert_eq!(
            cb,
            AuthorizationCallback::Token(AccessToken::new("abc123").with_expiry(3600))
        );
    }

    #[test]
    fn test_token_in_query() {
        let cb = parse("nowplaying://callback?access_token=xyz");
        assert_eq!(cb, AuthorizationCallback::Token(AccessToken::new("xyz")));
    }

    #[test]
    fn test_error_description_preferred_over_error_code() {
        let cb = parse("nowplaying://callback?error=access_denied&error_description=user%20said%20no");
        assert_eq!(cb, AuthorizationCallback::Error("user said no".to_string()));
    }

    #[test]
    fn test_bare_error_code() {
        let cb = parse("nowplaying://callback?error=access_denied");
        assert_eq!(cb, AuthorizationCallback::Error("access_denied".to_string()));
    }

    #[test]
    fn test_empty_callback_is_an_error() {
        let cb = parse("nowplaying://callback");
        assert!(matches!(cb, AuthorizationCallback::Error(_)));

        let cb = parse("nowplaying://callback#access_token=");
        assert!(matches!(cb, AuthorizationCallback::Error(_)));
    }

    #[test]
    fn test_debug_hides_secret() {
        let token = AccessToken::new("super-secret");
        assert!(!format!("{:?}", token).contains("super-secret"));
    }
}
