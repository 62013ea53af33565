//! Bearer token type.

use serde::{Deserialize, Serialize};

/// A customer API bearer token.
///
/// The token is persisted to client storage and sent on identity requests,
/// so it must serialize as a plain string - but it must never end up in
/// logs. `Debug` is implemented manually to redact the value; there is no
/// `Display` impl at all.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Expose the raw token for constructing an `Authorization` header.
    ///
    /// Call sites should be the HTTP client and nothing else.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the token is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

impl From<String> for AuthToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_value() {
        let token = AuthToken::new("shpat_supersecret");
        let debug = format!("{token:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_expose_returns_raw_value() {
        let token = AuthToken::new("shpat_abc123");
        assert_eq!(token.expose(), "shpat_abc123");
    }

    #[test]
    fn test_serde_transparent() {
        let token = AuthToken::new("tok");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"tok\"");
        let back: AuthToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn test_is_empty() {
        assert!(AuthToken::new("").is_empty());
        assert!(!AuthToken::new("t").is_empty());
    }
}
