//! Identity token handling

use std::fmt;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{IdgateError, Result};

/// A compact, three-segment identity token as delivered by the provider.
///
/// The string is kept verbatim. Only the header is ever decoded before the
/// signature has been verified.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityToken(String);

impl IdentityToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Splits the token into header, claims and signature segments.
    ///
    /// # Errors
    ///
    /// Returns [`IdgateError::TokenMalformed`] unless there are exactly three
    /// non-empty segments.
    pub fn segments(&self) -> Result<(&str, &str, &str)> {
        let mut parts = self.0.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(c), Some(s), None) if !h.is_empty() && !c.is_empty() && !s.is_empty() => {
                Ok((h, c, s))
            }
            _ => Err(IdgateError::TokenMalformed(
                "expected three dot-separated segments".to_string(),
            )
            .into()),
        }
    }

    /// Decodes the header segment.
    ///
    /// # Errors
    ///
    /// Returns [`IdgateError::TokenMalformed`] if the header is not
    /// base64url-encoded JSON.
    pub fn header(&self) -> Result<TokenHeader> {
        let (header, _, _) = self.segments()?;
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(header.trim_end_matches('='))
            .map_err(|e| IdgateError::TokenMalformed(format!("header is not base64url: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| IdgateError::TokenMalformed(format!("header is not JSON: {e}")).into())
    }

    /// A short prefix safe to put in logs.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(12).collect();
        format!("{prefix}…")
    }
}

// Tokens are credentials; keep them out of debug output.
impl fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IdentityToken").field(&self.redacted()).finish()
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for IdentityToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for IdentityToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The header members needed to pick a verification key.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub x5t: Option<String>,
}

impl TokenHeader {
    /// The identifier used to look up the signing key: the thumbprint when
    /// present, otherwise the key id.
    pub fn key_identifier(&self) -> Option<&str> {
        self.x5t.as_deref().or(self.kid.as_deref())
    }
}
